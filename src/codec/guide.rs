//! Supported source formats, the targets each can convert to, and naming helpers.

use std::path::Path;

use crate::TargetFormat;

#[derive(Debug)]
pub struct TargetSpec {
    pub media_type: &'static str,
    pub name: &'static str,
    pub extension: &'static str,
}

#[derive(Debug)]
pub struct SourceSpec {
    pub media_type: &'static str,
    pub name: &'static str,
    /// File extensions (lowercase, no dot) that map to this media type.
    pub extensions: &'static [&'static str],
    pub targets: &'static [TargetSpec],
}

#[derive(Debug)]
pub struct FormatGuide {
    supported: &'static [SourceSpec],
    /// Media type, human name and extensions for common formats we refuse.
    unsupported: &'static [(&'static str, &'static str, &'static [&'static str])],
}

const PNG: TargetSpec = TargetSpec {
    media_type: "image/png",
    name: "PNG (Lossless)",
    extension: ".png",
};

const JPEG: TargetSpec = TargetSpec {
    media_type: "image/jpeg",
    name: "JPEG (Lossy)",
    extension: ".jpeg",
};

const BMP: TargetSpec = TargetSpec {
    media_type: "image/bmp",
    name: "BMP (Bitmap)",
    extension: ".bmp",
};

static GUIDE: FormatGuide = FormatGuide {
    supported: &[
        SourceSpec {
            media_type: "image/png",
            name: "PNG",
            extensions: &["png"],
            targets: &[JPEG, BMP],
        },
        SourceSpec {
            media_type: "image/jpeg",
            name: "JPEG",
            extensions: &["jpg", "jpeg", "jpe"],
            targets: &[PNG, BMP],
        },
        SourceSpec {
            media_type: "image/bmp",
            name: "BMP",
            extensions: &["bmp"],
            targets: &[PNG, JPEG],
        },
    ],
    unsupported: &[
        ("application/pdf", "PDF Document", &["pdf"]),
        ("application/msword", "Word Document", &["doc"]),
        (
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "Word Document (.docx)",
            &["docx"],
        ),
        ("application/vnd.ms-excel", "Excel Spreadsheet", &["xls"]),
        (
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "Excel Spreadsheet (.xlsx)",
            &["xlsx"],
        ),
        ("text/plain", "Plain Text", &["txt"]),
        ("application/json", "JSON", &["json"]),
        ("application/zip", "ZIP Archive", &["zip"]),
        ("application/x-rar-compressed", "RAR Archive", &["rar"]),
        ("application/x-7z-compressed", "7-Zip Archive", &["7z"]),
        ("audio/mpeg", "MP3 Audio", &["mp3"]),
        ("audio/wav", "WAV Audio", &["wav"]),
        ("audio/aac", "AAC Audio", &["aac"]),
        ("video/mp4", "MP4 Video", &["mp4"]),
        ("video/x-matroska", "MKV Video", &["mkv"]),
        ("video/avi", "AVI Video", &["avi"]),
        ("image/heic", "HEIC Image", &["heic"]),
        ("image/tiff", "TIFF Image", &["tif", "tiff"]),
    ],
};

impl FormatGuide {
    pub fn get() -> &'static FormatGuide {
        &GUIDE
    }

    pub fn sources(&self) -> &'static [SourceSpec] {
        self.supported
    }

    pub fn source(&self, media_type: &str) -> Option<&'static SourceSpec> {
        self.supported.iter().find(|s| s.media_type == media_type)
    }

    pub fn is_supported(&self, media_type: &str) -> bool {
        self.source(media_type).is_some()
    }

    /// Targets for a supported source type; empty for anything else.
    pub fn targets_for(&self, media_type: &str) -> &'static [TargetSpec] {
        self.source(media_type).map(|s| s.targets).unwrap_or(&[])
    }

    pub fn is_valid_target(&self, source_type: &str, target: &TargetFormat) -> bool {
        self.targets_for(source_type)
            .iter()
            .any(|t| t.media_type == target.as_str())
    }

    /// Every distinct target media type across all sources.
    pub fn all_targets(&self) -> Vec<&'static str> {
        let mut all: Vec<&'static str> = self
            .supported
            .iter()
            .flat_map(|s| s.targets.iter().map(|t| t.media_type))
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }

    /// Accepts a media type (`image/png`) or an extension (`png`, `.jpg`).
    pub fn resolve_media_type(&self, input: &str) -> Option<&'static str> {
        let needle = input.trim().trim_start_matches('.').to_ascii_lowercase();
        self.supported
            .iter()
            .find(|s| s.media_type == needle || s.extensions.iter().any(|e| *e == needle))
            .map(|s| s.media_type)
    }
}

/// Media type from a path's extension. Unknown extensions yield None.
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let guide = FormatGuide::get();
    guide
        .supported
        .iter()
        .find(|s| s.extensions.iter().any(|e| *e == ext))
        .map(|s| s.media_type)
        .or_else(|| {
            guide
                .unsupported
                .iter()
                .find(|(_, _, exts)| exts.iter().any(|e| *e == ext))
                .map(|(mt, _, _)| *mt)
        })
}

/// Human name for a media type, falling back to the raw type or "Unknown".
pub fn describe_media_type(media_type: &str) -> String {
    let guide = FormatGuide::get();
    if let Some(src) = guide.source(media_type) {
        return src.name.to_string();
    }
    if let Some((_, name, _)) = guide.unsupported.iter().find(|(mt, _, _)| *mt == media_type) {
        return name.to_string();
    }
    if media_type.is_empty() {
        "Unknown".to_string()
    } else {
        media_type.to_string()
    }
}

/// `photo.png` -> `photo-converted.jpeg` for target `image/jpeg`.
pub fn converted_file_name(source_name: &str, target: &TargetFormat) -> String {
    let stem = match source_name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && !ext.contains('/') => stem,
        _ => source_name,
    };
    format!("{stem}-converted.{}", target.subtype())
}

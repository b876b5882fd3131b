mod common;

use anyhow::Result;
use common::*;
use fileforge::codec::RasterCodec;
use fileforge::utils::NoMemorySampler;
use fileforge::{
    Codec, CodecRegistry, ConversionCoordinator, ConversionSession, ConversionSettings, FileBlob,
    NoEvents, RunOutcome, TargetFormat,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

fn session(codecs: Arc<CodecRegistry>) -> Result<ConversionSession> {
    let coordinator =
        ConversionCoordinator::new(2, codecs)?.with_memory_sampler(Box::new(NoMemorySampler));
    Ok(ConversionSession::with_coordinator(coordinator))
}

fn file(name: &str, media_type: &str) -> FileBlob {
    FileBlob::new(name, media_type, vec![1u8; 64])
}

fn pngs(n: usize) -> Vec<FileBlob> {
    (0..n).map(|i| file(&format!("p{i}.png"), PNG)).collect()
}

// --- sources ---

#[test]
fn test_add_sources_picks_the_only_supported_type() -> Result<()> {
    let mut s = session(registry(halving_codec()))?;
    let report = s.add_sources(
        vec![
            file("a.png", PNG),
            file("notes.txt", "text/plain"),
            file("b.png", PNG),
        ],
        None,
    )?;
    assert_eq!(s.source_type(), Some(PNG));
    assert_eq!(report.added, vec!["a.png", "b.png"]);
    assert_eq!(report.dropped, vec!["notes.txt"]);
    Ok(())
}

#[test]
fn test_add_sources_mixed_types_need_a_preference() -> Result<()> {
    let mut s = session(registry(halving_codec()))?;
    let mixed = vec![file("a.png", PNG), file("b.jpg", JPEG)];
    assert!(s.add_sources(mixed.clone(), None).is_err());
    assert!(s.sources().is_empty());

    let report = s.add_sources(mixed, Some("jpg"))?;
    assert_eq!(s.source_type(), Some(JPEG));
    assert_eq!(report.added, vec!["b.jpg"]);
    assert_eq!(report.dropped, vec!["a.png"]);
    Ok(())
}

#[test]
fn test_add_sources_rejects_only_unsupported_files() -> Result<()> {
    let mut s = session(registry(halving_codec()))?;
    let err = s
        .add_sources(vec![file("a.pdf", "application/pdf")], None)
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default();
    assert!(err.contains("PDF Document"), "got {err}");
    assert_eq!(s.source_type(), None);
    Ok(())
}

#[test]
fn test_add_sources_skips_duplicates_and_keeps_type() -> Result<()> {
    let mut s = session(registry(halving_codec()))?;
    s.add_sources(vec![file("a.png", PNG)], None)?;
    let report = s.add_sources(
        vec![file("a.png", PNG), file("c.bmp", BMP), file("d.png", PNG)],
        Some("bmp"),
    )?;
    assert_eq!(report.duplicates, vec!["a.png"]);
    assert_eq!(report.dropped, vec!["c.bmp"]);
    assert_eq!(report.added, vec!["d.png"]);
    assert_eq!(s.sources().len(), 2);
    Ok(())
}

// --- target format ---

#[test]
fn test_select_target_format_validates_against_source_type() -> Result<()> {
    let mut s = session(registry(halving_codec()))?;
    assert!(s.select_target_format(JPEG).is_err());
    s.add_sources(pngs(1), None)?;
    assert!(s.select_target_format(PNG).is_err());
    assert!(!s.select_target_format(JPEG)?);
    assert!(!s.select_target_format(JPEG)?);
    assert_eq!(s.target_format(), Some(&TargetFormat::new(JPEG)));
    Ok(())
}

#[test]
fn test_target_format_change_discards_targets_and_history() -> Result<()> {
    let mut s = session(registry(halving_codec()))?;
    s.add_sources(pngs(3), None)?;
    s.select_target_format(JPEG)?;
    s.convert_all(&mut NoEvents)?;
    assert_eq!(s.history().len(), 3);

    assert!(s.select_target_format(BMP)?);
    assert!(s.history().is_empty());
    assert!(s.targets().is_empty());
    assert_eq!(s.metrics().file_count(), 0);
    assert_eq!(s.progress(), 0.0);
    Ok(())
}

// --- conversion ---

#[test]
fn test_convert_all_stores_targets_before_notifying() -> Result<()> {
    let mut s = session(registry(halving_codec()))?;
    s.add_sources(pngs(7), None)?;
    s.select_target_format(JPEG)?;
    let mut events = Recorder::default();
    let outcome = s.convert_all(&mut events)?;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(events.batches.len(), 7);
    assert_eq!(s.targets().len(), s.sources().len());
    assert_eq!(s.progress(), 100.0);
    assert_eq!(
        s.target_for("p3.png").map(|t| t.name.as_str()),
        Some("p3-converted.jpeg")
    );

    // Nothing left to convert.
    assert_eq!(s.convert_all(&mut NoEvents)?, RunOutcome::Skipped);
    Ok(())
}

#[test]
fn test_progress_rounds_to_two_decimals() -> Result<()> {
    let mut s = session(registry(halving_codec()))?;
    s.add_sources(pngs(3), None)?;
    s.select_target_format(BMP)?;
    s.convert_source("p1.png", &mut NoEvents)?;
    assert_eq!(s.progress(), 33.33);
    assert!(s.convert_source("missing.png", &mut NoEvents).is_err());
    Ok(())
}

#[test]
fn test_convert_without_target_format_fails() -> Result<()> {
    let mut s = session(registry(halving_codec()))?;
    s.add_sources(pngs(2), None)?;
    assert!(s.convert_all(&mut NoEvents).is_err());
    Ok(())
}

#[test]
fn test_settings_merge_and_timeout_applies() -> Result<()> {
    let (blocking, _gate) = blocking_codec();
    let mut s = session(registry(blocking))?;
    s.update_settings(&ConversionSettings {
        timeout: Some(Duration::from_millis(50)),
        memory_limit_bytes: None,
    });
    s.update_settings(&ConversionSettings {
        timeout: None,
        memory_limit_bytes: Some(1 << 40),
    });
    assert_eq!(s.settings().timeout, Some(Duration::from_millis(50)));
    assert_eq!(s.settings().memory_limit_bytes, Some(1 << 40));

    s.add_sources(pngs(1), None)?;
    s.select_target_format(JPEG)?;
    let mut events = Recorder::default();
    s.convert_all(&mut events)?;
    assert_eq!(events.reports.len(), 1);
    assert_eq!(s.metrics().overall_metrics().counters.errors.timeout, 1);
    assert!(s.targets().is_empty());
    Ok(())
}

// --- removal ---

#[test]
fn test_remove_sources_clears_their_targets_and_history() -> Result<()> {
    let mut s = session(registry(halving_codec()))?;
    s.add_sources(pngs(4), None)?;
    s.select_target_format(JPEG)?;
    s.convert_source("p0.png", &mut NoEvents)?;
    s.convert_source("p1.png", &mut NoEvents)?;

    assert_eq!(s.remove_sources(["p0.png"]), 1);
    assert!(s.history().get("p0.png").is_none());
    assert_eq!(s.targets().len(), 1);
    assert_eq!(s.progress(), 33.33);

    assert_eq!(s.remove_sources_with_targets(), 1);
    assert_eq!(s.sources().len(), 2);
    assert!(s.history().is_empty());
    assert_eq!(s.target_format(), Some(&TargetFormat::new(JPEG)));
    Ok(())
}

#[test]
fn test_removing_last_source_resets_session() -> Result<()> {
    let mut s = session(registry(halving_codec()))?;
    s.add_sources(pngs(1), None)?;
    s.select_target_format(JPEG)?;
    s.convert_all(&mut NoEvents)?;
    s.remove_sources(["p0.png"]);
    assert_eq!(s.source_type(), None);
    assert_eq!(s.target_format(), None);
    assert!(s.history().is_empty());

    // A fresh first addition may choose a new type.
    s.add_sources(vec![file("x.bmp", BMP)], None)?;
    assert_eq!(s.source_type(), Some(BMP));
    Ok(())
}

// --- raster codec ---

fn png_bytes(w: u32, h: u32) -> Result<Vec<u8>> {
    let img = RgbaImage::from_pixel(w, h, Rgba([200, 10, 10, 128]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img).write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

#[test]
fn test_raster_codec_png_to_jpeg_and_bmp() -> Result<()> {
    let source = FileBlob::new("photo.png", PNG, png_bytes(8, 6)?);

    let jpeg = RasterCodec.convert(&source, &TargetFormat::new(JPEG))?;
    assert_eq!(jpeg.name, "photo-converted.jpeg");
    assert_eq!(jpeg.media_type, JPEG);
    assert_eq!(image::guess_format(jpeg.bytes())?, ImageFormat::Jpeg);

    let bmp = RasterCodec.convert(&source, &TargetFormat::new(BMP))?;
    assert_eq!(bmp.name, "photo-converted.bmp");
    let decoded = image::load_from_memory_with_format(bmp.bytes(), ImageFormat::Bmp)?;
    assert_eq!((decoded.width(), decoded.height()), (8, 6));
    Ok(())
}

#[test]
fn test_raster_codec_rejects_garbage() {
    let source = FileBlob::new("broken.png", PNG, vec![0u8; 16]);
    assert!(RasterCodec.convert(&source, &TargetFormat::new(JPEG)).is_err());
}

#[test]
fn test_session_with_builtin_codecs_end_to_end() -> Result<()> {
    let mut s = session(Arc::new(CodecRegistry::images()))?;
    let sources = vec![
        FileBlob::new("a.png", PNG, png_bytes(4, 4)?),
        FileBlob::new("b.png", PNG, png_bytes(16, 2)?),
        FileBlob::new("c.png", PNG, vec![9u8; 10]),
    ];
    s.add_sources(sources, None)?;
    s.select_target_format(BMP)?;
    let mut events = Recorder::default();
    s.convert_all(&mut events)?;

    let names: Vec<String> = s.targets().into_iter().map(|p| p.target.name).collect();
    assert_eq!(names, vec!["a-converted.bmp", "b-converted.bmp"]);
    let report = s.failure_report();
    assert_eq!(
        report.files(fileforge::history::ConversionErrorKind::ConversionFailed),
        ["c.png".to_string()]
    );
    assert_eq!(events.reports.len(), 1);
    Ok(())
}

//! Raster image codec backed by the `image` crate (PNG, JPEG, BMP).

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use super::Codec;
use super::guide::converted_file_name;
use crate::{FileBlob, TargetFormat};

#[derive(Clone, Copy, Debug, Default)]
pub struct RasterCodec;

impl RasterCodec {
    fn decode(source: &FileBlob) -> Result<DynamicImage> {
        let img = match ImageFormat::from_mime_type(&source.media_type) {
            Some(format) => image::load_from_memory_with_format(source.bytes(), format),
            None => image::load_from_memory(source.bytes()),
        };
        img.with_context(|| format!("Failed to decode image: {}", source.name))
    }

    fn encode(img: DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
        // JPEG has no alpha channel
        let img = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
            _ => img,
        };
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format)
            .with_context(|| format!("Failed to encode image as {:?}", format))?;
        Ok(buf.into_inner())
    }
}

impl Codec for RasterCodec {
    fn convert(&self, source: &FileBlob, target: &TargetFormat) -> Result<FileBlob> {
        let format = ImageFormat::from_mime_type(target.as_str())
            .ok_or_else(|| anyhow!("Unsupported target format: {}", target))?;
        let img = Self::decode(source)?;
        let bytes = Self::encode(img, format)?;
        Ok(FileBlob::new(
            converted_file_name(&source.name, target),
            target.as_str(),
            bytes,
        ))
    }
}

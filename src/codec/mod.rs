//! Per-format conversion delegates and the registry workers look them up in.

pub mod guide;
pub mod raster;

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{FileBlob, TargetFormat};

pub use guide::{
    FormatGuide, SourceSpec, TargetSpec, converted_file_name, describe_media_type,
    media_type_for_path,
};
pub use raster::RasterCodec;

/// Converts one source into the target format. Runs on a worker thread.
///
/// Any error is recorded as a generic conversion failure; no taxonomy is expected.
pub trait Codec: Send + Sync {
    fn convert(&self, source: &FileBlob, target: &TargetFormat) -> Result<FileBlob>;
}

impl<F> Codec for F
where
    F: Fn(&FileBlob, &TargetFormat) -> Result<FileBlob> + Send + Sync,
{
    fn convert(&self, source: &FileBlob, target: &TargetFormat) -> Result<FileBlob> {
        self(source, target)
    }
}

/// Target format -> codec. Shared read-only by every worker.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    by_target: HashMap<TargetFormat, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: impl Into<TargetFormat>, codec: Arc<dyn Codec>) -> Self {
        self.by_target.insert(target.into(), codec);
        self
    }

    /// Same codec for every listed target.
    pub fn uniform<I, T>(codec: Arc<dyn Codec>, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TargetFormat>,
    {
        targets
            .into_iter()
            .fold(Self::new(), |reg, t| reg.with(t, Arc::clone(&codec)))
    }

    /// Built-in raster codec for every image target in the format guide.
    pub fn images() -> Self {
        Self::uniform(Arc::new(RasterCodec), FormatGuide::get().all_targets())
    }

    pub fn get(&self, target: &TargetFormat) -> Option<&Arc<dyn Codec>> {
        self.by_target.get(target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &TargetFormat> {
        self.by_target.keys()
    }
}

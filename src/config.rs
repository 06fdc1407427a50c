//! Frame extractor configuration.
//!
//! [`FramesWriterConfig`] is a builder that carries the sampling stride and
//! cap, the progress callback, the camera device, and the clip encoder
//! settings into a [`FramesWriter`](crate::FramesWriter).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vidprep::{FramesWriterConfig, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let config = FramesWriterConfig::new()
//!     .with_frame_step(30)
//!     .with_frame_count(25)
//!     .with_progress(Arc::new(LogProgress));
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::{
    progress::{NoOpProgress, ProgressCallback},
    source::CameraDevice,
    writer::FourCc,
};

/// Default sampling stride, in frames.
pub const DEFAULT_FRAME_STEP: u64 = 200;
/// Default number of frames emitted per source.
pub const DEFAULT_FRAME_COUNT: u64 = 10;

/// Settings for [`FramesWriter`](crate::FramesWriter).
#[derive(Clone)]
pub struct FramesWriterConfig {
    pub(crate) frame_step: u64,
    pub(crate) frame_count: u64,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Fire the progress callback every N items.
    pub(crate) batch_size: u64,
    pub(crate) camera: CameraDevice,
    pub(crate) fourcc: FourCc,
    /// File extension of clip outputs, which also selects their container.
    pub(crate) clip_extension: String,
}

impl Debug for FramesWriterConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FramesWriterConfig")
            .field("frame_step", &self.frame_step)
            .field("frame_count", &self.frame_count)
            .field("batch_size", &self.batch_size)
            .field("camera", &self.camera)
            .field("fourcc", &self.fourcc)
            .field("clip_extension", &self.clip_extension)
            .finish_non_exhaustive()
    }
}

impl Default for FramesWriterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FramesWriterConfig {
    /// Defaults: step 200, count 10, no progress callback, batch size 1,
    /// platform camera, `mp4v` clips in `.mp4` files.
    pub fn new() -> Self {
        Self {
            frame_step: DEFAULT_FRAME_STEP,
            frame_count: DEFAULT_FRAME_COUNT,
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
            camera: CameraDevice::default(),
            fourcc: FourCc::MP4V,
            clip_extension: "mp4".to_string(),
        }
    }

    /// Set the sampling stride in frames. Zero is rejected when the
    /// [`FramesWriter`](crate::FramesWriter) is built.
    #[must_use]
    pub fn with_frame_step(mut self, frame_step: u64) -> Self {
        self.frame_step = frame_step;
        self
    }

    /// Set the maximum number of frames written per source.
    #[must_use]
    pub fn with_frame_count(mut self, frame_count: u64) -> Self {
        self.frame_count = frame_count;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how often the progress callback fires. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Use a specific capture device for [`VideoSource::Camera`](crate::VideoSource::Camera).
    #[must_use]
    pub fn with_camera(mut self, camera: CameraDevice) -> Self {
        self.camera = camera;
        self
    }

    /// Set the codec tag used for clip outputs.
    #[must_use]
    pub fn with_fourcc(mut self, fourcc: FourCc) -> Self {
        self.fourcc = fourcc;
        self
    }

    /// Set the file extension of clip outputs (leading dots are ignored).
    #[must_use]
    pub fn with_clip_extension(mut self, extension: &str) -> Self {
        self.clip_extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Sampling stride in frames.
    pub fn frame_step(&self) -> u64 {
        self.frame_step
    }

    /// Maximum number of frames written per source.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

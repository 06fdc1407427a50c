//! # vidprep
//!
//! Dataset preparation for computer-vision work: keep annotation and image
//! folders in step, sample still frames from videos, and cut videos into
//! clips by time range.
//!
//! Video decoding and encoding are powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate; frames are
//! handed around as [`image::DynamicImage`] values.
//!
//! ## Quick Start
//!
//! ### Reconcile Two Folders
//!
//! ```no_run
//! use vidprep::DirectoryReconciler;
//!
//! // Remove every image whose annotation file no longer exists.
//! let mut reconciler = DirectoryReconciler::new("labels", "images", "txt", "jpg").unwrap();
//! let report = reconciler.delete_orphans().unwrap();
//! println!("deleted {} image(s)", report.deleted.len());
//! ```
//!
//! ### Copy a Random Sample of Pairs
//!
//! ```no_run
//! use vidprep::DirectoryReconciler;
//!
//! let reconciler = DirectoryReconciler::new("labels", "images", "txt", "jpg").unwrap();
//! let picked = reconciler.random_copy("val/labels", "val/images", 0.1).unwrap();
//! ```
//!
//! ### Sample Frames From Videos
//!
//! ```no_run
//! use vidprep::{FramesWriter, FramesWriterConfig};
//!
//! let config = FramesWriterConfig::new().with_frame_step(100).with_frame_count(5);
//! let mut writer = FramesWriter::new(["a.mp4", "b.mp4"], config).unwrap();
//! writer.write("frames/").unwrap();
//! ```
//!
//! ### Resolve Streaming Pages
//!
//! ```no_run
//! use vidprep::{FramesWriter, FramesWriterConfig, YtDlpResolver, resolver_transform};
//!
//! let mut writer = FramesWriter::with_transform(
//!     ["https://www.youtube.com/watch?v=dQw4w9WgXcQ"],
//!     FramesWriterConfig::new(),
//!     resolver_transform(YtDlpResolver::default()),
//! )
//! .unwrap();
//! writer.write("frames/yt_").unwrap();
//! ```
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system. Camera
//! capture needs libavdevice, and URL resolution needs `yt-dlp` on `PATH`.

pub mod capture;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod frames;
pub mod progress;
pub mod reconcile;
pub mod resolve;
pub mod sampling;
pub mod source;
mod utilities;
pub mod writer;

pub use capture::{SeekTarget, VideoCapture};
pub use config::{DEFAULT_FRAME_COUNT, DEFAULT_FRAME_STEP, FramesWriterConfig};
pub use error::VidprepError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use frames::{FramesWriter, SourceTransform, WriteSummary};
pub use progress::{OperationType, ProgressCallback, ProgressInfo};
pub use reconcile::{DeletionReport, DirectoryReconciler, compute_name_set};
pub use resolve::{
    DEFAULT_FORMAT_SELECTOR, StreamResolver, YtDlpResolver, resolve_urls, resolve_urls_with_progress,
    resolver_transform,
};
pub use sampling::{
    ClipWindow, FrameSink, FrameSource, SampledFrame, SamplingPlan, StrideDecision, TimeRange,
    clip_interval, sample_frames,
};
pub use source::{CameraDevice, VideoSource};
pub use writer::{FourCc, VideoWriter, WriterOptions};

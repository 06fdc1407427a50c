//! Error types for the `vidprep` crate.
//!
//! This module defines [`VidprepError`], the unified error type returned by
//! every fallible operation in the crate. Variants carry the paths, URLs,
//! and upstream messages needed to diagnose a failure at the call site.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `vidprep` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VidprepError {
    /// A directory could not be listed.
    #[error("Failed to list directory {path}: {source}")]
    DirectoryList {
        /// Directory that was being listed.
        path: PathBuf,
        /// Underlying I/O error.
        source: IoError,
    },

    /// A destination file could not be removed for a reason other than it
    /// already being absent.
    #[error("Failed to delete {path}: {source}")]
    FileDelete {
        /// File that was being removed.
        path: PathBuf,
        /// Underlying I/O error.
        source: IoError,
    },

    /// A file could not be copied.
    #[error("Failed to copy {from} to {to}: {source}")]
    FileCopy {
        /// Source path.
        from: PathBuf,
        /// Target path.
        to: PathBuf,
        /// Underlying I/O error.
        source: IoError,
    },

    /// A sampling ratio was negative or not a finite number.
    #[error("Invalid sampling ratio: {0} (must be a finite number >= 0)")]
    InvalidRatio(f64),

    /// A frame step of zero was provided.
    #[error("Frame step must be greater than zero")]
    InvalidInterval,

    /// A time range had a negative or non-finite bound.
    #[error("Invalid time range: {start}s - {stop}s")]
    InvalidTimeRange {
        /// Start of the range in seconds.
        start: f64,
        /// Stop of the range in seconds.
        stop: f64,
    },

    /// The number of time-range lists differs from the number of pending
    /// sources.
    #[error(
        "Wrong number of source videos and time ranges: {sources} source(s), {ranges} range list(s)"
    )]
    RangeCountMismatch {
        /// Number of pending sources.
        sources: usize,
        /// Number of time-range lists supplied.
        ranges: usize,
    },

    /// A video source could not be opened.
    #[error("Failed to open video source {source_name}: {reason}")]
    CaptureOpen {
        /// Display form of the source.
        source_name: String,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The opened input has no video stream.
    #[error("No video stream found in source")]
    NoVideoStream,

    /// The live capture device could not be located.
    #[error("Camera input format '{0}' is not available in this FFmpeg build")]
    CameraUnavailable(String),

    /// A codec tag string is not four ASCII characters.
    #[error("Invalid codec tag '{0}': expected exactly four ASCII characters")]
    InvalidCodecTag(String),

    /// A codec tag does not map to a known encoder.
    #[error("Unsupported codec tag: {0}")]
    UnsupportedCodecTag(String),

    /// The encoder could not be found or configured.
    #[error("Video encoding error: {0}")]
    VideoEncodeError(String),

    /// The output container could not be written.
    #[error("Video write error: {0}")]
    VideoWriteError(String),

    /// A streaming page URL could not be resolved to a playable stream.
    #[error("Failed to resolve stream for {url}: {reason}")]
    StreamResolution {
        /// The page URL that was being resolved.
        url: String,
        /// Underlying reason the lookup failed.
        reason: String,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while saving a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for VidprepError {
    fn from(error: FfmpegError) -> Self {
        VidprepError::FfmpegError(error.to_string())
    }
}

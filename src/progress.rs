//! Progress reporting.
//!
//! This module provides [`ProgressCallback`] for observing long-running
//! operations and [`ProgressInfo`] for the snapshots delivered to it.
//! Callbacks run on the calling thread; they observe but cannot stop the
//! operation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vidprep::{
//!     FramesWriter, FramesWriterConfig, ProgressCallback, ProgressInfo, VideoSource,
//!     VidprepError,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.operation);
//!         }
//!     }
//! }
//!
//! let config = FramesWriterConfig::new().with_progress(Arc::new(PrintProgress));
//! let mut writer = FramesWriter::new(vec![VideoSource::from("input.mp4")], config)?;
//! writer.write("frames/")?;
//! # Ok::<(), VidprepError>(())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// The kind of operation currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Sampling frames from a video source into image files.
    FrameSampling,
    /// Cutting time ranges out of a source into separate clips.
    Clipping,
    /// Resolving streaming page URLs to playable streams.
    UrlResolution,
}

/// Progress of one running operation.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Which operation is reporting.
    pub operation: OperationType,
    /// Frames saved, clips written, or URLs resolved so far.
    pub current: u64,
    /// Upper bound on `current`, when known up front. For frame sampling
    /// this is the per-source frame cap, which short sources never reach.
    pub total: Option<u64>,
    /// `current` as a percentage of `total`.
    pub percentage: Option<f32>,
    /// Time since the operation started.
    pub elapsed: Duration,
    /// Extrapolated from the average time per item so far.
    pub estimated_remaining: Option<Duration>,
    /// The read index of the frame just processed (frame sampling only).
    pub current_frame: Option<u64>,
    /// The stream position just processed.
    pub current_timestamp: Option<Duration>,
}

/// Receives [`ProgressInfo`] snapshots.
///
/// Shared behind an [`Arc`] inside [`FramesWriterConfig`](crate::FramesWriterConfig),
/// hence the [`Send`] and [`Sync`] bounds.
pub trait ProgressCallback: Send + Sync {
    /// Called after every batch of completed items and once at the end.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Callback used when none is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Counts completed items and forwards a [`ProgressInfo`] to the callback
/// once every `batch_size` items.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    completed: u64,
    batch_size: u64,
    pending_in_batch: u64,
    started: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            completed: 0,
            batch_size: batch_size.max(1),
            pending_in_batch: 0,
            started: Instant::now(),
        }
    }

    /// Count one finished item. `frame_number` and `timestamp` describe it
    /// when known.
    pub(crate) fn advance(&mut self, frame_number: Option<u64>, timestamp: Option<Duration>) {
        self.completed += 1;
        self.pending_in_batch += 1;
        if self.pending_in_batch == self.batch_size {
            self.pending_in_batch = 0;
            self.report(frame_number, timestamp);
        }
    }

    /// Report the final count regardless of batching.
    pub(crate) fn finish(&mut self) {
        self.pending_in_batch = 0;
        self.report(None, None);
    }

    fn report(&self, current_frame: Option<u64>, current_timestamp: Option<Duration>) {
        let elapsed = self.started.elapsed();
        let known_total = self.total.filter(|&total| total > 0);

        let percentage =
            known_total.map(|total| self.completed as f32 * 100.0 / total as f32);
        let estimated_remaining = match known_total {
            Some(total) if self.completed > 0 => {
                let left = total.saturating_sub(self.completed) as f64;
                Some(elapsed.mul_f64(left / self.completed as f64))
            }
            _ => None,
        };

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.completed,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame,
            current_timestamp,
        });
    }
}

//! Frame extraction over a queue of video sources.
//!
//! [`FramesWriter`] keeps a queue of pending [`VideoSource`]s. Calling
//! [`write`](FramesWriter::write) samples every pending source at a fixed
//! stride, saves the selected frames as timestamped PNG files, and moves
//! the sources to the processed list.
//! [`clip_by_time_ranges`](FramesWriter::clip_by_time_ranges) cuts the
//! pending sources into numbered clips instead.
//!
//! # Example
//!
//! ```no_run
//! use vidprep::{FramesWriter, FramesWriterConfig, TimeRange, VidprepError};
//!
//! let config = FramesWriterConfig::new().with_frame_step(50).with_frame_count(20);
//! let mut writer = FramesWriter::new(["drive_01.mp4", "drive_02.mp4"], config)?;
//!
//! writer.clip_by_time_ranges(
//!     "clips",
//!     &[
//!         vec![TimeRange::new(2.0, 5.0), TimeRange::new(30.0, 42.5)],
//!         vec![TimeRange::new(0.0, 10.0)],
//!     ],
//! )?;
//!
//! // Frames land in `frames/` as `<timestamp>.png`.
//! let summary = writer.write("frames/")?;
//! println!("{} frame(s) from {} source(s)", summary.frames_written, summary.sources);
//! # Ok::<(), VidprepError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{
    capture::{SeekTarget, VideoCapture},
    config::FramesWriterConfig,
    error::VidprepError,
    progress::{OperationType, ProgressTracker},
    sampling::{ClipWindow, SamplingPlan, TimeRange, clip_interval, sample_frames},
    source::VideoSource,
    utilities::timestamped_frame_path,
    writer::{VideoWriter, WriterOptions},
};

/// A fallible rewrite of a list of sources, applied when sources are added.
///
/// The typical transform resolves streaming page URLs into playable streams
/// (see [`resolver_transform`](crate::resolver_transform)).
pub type SourceTransform =
    Arc<dyn Fn(Vec<VideoSource>) -> Result<Vec<VideoSource>, VidprepError> + Send + Sync>;

/// Outcome of [`FramesWriter::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct WriteSummary {
    /// Number of sources that were drained from the queue.
    pub sources: usize,
    /// Total number of image files written.
    pub frames_written: u64,
    /// Paths of the written image files, in write order.
    pub files: Vec<PathBuf>,
    /// Sources that could not be opened and produced no frames.
    pub unreadable: Vec<VideoSource>,
}

/// Samples frames from a queue of video sources.
pub struct FramesWriter {
    config: FramesWriterConfig,
    plan: SamplingPlan,
    transform: Option<SourceTransform>,
    pending: Vec<VideoSource>,
    processed: Vec<VideoSource>,
}

impl Debug for FramesWriter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FramesWriter")
            .field("config", &self.config)
            .field("has_transform", &self.transform.is_some())
            .field("pending", &self.pending)
            .field("processed", &self.processed)
            .finish()
    }
}

impl FramesWriter {
    /// Create a writer with an initial list of sources.
    ///
    /// # Errors
    ///
    /// Returns [`VidprepError::InvalidInterval`] if the configured frame step
    /// is zero.
    pub fn new<I, S>(sources: I, config: FramesWriterConfig) -> Result<Self, VidprepError>
    where
        I: IntoIterator<Item = S>,
        S: Into<VideoSource>,
    {
        Self::build(sources, config, None)
    }

    /// Create a writer whose default transform is applied to the initial
    /// sources and to every later [`add`](FramesWriter::add) that does not
    /// bring its own.
    ///
    /// # Errors
    ///
    /// Returns [`VidprepError::InvalidInterval`] for a zero frame step, or
    /// the transform's error.
    pub fn with_transform<I, S>(
        sources: I,
        config: FramesWriterConfig,
        transform: SourceTransform,
    ) -> Result<Self, VidprepError>
    where
        I: IntoIterator<Item = S>,
        S: Into<VideoSource>,
    {
        Self::build(sources, config, Some(transform))
    }

    fn build<I, S>(
        sources: I,
        config: FramesWriterConfig,
        transform: Option<SourceTransform>,
    ) -> Result<Self, VidprepError>
    where
        I: IntoIterator<Item = S>,
        S: Into<VideoSource>,
    {
        let plan = SamplingPlan::new(config.frame_step, config.frame_count)?;
        let mut writer = Self {
            config,
            plan,
            transform: None,
            pending: Vec::new(),
            processed: Vec::new(),
        };
        writer.transform = transform;
        writer.add(sources, None)?;
        Ok(writer)
    }

    /// Append sources to the pending queue.
    ///
    /// The sources are passed through `transform` if one is given, else the
    /// writer's default transform, else left as they are.
    ///
    /// # Errors
    ///
    /// Returns the transform's error; the queue is unchanged in that case.
    pub fn add<I, S>(
        &mut self,
        sources: I,
        transform: Option<&dyn Fn(Vec<VideoSource>) -> Result<Vec<VideoSource>, VidprepError>>,
    ) -> Result<(), VidprepError>
    where
        I: IntoIterator<Item = S>,
        S: Into<VideoSource>,
    {
        let sources: Vec<VideoSource> = sources.into_iter().map(Into::into).collect();
        let sources = match (transform, &self.transform) {
            (Some(transform), _) => transform(sources)?,
            (None, Some(default)) => default(sources)?,
            (None, None) => sources,
        };
        log::debug!("Queued {} source(s)", sources.len());
        self.pending.extend(sources);
        Ok(())
    }

    /// Sources waiting for the next [`write`](FramesWriter::write).
    pub fn pending(&self) -> &[VideoSource] {
        &self.pending
    }

    /// Sources drained by earlier writes, in processing order.
    pub fn processed(&self) -> &[VideoSource] {
        &self.processed
    }

    /// The sampling stride and cap in effect.
    pub fn plan(&self) -> SamplingPlan {
        self.plan
    }

    /// Sample every pending source and save the selected frames.
    ///
    /// Each source is positioned at frame `frame_step` and read forward;
    /// every `frame_step`-th read is saved as
    /// `<destination_prefix><local timestamp>.png`, up to `frame_count`
    /// frames per source. The prefix is used verbatim, so pass a trailing
    /// separator to write into a directory. A source that cannot be opened
    /// is logged and yields no frames. Afterwards the pending queue is empty
    /// and its sources are appended to [`processed`](FramesWriter::processed).
    ///
    /// # Errors
    ///
    /// Returns [`VidprepError::ImageError`] if a frame cannot be saved. The
    /// pending queue is left intact in that case.
    pub fn write<P: AsRef<Path>>(
        &mut self,
        destination_prefix: P,
    ) -> Result<WriteSummary, VidprepError> {
        let prefix = destination_prefix.as_ref();
        log::info!(
            "Sampling {} source(s) into {}* (step {}, count {})",
            self.pending.len(),
            prefix.display(),
            self.plan.frame_step(),
            self.plan.frame_count(),
        );

        let mut summary = WriteSummary::default();
        for source in &self.pending {
            match self.write_source(source, prefix, &mut summary.files)? {
                Some(written) => summary.frames_written += written,
                None => summary.unreadable.push(source.clone()),
            }
        }

        summary.sources = self.pending.len();
        self.processed.append(&mut self.pending);
        log::info!(
            "Wrote {} frame(s) from {} source(s)",
            summary.frames_written,
            summary.sources,
        );
        Ok(summary)
    }

    /// Returns `None` if the source could not be opened.
    fn write_source(
        &self,
        source: &VideoSource,
        prefix: &Path,
        files: &mut Vec<PathBuf>,
    ) -> Result<Option<u64>, VidprepError> {
        let mut capture = match VideoCapture::open(source, &self.config.camera) {
            Ok(capture) => capture,
            Err(error) => {
                log::warn!("Skipping {source}: {error}");
                return Ok(None);
            }
        };
        capture.seek(SeekTarget::Frame(self.plan.start_frame()));

        let mut tracker = ProgressTracker::new(
            self.config.progress.clone(),
            OperationType::FrameSampling,
            Some(self.plan.frame_count()),
            self.config.batch_size,
        );

        let written = sample_frames(&mut capture, &self.plan, |frame| {
            let path = timestamped_frame_path(prefix);
            frame.image.save(&path)?;
            log::debug!("Frame {} of {source} -> {}", frame.read_index, path.display());
            files.push(path);
            tracker.advance(
                Some(frame.read_index),
                Duration::try_from_secs_f64(frame.position_millis / 1000.0).ok(),
            );
            Ok(())
        })?;

        tracker.finish();
        Ok(Some(written))
    }

    /// Cut each pending source into one clip per time range.
    ///
    /// `time_ranges[i]` lists the `(start, stop)` ranges, in seconds, for
    /// the `i`-th pending source. Every range is written to
    /// `<destination_dir>/<n>.<ext>` where `n` counts up across the whole
    /// call. A clip holds the frames from the seek position at `start`
    /// through the last frame positioned at or before `stop`. Overlapping or
    /// reversed ranges are not rejected. The pending queue is not modified.
    ///
    /// Returns the paths of the clips that were written. A source that
    /// cannot be opened is logged and its ranges are skipped; their numbers
    /// are still consumed.
    ///
    /// # Errors
    ///
    /// - [`VidprepError::RangeCountMismatch`] if the number of range lists
    ///   differs from the number of pending sources, before anything is
    ///   opened.
    /// - [`VidprepError::InvalidTimeRange`] for negative or non-finite
    ///   bounds, also before anything is opened.
    /// - Writer errors from [`VideoWriter`].
    pub fn clip_by_time_ranges<P: AsRef<Path>>(
        &self,
        destination_dir: P,
        time_ranges: &[Vec<TimeRange>],
    ) -> Result<Vec<PathBuf>, VidprepError> {
        if self.pending.len() != time_ranges.len() {
            return Err(VidprepError::RangeCountMismatch {
                sources: self.pending.len(),
                ranges: time_ranges.len(),
            });
        }

        let windows = time_ranges
            .iter()
            .map(|ranges| ranges.iter().map(TimeRange::to_window).collect())
            .collect::<Result<Vec<Vec<ClipWindow>>, VidprepError>>()?;

        let destination_dir = destination_dir.as_ref();
        let total = windows.iter().map(Vec::len).sum::<usize>();
        log::info!(
            "Clipping {} range(s) from {} source(s) into {}",
            total,
            self.pending.len(),
            destination_dir.display(),
        );

        let mut tracker = ProgressTracker::new(
            self.config.progress.clone(),
            OperationType::Clipping,
            Some(total as u64),
            self.config.batch_size,
        );

        let mut outputs = Vec::with_capacity(total);
        let mut clip_number: u64 = 0;
        for (source, source_windows) in self.pending.iter().zip(&windows) {
            for window in source_windows {
                let path =
                    destination_dir.join(format!("{clip_number}.{}", self.config.clip_extension));
                clip_number += 1;

                if self.clip_source(source, window, &path)? {
                    outputs.push(path);
                }
                tracker.advance(None, Some(window.start()));
            }
        }

        tracker.finish();
        Ok(outputs)
    }

    /// Returns `false` if the source could not be opened.
    fn clip_source(
        &self,
        source: &VideoSource,
        window: &ClipWindow,
        path: &Path,
    ) -> Result<bool, VidprepError> {
        let mut capture = match VideoCapture::open(source, &self.config.camera) {
            Ok(capture) => capture,
            Err(error) => {
                log::warn!("Skipping clip {} of {source}: {error}", path.display());
                return Ok(false);
            }
        };
        capture.seek(SeekTarget::Millis(window.start_millis));

        let options = WriterOptions::from_capture(&capture).fourcc(self.config.fourcc);
        let mut writer = VideoWriter::create(path, &options)?;
        let written = clip_interval(&mut capture, &mut writer, window)?;

        log::debug!(
            "{source} [{:.0} ms, {:.0} ms] -> {} ({written} frame(s))",
            window.start_millis,
            window.stop_millis,
            path.display(),
        );
        Ok(true)
    }
}

//! Frame sampling and time-range clipping logic.
//!
//! The loops here are independent of FFmpeg: they drive any
//! [`FrameSource`] and write into any [`FrameSink`]. [`VideoCapture`] and
//! [`VideoWriter`] are the production implementations.
//!
//! Two distinct stop policies live in this module and are kept separate on
//! purpose:
//!
//! - stride sampling stops once `read_index / frame_step == frame_count`
//!   ([`SamplingPlan::decide`]);
//! - clipping keeps a frame while its position is `<= stop`
//!   ([`ClipWindow::admits`]), so the stop boundary is inclusive.
//!
//! [`VideoCapture`]: crate::VideoCapture
//! [`VideoWriter`]: crate::VideoWriter

use std::time::Duration;

use image::DynamicImage;

use crate::error::VidprepError;

/// A sequential reader of decoded frames.
pub trait FrameSource {
    /// Read the next frame. `None` means end of stream or a failed read;
    /// the two are not distinguished.
    fn read_frame(&mut self) -> Option<DynamicImage>;

    /// Position of the most recently read frame, in milliseconds.
    fn position_millis(&self) -> f64;
}

/// A sequential writer of frames into an output video.
pub trait FrameSink {
    /// Append one frame.
    fn write_frame(&mut self, frame: &DynamicImage) -> Result<(), VidprepError>;

    /// Flush and close the output. Called once after the last frame.
    fn finish(&mut self) -> Result<(), VidprepError>;
}

/// What to do with the frame at a given read index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrideDecision {
    /// Write the frame.
    Emit,
    /// Read past the frame.
    Skip,
    /// The scan budget is used up; stop reading this source.
    Stop,
}

/// Stride-based sampling: every `frame_step`-th frame, `frame_count` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPlan {
    frame_step: u64,
    frame_count: u64,
}

impl SamplingPlan {
    /// Create a plan.
    ///
    /// # Errors
    ///
    /// Returns [`VidprepError::InvalidInterval`] if `frame_step` is zero.
    pub fn new(frame_step: u64, frame_count: u64) -> Result<Self, VidprepError> {
        if frame_step == 0 {
            return Err(VidprepError::InvalidInterval);
        }
        Ok(Self {
            frame_step,
            frame_count,
        })
    }

    /// Number of frames between two emitted frames.
    pub fn frame_step(&self) -> u64 {
        self.frame_step
    }

    /// Maximum number of frames emitted per source.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frame number a source is positioned at before reading starts.
    pub fn start_frame(&self) -> u64 {
        self.frame_step
    }

    /// Decide what to do with the frame at zero-based `read_index`.
    pub fn decide(&self, read_index: u64) -> StrideDecision {
        if read_index / self.frame_step == self.frame_count {
            StrideDecision::Stop
        } else if read_index % self.frame_step == 0 {
            StrideDecision::Emit
        } else {
            StrideDecision::Skip
        }
    }
}

/// A frame selected by [`sample_frames`].
#[derive(Debug, Clone, Copy)]
pub struct SampledFrame<'a> {
    /// Zero-based index of the read that produced the frame.
    pub read_index: u64,
    /// Position reported by the source for this frame, in milliseconds.
    pub position_millis: f64,
    /// The decoded frame.
    pub image: &'a DynamicImage,
}

/// Read `source` to the end of `plan`, handing every emitted frame to
/// `emit`.
///
/// The stop test runs after each successful read, so a source that reaches
/// the scan budget has one frame consumed past the last emitted one.
/// Returns the number of emitted frames.
///
/// # Errors
///
/// Returns the first error produced by `emit`.
pub fn sample_frames<S, F>(
    source: &mut S,
    plan: &SamplingPlan,
    mut emit: F,
) -> Result<u64, VidprepError>
where
    S: FrameSource + ?Sized,
    F: FnMut(SampledFrame<'_>) -> Result<(), VidprepError>,
{
    let mut emitted = 0;
    let mut read_index = 0;

    while let Some(frame) = source.read_frame() {
        match plan.decide(read_index) {
            StrideDecision::Stop => break,
            StrideDecision::Emit => {
                emit(SampledFrame {
                    read_index,
                    position_millis: source.position_millis(),
                    image: &frame,
                })?;
                emitted += 1;
            }
            StrideDecision::Skip => {}
        }
        read_index += 1;
    }

    Ok(emitted)
}

/// A `(start, stop)` pair in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    /// Start of the range, in seconds.
    pub start: f64,
    /// End of the range, in seconds (inclusive).
    pub stop: f64,
}

impl TimeRange {
    /// Create a range. Ordering is not checked: a range whose start lies
    /// after its stop simply produces an empty clip.
    pub fn new(start: f64, stop: f64) -> Self {
        Self { start, stop }
    }

    /// Convert to a millisecond window.
    ///
    /// # Errors
    ///
    /// Returns [`VidprepError::InvalidTimeRange`] if either bound is
    /// negative or not finite.
    pub fn to_window(&self) -> Result<ClipWindow, VidprepError> {
        let valid = |value: f64| value.is_finite() && value >= 0.0;
        if !valid(self.start) || !valid(self.stop) {
            return Err(VidprepError::InvalidTimeRange {
                start: self.start,
                stop: self.stop,
            });
        }
        Ok(ClipWindow {
            start_millis: self.start * 1000.0,
            stop_millis: self.stop * 1000.0,
        })
    }
}

impl From<(f64, f64)> for TimeRange {
    fn from((start, stop): (f64, f64)) -> Self {
        Self::new(start, stop)
    }
}

/// A clip boundary in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    /// Where the capture is positioned before reading.
    pub start_millis: f64,
    /// Last admissible position (inclusive).
    pub stop_millis: f64,
}

impl ClipWindow {
    /// Whether a frame read at `position_millis` belongs in the clip.
    ///
    /// Only the stop bound is tested; the start bound is enforced by
    /// seeking.
    pub fn admits(&self, position_millis: f64) -> bool {
        position_millis <= self.stop_millis
    }

    /// The start bound as a [`Duration`].
    pub fn start(&self) -> Duration {
        Duration::try_from_secs_f64(self.start_millis / 1000.0).unwrap_or_default()
    }
}

/// Copy frames from `source` into `sink` while they fall inside `window`.
///
/// Reading stops at the first failed read or the first frame past the stop
/// bound; that frame is not written. The sink is finished before
/// returning. Returns the number of frames written.
///
/// # Errors
///
/// Returns the first error from the sink.
pub fn clip_interval<S, K>(
    source: &mut S,
    sink: &mut K,
    window: &ClipWindow,
) -> Result<u64, VidprepError>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    let mut written = 0;

    while let Some(frame) = source.read_frame() {
        if !window.admits(source.position_millis()) {
            break;
        }
        sink.write_frame(&frame)?;
        written += 1;
    }

    sink.finish()?;
    Ok(written)
}

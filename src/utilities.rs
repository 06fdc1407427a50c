//! Internal utility functions.
//!
//! Timestamp conversions, pixel-buffer packing, and frame-file naming shared
//! by the capture, writer, and frame extractor.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Timestamp layout used to name extracted frame images.
pub(crate) const FRAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Copy pixel data from an RGB24 frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3).
pub(crate) fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == row_length {
        return data[..row_length * (height as usize)].to_vec();
    }

    let mut buffer = Vec::with_capacity(row_length * (height as usize));
    for row in 0..(height as usize) {
        let row_start = row * stride;
        buffer.extend_from_slice(&data[row_start..row_start + row_length]);
    }
    buffer
}

/// Copy a tightly-packed RGB buffer into an RGB24 frame, honouring its stride.
pub(crate) fn rgb_buffer_to_frame(buffer: &[u8], video_frame: &mut VideoFrame, width: u32, height: u32) {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * 3;
    let data = video_frame.data_mut(0);
    for row in 0..(height as usize) {
        let source_start = row * row_length;
        let target_start = row * stride;
        data[target_start..target_start + row_length]
            .copy_from_slice(&buffer[source_start..source_start + row_length]);
    }
}

/// Rescale a PTS value from the stream time base to milliseconds.
pub(crate) fn pts_to_millis(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 * 1000.0 / time_base.denominator() as f64
}

/// Convert milliseconds to a container seek timestamp in AV_TIME_BASE
/// (microseconds), as expected by `input_context.seek()`.
pub(crate) fn millis_to_seek_timestamp(millis: f64) -> i64 {
    (millis * 1000.0) as i64
}

/// Offset of the first presentable frame, in milliseconds.
///
/// Prefers the stream start time (in `time_base`) and falls back to the
/// container start time (in AV_TIME_BASE); unknown values are
/// `AV_NOPTS_VALUE` and give zero.
pub(crate) fn start_offset_millis(
    stream_start: i64,
    time_base: Rational,
    container_start: i64,
) -> f64 {
    if stream_start != ffmpeg_sys_next::AV_NOPTS_VALUE {
        pts_to_millis(stream_start, time_base)
    } else if container_start != ffmpeg_sys_next::AV_NOPTS_VALUE {
        container_start as f64 / 1000.0
    } else {
        0.0
    }
}

/// Index of the frame showing at `millis` for a constant frame rate.
pub(crate) fn millis_to_frame_number(millis: f64, frames_per_second: f64) -> u64 {
    (millis * frames_per_second / 1000.0).round().max(0.0) as u64
}

/// Milliseconds at which `frame_number` starts for a constant frame rate.
pub(crate) fn frame_number_to_millis(frame_number: u64, frames_per_second: f64) -> f64 {
    frame_number as f64 * 1000.0 / frames_per_second
}

/// Approximate a floating-point frame rate as a rational with a small
/// denominator, which MPEG-4 style encoders require for their time base.
pub(crate) fn frame_rate_to_rational(frames_per_second: f64) -> Rational {
    let scaled = (frames_per_second * 1000.0).round().clamp(1.0, i32::MAX as f64) as i32;
    Rational::new(scaled, 1000).reduce()
}

/// Frame rate of a stream, preferring the average rate over the base rate.
pub(crate) fn rational_to_fps(primary: Rational, fallback: Rational) -> f64 {
    [primary, fallback]
        .into_iter()
        .find(|rate| rate.denominator() != 0 && rate.numerator() > 0)
        .map_or(0.0, |rate| rate.numerator() as f64 / rate.denominator() as f64)
}

/// Build `<prefix><local timestamp>.png`.
///
/// The prefix is used verbatim, so a directory prefix needs its trailing
/// separator.
pub(crate) fn timestamped_frame_path(prefix: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format(FRAME_TIMESTAMP_FORMAT);
    let mut name = OsString::from(prefix.as_os_str());
    name.push(format!("{stamp}.png"));
    PathBuf::from(name)
}

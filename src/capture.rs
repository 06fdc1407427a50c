//! Sequential, seekable frame reader.
//!
//! [`VideoCapture`] opens a [`VideoSource`], decodes its best video stream,
//! and hands out frames one at a time as RGB8 [`DynamicImage`] values. It
//! plays the role of a capture handle: position it once with
//! [`seek`](VideoCapture::seek), then call
//! [`read_frame`](VideoCapture::read_frame) until it returns `None`.
//!
//! The demuxer, decoder, and scaler are owned by the capture and released
//! when it is dropped, whichever way the caller leaves scope.
//!
//! # Example
//!
//! ```no_run
//! use vidprep::{CameraDevice, SeekTarget, VideoCapture, VideoSource, VidprepError};
//!
//! let source = VideoSource::from("input.mp4");
//! let mut capture = VideoCapture::open(&source, &CameraDevice::default())?;
//! capture.seek(SeekTarget::Millis(2_000.0));
//! while let Some(frame) = capture.read_frame() {
//!     println!("{:.0} ms: {}x{}", capture.position_millis(), frame.width(), frame.height());
//! }
//! # Ok::<(), VidprepError>(())
//! ```

use std::{
    ffi::CString,
    fmt::{Debug, Formatter, Result as FmtResult},
};

use ffmpeg_next::{
    Dictionary, Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{
        Pixel,
        context::Input,
        format::{Format, Input as InputFormat},
    },
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::{
    error::VidprepError,
    sampling::FrameSource,
    source::{CameraDevice, VideoSource},
    utilities::{
        frame_number_to_millis, frame_to_rgb_buffer, millis_to_frame_number,
        millis_to_seek_timestamp, pts_to_millis, rational_to_fps, start_offset_millis,
    },
};

/// Where to position a capture before reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// A zero-based frame number.
    Frame(u64),
    /// A stream position in milliseconds.
    Millis(f64),
}

/// A decoding handle over one video source.
pub struct VideoCapture {
    source: VideoSource,
    input_context: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    video_stream_index: usize,
    time_base: Rational,
    /// Presentation time of the first frame; positions are relative to it.
    start_millis: f64,
    frames_per_second: f64,
    width: u32,
    height: u32,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    /// Frames received from the decoder, including discarded ones.
    frames_decoded: u64,
    /// Index of the next decoded frame, for positions of frames without a
    /// timestamp. Moved to the target by a successful seek.
    next_frame_index: u64,
    position_millis: f64,
    /// Frames to drop after a frame seek on a stream without a frame rate.
    discard_frames: u64,
    /// Frames positioned before this are dropped after a seek.
    discard_before_millis: Option<f64>,
    eof_sent: bool,
    exhausted: bool,
}

impl Debug for VideoCapture {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoCapture")
            .field("source", &self.source)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frames_per_second", &self.frames_per_second)
            .field("start_millis", &self.start_millis)
            .field("position_millis", &self.position_millis)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl VideoCapture {
    /// Open a source for reading.
    ///
    /// Files and URLs are opened through FFmpeg's demuxers;
    /// [`VideoSource::Camera`] goes through libavdevice using `camera`.
    ///
    /// # Errors
    ///
    /// - [`VidprepError::CaptureOpen`] if the input cannot be opened.
    /// - [`VidprepError::CameraUnavailable`] if the camera input format is
    ///   not compiled into FFmpeg.
    /// - [`VidprepError::NoVideoStream`] if the input has no video.
    pub fn open(source: &VideoSource, camera: &CameraDevice) -> Result<Self, VidprepError> {
        log::debug!("Opening video source {source}");

        let open_error = |reason: String| VidprepError::CaptureOpen {
            source_name: source.to_string(),
            reason,
        };

        ffmpeg_next::init()
            .map_err(|error| open_error(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context = match source {
            VideoSource::File(path) => {
                ffmpeg_next::format::input(path).map_err(|error| open_error(error.to_string()))?
            }
            VideoSource::Url(url) => {
                ffmpeg_next::format::network::init();
                ffmpeg_next::format::input(url.as_str())
                    .map_err(|error| open_error(error.to_string()))?
            }
            VideoSource::Camera => open_camera(camera)?,
        };

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(VidprepError::NoVideoStream)?;
        let video_stream_index = stream.index();
        let time_base = stream.time_base();
        let container_start = unsafe { (*input_context.as_ptr()).start_time };
        let start_millis = start_offset_millis(stream.start_time(), time_base, container_start);
        let frames_per_second = rational_to_fps(stream.avg_frame_rate(), stream.rate());
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let decoder = decoder_context.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        log::debug!(
            "{source}: {width}x{height} @ {frames_per_second:.3} fps, starting at {start_millis:.0} ms"
        );

        Ok(Self {
            source: source.clone(),
            input_context,
            decoder,
            scaler,
            video_stream_index,
            time_base,
            start_millis,
            frames_per_second,
            width,
            height,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            frames_decoded: 0,
            next_frame_index: 0,
            position_millis: 0.0,
            discard_frames: 0,
            discard_before_millis: None,
            eof_sent: false,
            exhausted: false,
        })
    }

    /// Position the capture so the next read returns the target frame.
    ///
    /// Targets are measured from the first frame of the video, whatever
    /// start time the container records for it.
    ///
    /// The demuxer jumps to the nearest keyframe at or before the target and
    /// the frames between it and the target are decoded and dropped. Live
    /// sources, and inputs whose demuxer refuses to seek, keep reading
    /// from their current position.
    pub fn seek(&mut self, target: SeekTarget) {
        let target_millis = match target {
            SeekTarget::Frame(frame_number) if self.frames_per_second > 0.0 => {
                frame_number_to_millis(frame_number, self.frames_per_second)
            }
            SeekTarget::Frame(frame_number) => {
                self.discard_frames = frame_number;
                return;
            }
            SeekTarget::Millis(millis) => millis,
        };
        if target_millis <= 0.0 {
            return;
        }

        if self.source.is_live() {
            log::debug!("{} cannot seek; reading from the live position", self.source);
            return;
        }

        let timestamp = millis_to_seek_timestamp(target_millis + self.start_millis);
        match self.input_context.seek(timestamp, ..timestamp) {
            Ok(()) => {
                self.decoder.flush();
                self.eof_sent = false;
                self.exhausted = false;
                // Frames without a timestamp cannot tell where the demuxer
                // landed; count them from the target.
                if self.frames_per_second > 0.0 {
                    self.next_frame_index =
                        millis_to_frame_number(target_millis, self.frames_per_second);
                }
            }
            Err(error) => {
                log::debug!("Seek to {target_millis:.0} ms in {} failed: {error}", self.source);
            }
        }

        // Half a frame of slack absorbs time-base rounding at the target.
        let slack = if self.frames_per_second > 0.0 {
            500.0 / self.frames_per_second
        } else {
            0.0
        };
        self.discard_before_millis = Some(target_millis - slack);
    }

    /// Decode the next frame.
    ///
    /// Returns `None` at the end of the stream and on any read or decode
    /// failure; once `None` is returned every later read also returns
    /// `None`.
    pub fn read_frame(&mut self) -> Option<DynamicImage> {
        if self.exhausted {
            return None;
        }

        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                self.frames_decoded += 1;
                let millis = self.current_frame_millis();
                self.next_frame_index += 1;
                if self.should_discard(millis) {
                    continue;
                }
                self.position_millis = millis;

                return match self.convert_current_frame() {
                    Ok(image) => Some(image),
                    Err(error) => {
                        log::debug!("Dropping {} after conversion failure: {error}", self.source);
                        self.exhausted = true;
                        None
                    }
                };
            }

            if self.eof_sent {
                self.exhausted = true;
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() != self.video_stream_index {
                        continue;
                    }
                    if let Err(error) = self.decoder.send_packet(&packet) {
                        log::debug!("Decoder rejected packet from {}: {error}", self.source);
                        self.exhausted = true;
                        return None;
                    }
                }
                Err(error) => {
                    if !matches!(error, FfmpegError::Eof) {
                        log::debug!("Read from {} failed: {error}", self.source);
                    }
                    if let Err(error) = self.decoder.send_eof() {
                        log::debug!("Failed to drain decoder for {}: {error}", self.source);
                    }
                    self.eof_sent = true;
                }
            }
        }
    }

    /// Position of the most recently read frame, in milliseconds from the
    /// start of the video.
    pub fn position_millis(&self) -> f64 {
        self.position_millis
    }

    /// Container timestamp of the first frame, in milliseconds. Positions
    /// and seek targets are relative to it.
    pub fn start_millis(&self) -> f64 {
        self.start_millis
    }

    /// Native frame width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Native frame height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Native frame rate, or `0.0` if the stream does not declare one.
    pub fn frames_per_second(&self) -> f64 {
        self.frames_per_second
    }

    /// The source this capture reads from.
    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    fn current_frame_millis(&self) -> f64 {
        match self.decoded_frame.timestamp().or(self.decoded_frame.pts()) {
            Some(pts) => pts_to_millis(pts, self.time_base) - self.start_millis,
            None if self.frames_per_second > 0.0 => {
                frame_number_to_millis(self.next_frame_index, self.frames_per_second)
            }
            None => self.position_millis,
        }
    }

    fn should_discard(&mut self, millis: f64) -> bool {
        if self.discard_frames > 0 {
            self.discard_frames -= 1;
            return true;
        }
        match self.discard_before_millis {
            Some(threshold) if millis < threshold => true,
            Some(_) => {
                self.discard_before_millis = None;
                false
            }
            None => false,
        }
    }

    fn convert_current_frame(&mut self) -> Result<DynamicImage, VidprepError> {
        self.scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;
        let buffer = frame_to_rgb_buffer(&self.rgb_frame, self.width, self.height);
        let image = RgbImage::from_raw(self.width, self.height, buffer).ok_or_else(|| {
            VidprepError::FfmpegError(
                "decoded frame does not match the stream dimensions".to_string(),
            )
        })?;
        Ok(DynamicImage::ImageRgb8(image))
    }
}

impl FrameSource for VideoCapture {
    fn read_frame(&mut self) -> Option<DynamicImage> {
        VideoCapture::read_frame(self)
    }

    fn position_millis(&self) -> f64 {
        VideoCapture::position_millis(self)
    }
}

impl Drop for VideoCapture {
    fn drop(&mut self) {
        log::debug!(
            "Releasing {} after {} decoded frame(s)",
            self.source,
            self.frames_decoded,
        );
    }
}

/// Open the configured libavdevice input.
fn open_camera(camera: &CameraDevice) -> Result<Input, VidprepError> {
    ffmpeg_next::device::register_all();

    let unavailable = || VidprepError::CameraUnavailable(camera.format.clone());
    let format_name = CString::new(camera.format.as_str()).map_err(|_| unavailable())?;
    let input_format = unsafe { ffmpeg_sys_next::av_find_input_format(format_name.as_ptr()) };
    if input_format.is_null() {
        return Err(unavailable());
    }
    let input_format = unsafe { InputFormat::wrap(input_format as *mut _) };

    let device_name = || format!("{}:{}", camera.format, camera.device);
    let context = ffmpeg_next::format::open_with(
        &camera.device,
        &Format::Input(input_format),
        Dictionary::new(),
    )
    .map_err(|error| VidprepError::CaptureOpen {
        source_name: device_name(),
        reason: error.to_string(),
    })?;

    if !context.is_input() {
        return Err(VidprepError::CaptureOpen {
            source_name: device_name(),
            reason: "device did not open as an input".to_string(),
        });
    }
    Ok(context.input())
}

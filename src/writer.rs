//! Video writer: encode frames one at a time into a video file.
//!
//! [`VideoWriter`] opens an output container, picks an encoder from a
//! four-character codec tag ([`FourCc`]), and encodes
//! [`DynamicImage`] frames as they arrive. The output is finalised by
//! [`finish`](VideoWriter::finish) or, failing that, when the writer is
//! dropped.
//!
//! # Example
//!
//! ```no_run
//! use image::{DynamicImage, RgbImage};
//! use vidprep::{FourCc, VideoWriter, VidprepError, WriterOptions};
//!
//! let options = WriterOptions::default()
//!     .fourcc("avc1".parse::<FourCc>()?)
//!     .fps(30.0)
//!     .resolution(640, 480);
//! let mut writer = VideoWriter::create("out.mp4", &options)?;
//! let frame = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
//! writer.write_frame(&frame)?;
//! writer.finish()?;
//! # Ok::<(), VidprepError>(())
//! ```
//!
//! The container is chosen from the file extension; whether the codec fits
//! the container is left to the caller.

use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

use ffmpeg_next::{
    Packet, Rational,
    codec::{Id, context::Context as CodecContext},
    encoder::Video as VideoEncoder,
    format::{Flags as FormatFlags, Pixel, context::Output},
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, imageops::FilterType};

use crate::{
    capture::VideoCapture,
    error::VidprepError,
    sampling::FrameSink,
    utilities::{frame_rate_to_rational, rgb_buffer_to_frame},
};

/// A four-character codec tag such as `mp4v` or `avc1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// MPEG-4 Part 2, the default tag.
    pub const MP4V: FourCc = FourCc(*b"mp4v");

    /// Parse a tag from exactly four ASCII characters.
    ///
    /// # Errors
    ///
    /// Returns [`VidprepError::InvalidCodecTag`] otherwise.
    pub fn new(code: &str) -> Result<Self, VidprepError> {
        let bytes: [u8; 4] = code
            .as_bytes()
            .try_into()
            .map_err(|_| VidprepError::InvalidCodecTag(code.to_string()))?;
        if !bytes.iter().all(|byte| byte.is_ascii_graphic() || *byte == b' ') {
            return Err(VidprepError::InvalidCodecTag(code.to_string()));
        }
        Ok(Self(bytes))
    }

    /// The tag packed little-endian, the layout FFmpeg stores in
    /// `codec_tag`.
    pub fn as_u32(&self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Encoder selected by this tag.
    ///
    /// # Errors
    ///
    /// Returns [`VidprepError::UnsupportedCodecTag`] for unknown tags.
    pub fn codec_id(&self) -> Result<Id, VidprepError> {
        let tag = self.to_string().to_ascii_lowercase();
        match tag.as_str() {
            "mp4v" | "xvid" | "divx" | "fmp4" => Ok(Id::MPEG4),
            "avc1" | "h264" | "x264" => Ok(Id::H264),
            "hevc" | "hvc1" | "hev1" | "h265" => Ok(Id::HEVC),
            "mjpg" => Ok(Id::MJPEG),
            "vp80" => Ok(Id::VP8),
            "vp90" | "vp09" => Ok(Id::VP9),
            _ => Err(VidprepError::UnsupportedCodecTag(self.to_string())),
        }
    }
}

impl Default for FourCc {
    fn default() -> Self {
        FourCc::MP4V
    }
}

impl FromStr for FourCc {
    type Err = VidprepError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FourCc::new(value)
    }
}

impl Display for FourCc {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for byte in self.0 {
            write!(f, "{}", byte as char)?;
        }
        Ok(())
    }
}

impl Debug for FourCc {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "FourCc({self})")
    }
}

/// Output settings for [`VideoWriter`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriterOptions {
    /// Codec tag (default: `mp4v`).
    pub fourcc: FourCc,
    /// Frames per second (default: 24).
    pub frames_per_second: f64,
    /// Frame width in pixels (default: 480).
    pub width: u32,
    /// Frame height in pixels (default: 360).
    pub height: u32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            fourcc: FourCc::MP4V,
            frames_per_second: 24.0,
            width: 480,
            height: 360,
        }
    }
}

impl WriterOptions {
    /// Match the native size and frame rate of an open capture.
    ///
    /// A capture with an unknown frame rate keeps the default 24 fps.
    pub fn from_capture(capture: &VideoCapture) -> Self {
        let defaults = Self::default();
        let frames_per_second = if capture.frames_per_second() > 0.0 {
            capture.frames_per_second()
        } else {
            defaults.frames_per_second
        };
        Self {
            frames_per_second,
            width: capture.width(),
            height: capture.height(),
            ..defaults
        }
    }

    /// Set the codec tag.
    #[must_use]
    pub fn fourcc(mut self, fourcc: FourCc) -> Self {
        self.fourcc = fourcc;
        self
    }

    /// Set the frame rate.
    #[must_use]
    pub fn fps(mut self, frames_per_second: f64) -> Self {
        self.frames_per_second = frames_per_second;
        self
    }

    /// Set the frame size.
    #[must_use]
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Encoder input pixel format for a codec.
fn encoder_pixel_format(codec_id: Id) -> Pixel {
    match codec_id {
        Id::MJPEG => Pixel::YUVJ420P,
        _ => Pixel::YUV420P,
    }
}

/// The tag to store in the container, if its muxer maps the tag to `codec_id`.
///
/// Muxers without a tag table (MPEG-TS, for one) choose their own stream
/// type, and a mismatched tag would fail `write_header`.
fn container_codec_tag(output: &Output, fourcc: FourCc, codec_id: Id) -> Option<u32> {
    let tag = fourcc.as_u32();
    let known = unsafe {
        let tags = (*output.format().as_ptr()).codec_tag;
        !tags.is_null()
            && ffmpeg_sys_next::av_codec_get_id(tags, tag)
                == ffmpeg_sys_next::AVCodecID::from(codec_id)
    };
    known.then_some(tag)
}

/// Sequential frame encoder bound to one output file.
///
/// Frames whose size differs from the configured size are resized. The
/// container trailer is written by [`finish`](VideoWriter::finish); a
/// writer dropped without finishing is finished on drop, with any error
/// logged.
pub struct VideoWriter {
    output: Output,
    encoder: VideoEncoder,
    scaler: ScalingContext,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    width: u32,
    height: u32,
    frames_written: u64,
    finished: bool,
    path: PathBuf,
}

impl Debug for VideoWriter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoWriter")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frames_written", &self.frames_written)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl VideoWriter {
    /// Open `path` for writing. An existing file is overwritten.
    ///
    /// # Errors
    ///
    /// - [`VidprepError::UnsupportedCodecTag`] if the tag has no encoder
    ///   mapping.
    /// - [`VidprepError::VideoEncodeError`] if the encoder is unavailable or
    ///   rejects the settings.
    /// - [`VidprepError::VideoWriteError`] if the container cannot be
    ///   created.
    pub fn create<P: AsRef<Path>>(path: P, options: &WriterOptions) -> Result<Self, VidprepError> {
        let path = path.as_ref();
        let (width, height) = (options.width, options.height);
        log::debug!(
            "Creating {} ({width}x{height} @ {:.3} fps, fourcc={})",
            path.display(),
            options.frames_per_second,
            options.fourcc,
        );

        if width == 0 || height == 0 {
            return Err(VidprepError::VideoWriteError(format!(
                "invalid frame size {width}x{height}"
            )));
        }

        ffmpeg_next::init()?;

        let codec_id = options.fourcc.codec_id()?;
        let target_pixel = encoder_pixel_format(codec_id);
        let frame_rate = frame_rate_to_rational(options.frames_per_second);
        let encoder_time_base = frame_rate.invert();

        let mut output = ffmpeg_next::format::output(path)
            .map_err(|e| VidprepError::VideoWriteError(format!("cannot open output: {e}")))?;

        // Read before add_stream mutably borrows the output.
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);
        let codec_tag = container_codec_tag(&output, options.fourcc, codec_id);
        if codec_tag.is_none() {
            log::debug!("{} keeps its default tag instead of {}", path.display(), options.fourcc);
        }

        let encoder_codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            VidprepError::VideoEncodeError(format!("codec {codec_id:?} not available"))
        })?;

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(|e| VidprepError::VideoWriteError(format!("cannot add stream: {e}")))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .map_err(|e| {
                VidprepError::VideoEncodeError(format!("cannot create codec context: {e}"))
            })?
            .encoder()
            .video()
            .map_err(|e| VidprepError::VideoEncodeError(format!("cannot open video encoder: {e}")))?;

        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(target_pixel);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(frame_rate));

        unsafe {
            if needs_global_header {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
            if let Some(tag) = codec_tag {
                (*encoder.as_mut_ptr()).codec_tag = tag;
            }
        }

        let encoder = encoder
            .open_as(encoder_codec)
            .map_err(|e| VidprepError::VideoEncodeError(format!("cannot open encoder: {e}")))?;

        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        output
            .write_header()
            .map_err(|e| VidprepError::VideoWriteError(format!("cannot write header: {e}")))?;

        // The muxer may have replaced the stream time base in write_header.
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| VidprepError::VideoWriteError("output stream vanished".to_string()))?;

        let scaler = ScalingContext::get(
            Pixel::RGB24,
            width,
            height,
            target_pixel,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|e| VidprepError::VideoWriteError(format!("cannot create scaler: {e}")))?;

        Ok(Self {
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            width,
            height,
            frames_written: 0,
            finished: false,
            path: path.to_path_buf(),
        })
    }

    /// Encode one frame.
    ///
    /// # Errors
    ///
    /// Returns [`VidprepError::VideoWriteError`] if the writer is already
    /// finished or a packet cannot be written, and
    /// [`VidprepError::VideoEncodeError`] if the encoder rejects the frame.
    pub fn write_frame(&mut self, image: &DynamicImage) -> Result<(), VidprepError> {
        if self.finished {
            return Err(VidprepError::VideoWriteError(format!(
                "{} is already finished",
                self.path.display()
            )));
        }

        let rgb = if image.width() != self.width || image.height() != self.height {
            image
                .resize_exact(self.width, self.height, FilterType::Triangle)
                .to_rgb8()
        } else {
            image.to_rgb8()
        };

        let mut source_frame = VideoFrame::new(Pixel::RGB24, self.width, self.height);
        rgb_buffer_to_frame(rgb.as_raw(), &mut source_frame, self.width, self.height);

        let mut encoded_frame = VideoFrame::empty();
        self.scaler
            .run(&source_frame, &mut encoded_frame)
            .map_err(|e| VidprepError::VideoWriteError(format!("scaling failed: {e}")))?;
        encoded_frame.set_pts(Some(self.frames_written as i64));

        self.encoder
            .send_frame(&encoded_frame)
            .map_err(|e| VidprepError::VideoEncodeError(format!("send_frame failed: {e}")))?;
        self.write_pending_packets()?;

        self.frames_written += 1;
        Ok(())
    }

    /// Flush the encoder and write the container trailer.
    ///
    /// Calling this more than once is a no-op.
    pub fn finish(&mut self) -> Result<(), VidprepError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        self.encoder
            .send_eof()
            .map_err(|e| VidprepError::VideoEncodeError(format!("send_eof failed: {e}")))?;
        self.write_pending_packets()?;

        self.output
            .write_trailer()
            .map_err(|e| VidprepError::VideoWriteError(format!("cannot write trailer: {e}")))?;

        log::debug!(
            "Finished {} with {} frame(s)",
            self.path.display(),
            self.frames_written,
        );
        Ok(())
    }

    /// Number of frames encoded so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_pending_packets(&mut self) -> Result<(), VidprepError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| VidprepError::VideoWriteError(format!("write packet failed: {e}")))?;
        }
        Ok(())
    }
}

impl FrameSink for VideoWriter {
    fn write_frame(&mut self, frame: &DynamicImage) -> Result<(), VidprepError> {
        VideoWriter::write_frame(self, frame)
    }

    fn finish(&mut self) -> Result<(), VidprepError> {
        VideoWriter::finish(self)
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(error) = self.finish() {
                log::warn!("Failed to finalise {}: {error}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ffmpeg_next::codec::Id;

    use super::{FourCc, WriterOptions};

    #[test]
    fn fourcc_maps_known_tags() {
        assert_eq!(FourCc::MP4V.codec_id().unwrap(), Id::MPEG4);
        assert_eq!("XVID".parse::<FourCc>().unwrap().codec_id().unwrap(), Id::MPEG4);
        assert_eq!("avc1".parse::<FourCc>().unwrap().codec_id().unwrap(), Id::H264);
        assert_eq!("MJPG".parse::<FourCc>().unwrap().codec_id().unwrap(), Id::MJPEG);
    }

    #[test]
    fn fourcc_rejects_bad_tags() {
        assert!("mp4".parse::<FourCc>().is_err());
        assert!("mp4v2".parse::<FourCc>().is_err());
        assert!("abcd".parse::<FourCc>().unwrap().codec_id().is_err());
    }

    #[test]
    fn fourcc_packs_little_endian() {
        assert_eq!(FourCc::MP4V.as_u32(), u32::from_le_bytes(*b"mp4v"));
        assert_eq!(FourCc::MP4V.to_string(), "mp4v");
    }

    #[test]
    fn writer_options_defaults() {
        let options = WriterOptions::default();
        assert_eq!(options.fourcc, FourCc::MP4V);
        assert_eq!((options.width, options.height), (480, 360));
        assert_eq!(options.frames_per_second, 24.0);
    }
}

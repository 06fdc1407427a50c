//! Video source descriptions.
//!
//! A [`VideoSource`] names where frames come from: a local file, a directly
//! playable network stream, or the default camera. [`CameraDevice`] tells
//! FFmpeg's device layer which input format and device to open for the
//! camera.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

/// A single video input.
///
/// Strings convert with [`From`]: an empty string becomes
/// [`VideoSource::Camera`], anything containing `://` becomes
/// [`VideoSource::Url`], and everything else is a file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VideoSource {
    /// The default live capture device.
    Camera,
    /// A local video file.
    File(PathBuf),
    /// A network URL that FFmpeg can open directly (e.g. a resolved stream).
    Url(String),
}

impl VideoSource {
    /// Returns `true` for sources that cannot seek.
    pub fn is_live(&self) -> bool {
        matches!(self, VideoSource::Camera)
    }
}

impl Display for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VideoSource::Camera => f.write_str("<camera>"),
            VideoSource::File(path) => write!(f, "{}", path.display()),
            VideoSource::Url(url) => f.write_str(url),
        }
    }
}

impl From<&str> for VideoSource {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            VideoSource::Camera
        } else if value.contains("://") {
            VideoSource::Url(value.to_string())
        } else {
            VideoSource::File(PathBuf::from(value))
        }
    }
}

impl From<String> for VideoSource {
    fn from(value: String) -> Self {
        VideoSource::from(value.as_str())
    }
}

impl From<PathBuf> for VideoSource {
    fn from(value: PathBuf) -> Self {
        if value.as_os_str().is_empty() {
            VideoSource::Camera
        } else {
            VideoSource::File(value)
        }
    }
}

impl<T: Into<VideoSource>> From<Option<T>> for VideoSource {
    fn from(value: Option<T>) -> Self {
        value.map_or(VideoSource::Camera, Into::into)
    }
}

/// libavdevice input used for [`VideoSource::Camera`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Input format name as registered by libavdevice (e.g. `"v4l2"`).
    pub format: String,
    /// Device string passed to the input format (e.g. `"/dev/video0"`).
    pub device: String,
}

impl CameraDevice {
    /// Create a device description.
    pub fn new(format: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            device: device.into(),
        }
    }
}

impl Default for CameraDevice {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("avfoundation", "0")
        } else if cfg!(target_os = "windows") {
            Self::new("vfwcap", "0")
        } else {
            Self::new("v4l2", "/dev/video0")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::VideoSource;

    #[test]
    fn string_conversion_picks_variant() {
        assert_eq!(VideoSource::from(""), VideoSource::Camera);
        assert_eq!(
            VideoSource::from("https://cdn.example.com/v.mp4"),
            VideoSource::Url("https://cdn.example.com/v.mp4".to_string()),
        );
        assert_eq!(
            VideoSource::from("clips/a.mp4"),
            VideoSource::File(PathBuf::from("clips/a.mp4")),
        );
    }

    #[test]
    fn unset_source_is_camera() {
        assert_eq!(VideoSource::from(None::<&str>), VideoSource::Camera);
        assert_eq!(VideoSource::from(PathBuf::new()), VideoSource::Camera);
        assert!(VideoSource::Camera.is_live());
    }
}

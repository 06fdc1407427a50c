//! Streaming URL resolution.
//!
//! Video sharing sites serve a watch page, not a stream FFmpeg can open.
//! A [`StreamResolver`] turns such a page URL into a direct media URL.
//! [`YtDlpResolver`] does this by asking the external `yt-dlp` program for
//! the metadata of the best MP4 format.

use std::{process::Command, sync::Arc};

use serde_json::Value;

use crate::{
    error::VidprepError,
    frames::SourceTransform,
    progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker},
    source::VideoSource,
};

/// Format selector passed to `yt-dlp` by default.
pub const DEFAULT_FORMAT_SELECTOR: &str = "best[ext=mp4]/best";

/// Turns a page URL into a directly playable stream URL.
pub trait StreamResolver {
    /// Resolve one page URL.
    ///
    /// # Errors
    ///
    /// Returns [`VidprepError::StreamResolution`] if no stream can be found.
    fn resolve(&self, page_url: &str) -> Result<String, VidprepError>;
}

impl<F> StreamResolver for F
where
    F: Fn(&str) -> Result<String, VidprepError>,
{
    fn resolve(&self, page_url: &str) -> Result<String, VidprepError> {
        self(page_url)
    }
}

/// Resolver backed by the `yt-dlp` command-line program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpResolver {
    program: String,
    format: String,
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            format: DEFAULT_FORMAT_SELECTOR.to_string(),
        }
    }
}

impl YtDlpResolver {
    /// Run a different executable, e.g. an absolute path or `youtube-dl`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Use a different `-f` format selector.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }
}

impl StreamResolver for YtDlpResolver {
    fn resolve(&self, page_url: &str) -> Result<String, VidprepError> {
        let failure = |reason: String| VidprepError::StreamResolution {
            url: page_url.to_string(),
            reason,
        };

        log::debug!("Running {} for {page_url}", self.program);
        let output = Command::new(&self.program)
            .args([
                "--dump-single-json",
                "--no-playlist",
                "--no-warnings",
                "-f",
                &self.format,
                page_url,
            ])
            .output()
            .map_err(|error| failure(format!("could not run {}: {error}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim(),
            )));
        }

        parse_resolved_url(&output.stdout).map_err(failure)
    }
}

/// Extract the top-level `url` field from `yt-dlp` JSON output.
pub(crate) fn parse_resolved_url(stdout: &[u8]) -> Result<String, String> {
    let metadata: Value =
        serde_json::from_slice(stdout).map_err(|error| format!("invalid JSON output: {error}"))?;
    match metadata.get("url").and_then(Value::as_str) {
        Some(url) if !url.is_empty() => Ok(url.to_string()),
        _ => Err("output has no stream url".to_string()),
    }
}

/// Resolve each page URL in order, one lookup per URL.
///
/// # Errors
///
/// Returns the first resolution failure; later URLs are not attempted.
pub fn resolve_urls<R, I, S>(resolver: &R, urls: I) -> Result<Vec<VideoSource>, VidprepError>
where
    R: StreamResolver + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    resolve_urls_with_progress(resolver, urls, Arc::new(NoOpProgress))
}

/// Like [`resolve_urls`], reporting each resolved URL to `progress`.
///
/// # Errors
///
/// Returns the first resolution failure; later URLs are not attempted.
pub fn resolve_urls_with_progress<R, I, S>(
    resolver: &R,
    urls: I,
    progress: Arc<dyn ProgressCallback>,
) -> Result<Vec<VideoSource>, VidprepError>
where
    R: StreamResolver + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let urls: Vec<S> = urls.into_iter().collect();
    let mut tracker = ProgressTracker::new(
        progress,
        OperationType::UrlResolution,
        Some(urls.len() as u64),
        1,
    );

    let mut resolved = Vec::with_capacity(urls.len());
    for page_url in &urls {
        let page_url = page_url.as_ref();
        let stream_url = resolver.resolve(page_url)?;
        log::info!("Resolved {page_url}");
        log::debug!("{page_url} -> {stream_url}");
        resolved.push(VideoSource::Url(stream_url));
        tracker.advance(None, None);
    }

    tracker.finish();
    Ok(resolved)
}

/// Wrap a resolver as a [`FramesWriter`](crate::FramesWriter) source
/// transform.
///
/// URL sources are replaced by their resolved stream; files and the camera
/// pass through unchanged.
pub fn resolver_transform<R>(resolver: R) -> SourceTransform
where
    R: StreamResolver + Send + Sync + 'static,
{
    Arc::new(
        move |sources: Vec<VideoSource>| -> Result<Vec<VideoSource>, VidprepError> {
            sources
                .into_iter()
                .map(|source| match source {
                    VideoSource::Url(page_url) => {
                        resolver.resolve(&page_url).map(VideoSource::Url)
                    }
                    other => Ok(other),
                })
                .collect()
        },
    )
}

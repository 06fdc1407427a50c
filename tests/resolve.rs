//! Stream resolution tests with in-process resolvers.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use vidprep::{
    FramesWriter, FramesWriterConfig, OperationType, ProgressCallback, ProgressInfo,
    StreamResolver, VideoSource, VidprepError, resolve_urls, resolve_urls_with_progress,
    resolver_transform,
};

fn fake_cdn(page_url: &str) -> Result<String, VidprepError> {
    match page_url.strip_prefix("https://videos.example/watch?v=") {
        Some(id) => Ok(format!("https://cdn.example/{id}.mp4")),
        None => Err(VidprepError::StreamResolution {
            url: page_url.to_string(),
            reason: "unsupported site".to_string(),
        }),
    }
}

#[test]
fn resolve_urls_preserves_order() {
    let resolved = resolve_urls(
        &fake_cdn,
        [
            "https://videos.example/watch?v=b",
            "https://videos.example/watch?v=a",
        ],
    )
    .expect("Failed to resolve");

    assert_eq!(
        resolved,
        vec![
            VideoSource::Url("https://cdn.example/b.mp4".to_string()),
            VideoSource::Url("https://cdn.example/a.mp4".to_string()),
        ]
    );
}

#[test]
fn resolve_urls_stops_at_first_failure() {
    let calls = AtomicUsize::new(0);
    let counting = |page_url: &str| {
        calls.fetch_add(1, Ordering::SeqCst);
        fake_cdn(page_url)
    };

    let result = resolve_urls(
        &counting,
        [
            "https://videos.example/watch?v=1",
            "https://elsewhere.example/2",
            "https://videos.example/watch?v=3",
        ],
    );

    let error = result.expect_err("Second URL should fail");
    assert!(error.to_string().contains("elsewhere.example"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn resolve_urls_of_nothing_is_empty() {
    let resolved = resolve_urls(&fake_cdn, Vec::<String>::new()).unwrap();
    assert!(resolved.is_empty());
}

#[derive(Default)]
struct Recorder(Mutex<Vec<(OperationType, u64, Option<u64>)>>);

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.0
            .lock()
            .unwrap()
            .push((info.operation, info.current, info.total));
    }
}

#[test]
fn resolve_urls_reports_progress_per_url() {
    let recorder = Arc::new(Recorder::default());
    resolve_urls_with_progress(
        &fake_cdn,
        [
            "https://videos.example/watch?v=1",
            "https://videos.example/watch?v=2",
        ],
        recorder.clone(),
    )
    .expect("Failed to resolve");

    let events = recorder.0.lock().unwrap();
    assert_eq!(
        events.as_slice(),
        &[
            (OperationType::UrlResolution, 1, Some(2)),
            (OperationType::UrlResolution, 2, Some(2)),
            (OperationType::UrlResolution, 2, Some(2)),
        ]
    );
}

#[test]
fn closures_are_resolvers() {
    let resolver =
        |_: &str| -> Result<String, VidprepError> { Ok("rtmp://live.example/stream".to_string()) };
    assert_eq!(
        resolver.resolve("https://anything").unwrap(),
        "rtmp://live.example/stream"
    );
}

#[test]
fn resolver_transform_only_touches_urls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let resolver = move |page_url: &str| {
        counter.fetch_add(1, Ordering::SeqCst);
        fake_cdn(page_url)
    };

    let writer = FramesWriter::with_transform(
        vec![
            VideoSource::from("local.mp4"),
            VideoSource::from("https://videos.example/watch?v=x"),
            VideoSource::Camera,
        ],
        FramesWriterConfig::new(),
        resolver_transform(resolver),
    )
    .expect("Failed to build writer");

    assert_eq!(
        writer.pending(),
        &[
            VideoSource::File("local.mp4".into()),
            VideoSource::Url("https://cdn.example/x.mp4".to_string()),
            VideoSource::Camera,
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn resolver_transform_failure_aborts_construction() {
    let result = FramesWriter::with_transform(
        ["https://elsewhere.example/clip"],
        FramesWriterConfig::new(),
        resolver_transform(fake_cdn),
    );
    assert!(matches!(
        result,
        Err(VidprepError::StreamResolution { .. })
    ));
}

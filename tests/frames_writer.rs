//! FramesWriter integration tests.
//!
//! End-to-end tests synthesise their own input with the MPEG-4 encoder and
//! skip when it is not available.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use image::{DynamicImage, Rgb, RgbImage};
use vidprep::{
    FramesWriter, FramesWriterConfig, OperationType, ProgressCallback, ProgressInfo, SourceTransform,
    TimeRange, VideoSource, VideoWriter, VidprepError, WriterOptions,
};

fn synthesize(path: &Path, frames: u32) -> Option<()> {
    let options = WriterOptions::default().resolution(64, 48).fps(10.0);
    let mut writer = match VideoWriter::create(path, &options) {
        Ok(writer) => writer,
        Err(error) => {
            eprintln!("Skipping: MPEG-4 encoder not available ({error})");
            return None;
        }
    };
    for index in 0..frames {
        let shade = ((index * 6) % 256) as u8;
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([shade, 64, 128])));
        writer.write_frame(&frame).expect("Failed to write frame");
    }
    writer.finish().expect("Failed to finish");
    Some(())
}

fn png_files(directory: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(directory)
        .expect("Failed to list output")
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
        .collect();
    files.sort();
    files
}

fn mean_red(frame: &DynamicImage) -> f64 {
    let rgb = frame.to_rgb8();
    let total: u64 = rgb.pixels().map(|pixel| u64::from(pixel[0])).sum();
    total as f64 / (rgb.width() * rgb.height()) as f64
}

/// Decode every frame of a clip.
fn read_clip(path: &Path) -> Vec<DynamicImage> {
    let source = VideoSource::from(path.to_path_buf());
    let mut capture =
        vidprep::VideoCapture::open(&source, &vidprep::CameraDevice::default()).unwrap();
    std::iter::from_fn(|| capture.read_frame()).collect()
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(OperationType, u64, Option<u64>)>>,
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.events
            .lock()
            .unwrap()
            .push((info.operation, info.current, info.total));
    }
}

// ── Construction and queue handling ─────────────────────────────────

#[test]
fn zero_step_is_rejected() {
    let config = FramesWriterConfig::new().with_frame_step(0);
    let result = FramesWriter::new(["a.mp4"], config);
    assert!(matches!(result, Err(VidprepError::InvalidInterval)));
}

#[test]
fn sources_are_queued_in_order() {
    let mut writer = FramesWriter::new(["a.mp4", "", "rtsp://cam/1"], FramesWriterConfig::new())
        .expect("Failed to build writer");
    writer
        .add([PathBuf::from("b.mp4")], None)
        .expect("Failed to add");

    assert_eq!(
        writer.pending(),
        &[
            VideoSource::File("a.mp4".into()),
            VideoSource::Camera,
            VideoSource::Url("rtsp://cam/1".into()),
            VideoSource::File("b.mp4".into()),
        ]
    );
    assert!(writer.processed().is_empty());
    assert_eq!(writer.plan().frame_step(), 200);
    assert_eq!(writer.plan().frame_count(), 10);
}

fn uppercase_transform() -> SourceTransform {
    Arc::new(|sources: Vec<VideoSource>| -> Result<Vec<VideoSource>, VidprepError> {
        Ok(sources
            .into_iter()
            .map(|source| match source {
                VideoSource::Url(url) => VideoSource::Url(url.to_uppercase()),
                other => other,
            })
            .collect())
    })
}

#[test]
fn default_transform_applies_to_initial_and_added_sources() {
    let mut writer = FramesWriter::with_transform(
        ["http://a"],
        FramesWriterConfig::new(),
        uppercase_transform(),
    )
    .expect("Failed to build writer");
    writer.add(["http://b"], None).expect("Failed to add");

    assert_eq!(
        writer.pending(),
        &[
            VideoSource::Url("HTTP://A".into()),
            VideoSource::Url("HTTP://B".into()),
        ]
    );
}

#[test]
fn explicit_transform_overrides_default() {
    let mut writer = FramesWriter::with_transform(
        Vec::<String>::new(),
        FramesWriterConfig::new(),
        uppercase_transform(),
    )
    .expect("Failed to build writer");

    let duplicate = |sources: Vec<VideoSource>| -> Result<Vec<VideoSource>, VidprepError> {
        Ok(sources.iter().chain(sources.iter()).cloned().collect())
    };
    writer
        .add(["http://c"], Some(&duplicate))
        .expect("Failed to add");

    assert_eq!(
        writer.pending(),
        &[
            VideoSource::Url("http://c".into()),
            VideoSource::Url("http://c".into()),
        ]
    );
}

#[test]
fn failing_transform_leaves_queue_unchanged() {
    let mut writer = FramesWriter::new(["a.mp4"], FramesWriterConfig::new()).unwrap();
    let failing = |_: Vec<VideoSource>| -> Result<Vec<VideoSource>, VidprepError> {
        Err(VidprepError::StreamResolution {
            url: "http://x".to_string(),
            reason: "offline".to_string(),
        })
    };

    let result = writer.add(["http://x"], Some(&failing));
    assert!(matches!(result, Err(VidprepError::StreamResolution { .. })));
    assert_eq!(writer.pending().len(), 1);
}

#[test]
fn write_drains_unreadable_sources() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let missing = directory.path().join("missing.mp4");
    let mut writer = FramesWriter::new([missing.clone()], FramesWriterConfig::new()).unwrap();

    let summary = writer
        .write(directory.path().join("frame_"))
        .expect("Unreadable source should not be fatal");

    assert_eq!(summary.sources, 1);
    assert_eq!(summary.frames_written, 0);
    assert_eq!(summary.unreadable, vec![VideoSource::File(missing.clone())]);
    assert!(writer.pending().is_empty());
    assert_eq!(writer.processed(), &[VideoSource::File(missing)]);
    assert!(png_files(directory.path()).is_empty());
}

// ── clip_by_time_ranges validation ──────────────────────────────────

#[test]
fn clip_range_count_mismatch_fails_before_io() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let writer = FramesWriter::new(["a.mp4", "b.mp4"], FramesWriterConfig::new()).unwrap();

    let result = writer.clip_by_time_ranges(directory.path(), &[vec![TimeRange::new(2.0, 5.0)]]);
    assert!(matches!(
        result,
        Err(VidprepError::RangeCountMismatch {
            sources: 2,
            ranges: 1
        })
    ));
    assert_eq!(fs::read_dir(directory.path()).unwrap().count(), 0);
}

#[test]
fn clip_invalid_range_fails_before_io() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let writer = FramesWriter::new(["a.mp4"], FramesWriterConfig::new()).unwrap();

    let result = writer.clip_by_time_ranges(
        directory.path(),
        &[vec![TimeRange::new(0.0, 1.0), TimeRange::new(-3.0, 1.0)]],
    );
    assert!(matches!(result, Err(VidprepError::InvalidTimeRange { .. })));
    assert_eq!(fs::read_dir(directory.path()).unwrap().count(), 0);
}

#[test]
fn clip_skips_unreadable_sources() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let writer = FramesWriter::new(
        [directory.path().join("missing.mp4")],
        FramesWriterConfig::new(),
    )
    .unwrap();

    let clips = writer
        .clip_by_time_ranges(directory.path(), &[vec![TimeRange::new(0.0, 1.0)]])
        .expect("Unreadable source should not be fatal");
    assert!(clips.is_empty());
    assert_eq!(writer.pending().len(), 1);
}

// ── End to end ──────────────────────────────────────────────────────

#[test]
fn write_samples_synthesized_video() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let video = directory.path().join("input.mp4");
    if synthesize(&video, 60).is_none() {
        return;
    }
    let frames_dir = directory.path().join("frames");
    fs::create_dir(&frames_dir).unwrap();

    let recorder = Arc::new(Recorder::default());
    let config = FramesWriterConfig::new()
        .with_frame_step(5)
        .with_frame_count(4)
        .with_progress(recorder.clone());
    let mut writer = FramesWriter::new([video.clone()], config).unwrap();

    let mut prefix = frames_dir.clone().into_os_string();
    prefix.push("/");
    let summary = writer.write(&prefix).expect("Failed to write frames");

    assert_eq!(summary.frames_written, 4);
    assert!(summary.unreadable.is_empty());
    assert_eq!(png_files(&frames_dir), {
        let mut files = summary.files.clone();
        files.sort();
        files
    });
    for file in &summary.files {
        let image = image::open(file).expect("Frame should be a readable PNG");
        assert_eq!((image.width(), image.height()), (64, 48));
    }
    assert_eq!(writer.processed(), &[VideoSource::File(video)]);

    let events = recorder.events.lock().unwrap();
    assert!(events.iter().all(|(operation, _, total)| {
        *operation == OperationType::FrameSampling && *total == Some(4)
    }));
    assert_eq!(events.last().map(|event| event.1), Some(4));
}

#[test]
fn write_short_video_emits_nothing() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let video = directory.path().join("short.mp4");
    if synthesize(&video, 3).is_none() {
        return;
    }

    let config = FramesWriterConfig::new().with_frame_step(5).with_frame_count(4);
    let mut writer = FramesWriter::new([video], config).unwrap();
    let summary = writer.write(directory.path().join("f_")).unwrap();

    assert_eq!(summary.frames_written, 0);
    assert!(summary.unreadable.is_empty());
    assert!(png_files(directory.path()).is_empty());
}

#[test]
fn clip_synthesized_videos_into_numbered_files() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let first = directory.path().join("first.mp4");
    let second = directory.path().join("second.mp4");
    if synthesize(&first, 60).is_none() || synthesize(&second, 30).is_none() {
        return;
    }
    let clips_dir = directory.path().join("clips");
    fs::create_dir(&clips_dir).unwrap();

    let recorder = Arc::new(Recorder::default());
    let config = FramesWriterConfig::new().with_progress(recorder.clone());
    let writer = FramesWriter::new([first, second], config).unwrap();
    let clips = writer
        .clip_by_time_ranges(
            &clips_dir,
            &[
                vec![TimeRange::new(2.0, 5.0), TimeRange::new(1.0, 1.5)],
                vec![TimeRange::new(0.0, 1.0)],
            ],
        )
        .expect("Failed to clip");

    assert_eq!(
        clips,
        vec![
            clips_dir.join("0.mp4"),
            clips_dir.join("1.mp4"),
            clips_dir.join("2.mp4"),
        ]
    );
    assert_eq!(writer.pending().len(), 2);

    // [2 s, 5 s] at 10 fps is frames 20 through 50 with an inclusive stop.
    let frames = read_clip(&clips[0]);
    assert_eq!(frames.len(), 31);
    let (first, last) = (mean_red(&frames[0]), mean_red(&frames[30]));
    assert!((first - 120.0).abs() < 10.0, "first frame red {first}, expected frame 20");
    assert!((last - 44.0).abs() < 10.0, "last frame red {last}, expected frame 50");
    // [0 s, 1 s] of the second input is frames 0 through 10.
    assert_eq!(read_clip(&clips[2]).len(), 11);

    let events = recorder.events.lock().unwrap();
    assert!(events.iter().all(|(operation, _, total)| {
        *operation == OperationType::Clipping && *total == Some(3)
    }));
    assert_eq!(events.last().map(|event| event.1), Some(3));
}

#[test]
fn clip_ranges_are_measured_from_video_start() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let video = directory.path().join("broadcast.ts");
    if synthesize(&video, 60).is_none() {
        return;
    }

    let writer = FramesWriter::new([video], FramesWriterConfig::new()).unwrap();
    let clips = writer
        .clip_by_time_ranges(directory.path(), &[vec![TimeRange::new(2.0, 5.0)]])
        .expect("Failed to clip");

    let frames = read_clip(&clips[0]);
    assert!(
        (27..=31).contains(&frames.len()),
        "expected the [2 s, 5 s] span, got {} frame(s)",
        frames.len()
    );
    // Frame 20 has red 120; absolute timestamps would start near frame 6 (red 36).
    let first = mean_red(&frames[0]);
    assert!((first - 120.0).abs() < 30.0, "first frame red {first}");
}

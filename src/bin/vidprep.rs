use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use vidprep::{
    DirectoryReconciler, FfmpegLogLevel, FramesWriter, FramesWriterConfig, ProgressCallback,
    ProgressInfo, TimeRange, VideoSource, YtDlpResolver, resolve_urls, resolve_urls_with_progress,
    resolver_transform,
};

const CLI_AFTER_HELP: &str = "Examples:\n  vidprep reconcile labels images --src-ext txt --dst-ext jpg --dry-run\n  vidprep sample labels images val/labels val/images --ratio 0.1\n  vidprep extract-frames drive.mp4 --out frames/ --step 50 --count 20 --progress\n  vidprep clip a.mp4 b.mp4 --out clips --ranges '2-5,7-9;0-3'\n  vidprep completions zsh > _vidprep";

#[derive(Debug, Parser)]
#[command(
    name = "vidprep",
    version,
    about = "Reconcile dataset folders, sample video frames, and clip videos by time range",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Delete destination files that have no source counterpart.
    #[command(
        about = "Delete orphaned destination files",
        after_help = "Examples:\n  vidprep reconcile labels images --src-ext txt --dst-ext jpg\n  vidprep reconcile labels images --src-ext txt --dst-ext jpg --dry-run --json"
    )]
    Reconcile {
        /// Directory holding the reference files.
        source_dir: PathBuf,
        /// Directory to clean up.
        destination_dir: PathBuf,
        /// Extension of source files, without the dot.
        #[arg(long)]
        src_ext: String,
        /// Extension of destination files, without the dot.
        #[arg(long)]
        dst_ext: String,
        /// List the files that would be deleted without deleting them.
        #[arg(long)]
        dry_run: bool,
        /// Output the result as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Copy a random sample of (annotation, image) pairs.
    #[command(
        about = "Copy a random sample of file pairs",
        after_help = "Examples:\n  vidprep sample labels images val/labels val/images --ratio 0.2"
    )]
    Sample {
        /// Directory holding the annotation files.
        source_dir: PathBuf,
        /// Directory holding the image files.
        destination_dir: PathBuf,
        /// Where copied annotations go.
        annotation_out: PathBuf,
        /// Where copied images go.
        image_out: PathBuf,
        /// Extension of annotation files.
        #[arg(long, default_value = "txt")]
        src_ext: String,
        /// Extension of image files.
        #[arg(long, default_value = "jpg")]
        dst_ext: String,
        /// Fraction of source names to copy.
        #[arg(long)]
        ratio: f64,
        /// Output the copied names as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Sample frames from videos at a fixed stride.
    #[command(
        about = "Sample video frames to PNG files",
        after_help = "Examples:\n  vidprep extract-frames a.mp4 b.mp4 --out frames/ --step 200 --count 10\n  vidprep extract-frames camera --out webcam_ --count 5\n  vidprep extract-frames https://www.youtube.com/watch?v=ID --resolve --out yt_"
    )]
    ExtractFrames {
        /// Video files, URLs, or `camera` for the default capture device.
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Prefix prepended to each frame file name (use a trailing `/` for a directory).
        #[arg(long, default_value = "")]
        out: String,
        /// Sampling stride in frames.
        #[arg(long, default_value_t = vidprep::DEFAULT_FRAME_STEP)]
        step: u64,
        /// Maximum frames per source.
        #[arg(long, default_value_t = vidprep::DEFAULT_FRAME_COUNT)]
        count: u64,
        /// Resolve URL inputs with yt-dlp before opening them.
        #[arg(long)]
        resolve: bool,
    },

    /// Cut videos into numbered clips by time range.
    #[command(
        about = "Clip videos by time range",
        after_help = "Examples:\n  vidprep clip a.mp4 b.mp4 --out clips --ranges '2-5,7-9;0:30-0:45'\n  vidprep clip a.mp4 --out clips --ranges-file ranges.json --fourcc avc1"
    )]
    Clip {
        /// Video files or URLs.
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Output directory for clips.
        #[arg(long)]
        out: PathBuf,
        /// Ranges in seconds: `start-stop` pairs joined by `,`, one group per input joined by `;`.
        #[arg(long, conflicts_with = "ranges_file", required_unless_present = "ranges_file")]
        ranges: Option<String>,
        /// JSON file holding `[[[start, stop], ...], ...]`, one list per input.
        #[arg(long)]
        ranges_file: Option<PathBuf>,
        /// Codec tag of the clips.
        #[arg(long, default_value = "mp4v")]
        fourcc: String,
        /// Clip file extension.
        #[arg(long, default_value = "mp4")]
        ext: String,
        /// Resolve URL inputs with yt-dlp before opening them.
        #[arg(long)]
        resolve: bool,
    },

    /// Resolve streaming page URLs to direct stream URLs.
    #[command(
        about = "Resolve streaming URLs with yt-dlp",
        after_help = "Examples:\n  vidprep resolve https://www.youtube.com/watch?v=ID --json"
    )]
    Resolve {
        /// Page URLs.
        #[arg(required = true)]
        urls: Vec<String>,
        /// Output the resolved URLs as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    value.parse().ok()
}

/// Parse `SS`, `MM:SS` or `HH:MM:SS` (fractions allowed) into seconds.
fn parse_timecode(value: &str) -> Result<f64, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(seconds);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("invalid time format: {trimmed}").into());
    }

    let (hours, minutes, seconds_str) = if parts.len() == 3 {
        (parts[0].parse::<u64>()?, parts[1].parse::<u64>()?, parts[2])
    } else {
        (0_u64, parts[0].parse::<u64>()?, parts[1])
    };

    let seconds = seconds_str.parse::<f64>()?;
    Ok((hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds)
}

/// Parse `"2-5,7-9;0-3"` into one range list per input.
fn parse_range_groups(value: &str) -> Result<Vec<Vec<TimeRange>>, Box<dyn std::error::Error>> {
    let mut groups = Vec::new();
    for group in value.split(';') {
        let mut ranges = Vec::new();
        for pair in group.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
            let (start, stop) = pair
                .split_once('-')
                .ok_or(format!("range must be `start-stop`: {pair}"))?;
            ranges.push(TimeRange::new(parse_timecode(start)?, parse_timecode(stop)?));
        }
        groups.push(ranges);
    }
    Ok(groups)
}

fn parse_range_json(contents: &str) -> Result<Vec<Vec<TimeRange>>, Box<dyn std::error::Error>> {
    let groups: Vec<Vec<(f64, f64)>> = serde_json::from_str(contents)?;
    Ok(groups
        .into_iter()
        .map(|group| group.into_iter().map(TimeRange::from).collect())
        .collect())
}

fn parse_input(value: &str) -> VideoSource {
    if value.eq_ignore_ascii_case("camera") {
        VideoSource::Camera
    } else {
        VideoSource::from(value)
    }
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        vidprep::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

fn frames_config(global: &GlobalOptions) -> Result<FramesWriterConfig, Box<dyn std::error::Error>> {
    let mut config = FramesWriterConfig::new();
    if global.progress {
        config = config.with_progress(Arc::new(TerminalProgress::new()?));
    }
    Ok(config)
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        bar.enable_steady_tick(Duration::from_millis(120));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        self.bar.set_message(format!("{:?}", info.operation));
    }
}

impl Drop for TerminalProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Reconcile {
            source_dir,
            destination_dir,
            src_ext,
            dst_ext,
            dry_run,
            json,
        } => {
            let mut reconciler =
                DirectoryReconciler::new(&source_dir, &destination_dir, &src_ext, &dst_ext)?;
            if cli.global.verbose {
                eprintln!(
                    "{} {} source name(s), {} destination name(s)",
                    "info:".cyan().bold(),
                    reconciler.source_names().len(),
                    reconciler.destination_names().len(),
                );
            }

            if dry_run {
                let orphans = reconciler.orphans();
                if json {
                    println!("{}", serde_json::to_string_pretty(&json!({ "orphans": orphans }))?);
                } else {
                    for name in &orphans {
                        println!("{}", destination_dir.join(format!("{name}.{dst_ext}")).display());
                    }
                    eprintln!("{} {} orphan(s) found", "dry run:".yellow().bold(), orphans.len());
                }
                return Ok(());
            }

            let report = reconciler.delete_orphans()?;
            if json {
                let payload = json!({
                    "deleted": report.deleted.iter().map(|path| path.display().to_string()).collect::<Vec<_>>(),
                    "missing": report.missing.iter().map(|path| path.display().to_string()).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                if cli.global.verbose {
                    for path in &report.deleted {
                        println!("deleted {}", path.display());
                    }
                }
                for path in &report.missing {
                    eprintln!(
                        "{} {}",
                        "warning:".yellow().bold(),
                        format!("already missing: {}", path.display()).yellow()
                    );
                }
                println!(
                    "{} {} file(s) deleted",
                    "done:".green().bold(),
                    report.deleted.len()
                );
            }
        }
        Commands::Sample {
            source_dir,
            destination_dir,
            annotation_out,
            image_out,
            src_ext,
            dst_ext,
            ratio,
            json,
        } => {
            fs::create_dir_all(&annotation_out)?;
            fs::create_dir_all(&image_out)?;
            let reconciler =
                DirectoryReconciler::new(&source_dir, &destination_dir, &src_ext, &dst_ext)?;
            let picked = reconciler.random_copy(&annotation_out, &image_out, ratio)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&json!({ "copied": picked }))?);
            } else {
                if cli.global.verbose {
                    for name in &picked {
                        println!("{name}");
                    }
                }
                println!(
                    "{} {} pair(s) copied",
                    "done:".green().bold(),
                    picked.len()
                );
            }
        }
        Commands::ExtractFrames {
            inputs,
            out,
            step,
            count,
            resolve,
        } => {
            let config = frames_config(&cli.global)?
                .with_frame_step(step)
                .with_frame_count(count);
            let sources: Vec<VideoSource> = inputs.iter().map(String::as_str).map(parse_input).collect();
            let mut writer = if resolve {
                FramesWriter::with_transform(
                    sources,
                    config,
                    resolver_transform(YtDlpResolver::default()),
                )?
            } else {
                FramesWriter::new(sources, config)?
            };

            let summary = writer.write(&out)?;
            if cli.global.verbose {
                for path in &summary.files {
                    println!("{}", path.display());
                }
            }
            for source in &summary.unreadable {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("could not open {source}").yellow()
                );
            }
            println!(
                "{} {} frame(s) from {} source(s)",
                "done:".green().bold(),
                summary.frames_written,
                summary.sources
            );
        }
        Commands::Clip {
            inputs,
            out,
            ranges,
            ranges_file,
            fourcc,
            ext,
            resolve,
        } => {
            let time_ranges = match (ranges, ranges_file) {
                (Some(ranges), _) => parse_range_groups(&ranges)?,
                (None, Some(path)) => parse_range_json(&fs::read_to_string(path)?)?,
                (None, None) => return Err("one of --ranges or --ranges-file is required".into()),
            };

            let config = frames_config(&cli.global)?
                .with_fourcc(fourcc.parse()?)
                .with_clip_extension(&ext);
            let sources: Vec<VideoSource> = inputs.iter().map(String::as_str).map(parse_input).collect();
            let writer = if resolve {
                FramesWriter::with_transform(
                    sources,
                    config,
                    resolver_transform(YtDlpResolver::default()),
                )?
            } else {
                FramesWriter::new(sources, config)?
            };

            fs::create_dir_all(&out)?;
            let clips = writer.clip_by_time_ranges(&out, &time_ranges)?;
            if cli.global.verbose {
                for path in &clips {
                    println!("{}", path.display());
                }
            }
            let requested = time_ranges.iter().map(Vec::len).sum::<usize>();
            if clips.len() < requested {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("{} clip(s) skipped", requested - clips.len()).yellow()
                );
            }
            println!(
                "{} {} clip(s) written to {}",
                "done:".green().bold(),
                clips.len(),
                out.display()
            );
        }
        Commands::Resolve { urls, json } => {
            let resolver = YtDlpResolver::default();
            let resolved = if cli.global.progress {
                resolve_urls_with_progress(&resolver, &urls, Arc::new(TerminalProgress::new()?))?
            } else {
                resolve_urls(&resolver, &urls)?
            };
            let streams: Vec<String> = resolved.iter().map(ToString::to_string).collect();
            if json {
                let payload: Vec<_> = urls
                    .iter()
                    .zip(&streams)
                    .map(|(page, stream)| json!({ "page": page, "stream": stream }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for stream in &streams {
                    println!("{stream}");
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "vidprep", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_input, parse_log_level, parse_range_groups, parse_range_json, parse_timecode};
    use vidprep::{TimeRange, VideoSource};

    #[test]
    fn parse_timecode_formats() {
        assert_eq!(parse_timecode("75").unwrap(), 75.0);
        assert_eq!(parse_timecode("01:15").unwrap(), 75.0);
        assert_eq!(parse_timecode("00:01:15.5").unwrap(), 75.5);
        assert!(parse_timecode("").is_err());
        assert!(parse_timecode("1:2:3:4").is_err());
    }

    #[test]
    fn parse_range_groups_per_input() {
        let groups = parse_range_groups("2-5, 7-9.5;0:30-0:45").unwrap();
        assert_eq!(
            groups,
            vec![
                vec![TimeRange::new(2.0, 5.0), TimeRange::new(7.0, 9.5)],
                vec![TimeRange::new(30.0, 45.0)],
            ]
        );
        assert!(parse_range_groups("2..5").is_err());
    }

    #[test]
    fn parse_range_json_groups() {
        let groups = parse_range_json("[[[2, 5], [7.5, 9]], []]").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0][1], TimeRange::new(7.5, 9.0));
        assert!(groups[1].is_empty());
        assert!(parse_range_json("{\"a\": 1}").is_err());
    }

    #[test]
    fn parse_input_camera_keyword() {
        assert_eq!(parse_input("camera"), VideoSource::Camera);
        assert_eq!(parse_input(""), VideoSource::Camera);
        assert!(matches!(parse_input("a.mp4"), VideoSource::File(_)));
        assert!(matches!(parse_input("rtsp://cam/1"), VideoSource::Url(_)));
    }

    #[test]
    fn parse_log_level_aliases() {
        assert!(parse_log_level("warning").is_some());
        assert!(parse_log_level("quiet").is_some());
        assert!(parse_log_level("loud").is_none());
    }
}

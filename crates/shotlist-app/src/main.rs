//! Shotlist - keyframe product listings from narrated video
//!
//! Samples a video, selects visually distinct keyframes, aligns product
//! mentions from a metadata file to them and writes the stills plus a
//! product listing into the output directory.
//!
//! Exit codes: 0 success, 2 video error, 3 metadata error, 1 anything else.

mod config;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use config::ShotlistConfig;
use indicatif::{ProgressBar, ProgressStyle};
use shotlist_align::{
    detect_keyframes, load_phrases, run_analysis, AnalysisProgress, ListingStore, ProductListing,
};
use shotlist_core::{
    format_timecode, seconds_to_millis, KeyframeId, MediaError, MetadataError, ShotlistError,
};
use shotlist_media::{StillFormat, StillWriter, VideoDecoder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Still image format on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ImageFormat {
    Jpg,
    Png,
}

impl From<ImageFormat> for StillFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpg => StillFormat::Jpeg,
            ImageFormat::Png => StillFormat::Png,
        }
    }
}

/// Extract keyframes from a narrated video and match product mentions to them.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input video file
    #[arg(long, value_parser = clap::value_parser!(PathBuf))]
    video: PathBuf,

    /// Product mention metadata (JSON mention list or analyzer result)
    #[arg(
        short,
        long,
        value_parser = clap::value_parser!(PathBuf),
        required_unless_present = "timestamps_only"
    )]
    metadata: Option<PathBuf>,

    /// Output directory for stills and listing files
    #[arg(short, long, default_value = "shotlist_out")]
    outdir: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    config: Option<PathBuf>,

    /// Frames per second to sample (default: 2.0)
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Scene change threshold in [0, 1] (default: 0.15)
    #[arg(long)]
    scene_threshold: Option<f64>,

    /// Minimum seconds between keyframes (default: 1.0)
    #[arg(long)]
    min_spacing: Option<f64>,

    /// Score advantage needed to replace a recent keyframe (default: 0.1)
    #[arg(long)]
    replace_margin: Option<f64>,

    /// Seconds of slack around each phrase when matching (default: 1.5)
    #[arg(long)]
    alignment_tolerance: Option<f64>,

    /// Merge mentions of one product closer than this many seconds (default: 0.5)
    #[arg(long)]
    merge_gap: Option<f64>,

    /// Distance below which keyframes count as tied (default: 0.001)
    #[arg(long)]
    tie_epsilon: Option<f64>,

    /// Still file name prefix (default: "keyframe")
    #[arg(long)]
    prefix: Option<String>,

    /// Still image format (default: jpg)
    #[arg(value_enum, short = 'f', long)]
    format: Option<ImageFormat>,

    /// Still quality, 1 (best) to 31 (worst) (default: 2)
    #[arg(short = 'q', long, value_parser = clap::value_parser!(u8).range(1..=31))]
    quality: Option<u8>,

    /// Rescale stills to this width, keeping the aspect ratio
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    scale_width: Option<u32>,

    /// Only write stills for keyframes matched to a product
    #[arg(long, action = ArgAction::SetTrue)]
    only_matched: bool,

    /// Log the stills that would be written without writing them
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,

    /// Print the selected keyframe timestamps and exit
    #[arg(long, action = ArgAction::SetTrue)]
    timestamps_only: bool,

    /// FFmpeg binary (default: searched on PATH)
    #[arg(long, value_parser = clap::value_parser!(PathBuf))]
    ffmpeg: Option<PathBuf>,

    /// More logging (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Overlay command line values on the loaded configuration.
    fn apply(&self, config: &mut ShotlistConfig) {
        if let Some(v) = self.sample_rate {
            config.decode.sample_rate = v;
        }
        if let Some(path) = &self.ffmpeg {
            config.decode.ffmpeg_binary = Some(path.clone());
        }
        if let Some(v) = self.scene_threshold {
            config.analysis.detect.scene_threshold = v;
        }
        if let Some(v) = self.min_spacing {
            config.analysis.select.min_spacing = v;
        }
        if let Some(v) = self.replace_margin {
            config.analysis.select.replace_margin = v;
        }
        if let Some(v) = self.alignment_tolerance {
            config.analysis.align.alignment_tolerance = v;
        }
        if let Some(v) = self.tie_epsilon {
            config.analysis.align.tie_epsilon = v;
        }
        if let Some(v) = self.merge_gap {
            config.phrases.merge_gap = v;
        }
        if let Some(prefix) = &self.prefix {
            config.stills.prefix = prefix.clone();
        }
        if let Some(format) = self.format {
            config.stills.format = format.into();
        }
        if let Some(q) = self.quality {
            config.stills.quality = q;
        }
        if self.scale_width.is_some() {
            config.stills.scale_width = self.scale_width;
        }
        config.stills.dry_run |= self.dry_run;
        config.only_matched |= self.only_matched;
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(&e));
        }
    };
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Help and version requests succeed; usage errors exit 1 so they never
/// read as a video failure.
fn usage_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}

/// Map the root cause of a failed run to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ShotlistError>() {
            match e {
                ShotlistError::Media(_) => return 2,
                ShotlistError::Metadata(_) => return 3,
                _ => {}
            }
        }
        if cause.is::<MediaError>() {
            return 2;
        }
        if cause.is::<MetadataError>() {
            return 3;
        }
    }
    1
}

fn run(args: &Args) -> Result<()> {
    let mut config = ShotlistConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    info!(video = %args.video.display(), "Shotlist starting...");

    if args.timestamps_only {
        return print_timestamps(args, &config);
    }

    // Metadata first: a bad file must fail the run before decoding starts.
    let metadata = args
        .metadata
        .as_deref()
        .context("--metadata is required unless --timestamps-only is set")?;
    let phrases = load_phrases(metadata, &config.phrases)?;

    let decoder = VideoDecoder::open(&args.video, &config.decode)?;
    let spinner = spinner()?;
    let result = run_analysis(decoder, &phrases, &config.analysis, |p: AnalysisProgress| {
        spinner.set_message(p.message)
    });
    spinner.finish_and_clear();
    let result = result?;

    // Everything below only runs once detection and alignment succeeded.
    let writer = StillWriter::new(&args.outdir, config.stills.clone());
    let matched = result.report.matched_ids();
    let written = if config.only_matched {
        writer.write_all(&result.keyframes, |id| matched.contains(&id))?
    } else {
        writer.write_all(&result.keyframes, |_| true)?
    };
    let keyframes = result.keyframes.with_source_paths(written);

    let listing = ProductListing::new(&args.video, &keyframes, &result.report);
    let files = ListingStore::new(&args.outdir).save_all(&listing)?;

    info!(
        frames = result.frames_sampled,
        keyframes = keyframes.len(),
        products = result.report.matches.len(),
        matched = result.report.matched_count(),
        unmatched = result.report.warnings.len(),
        "Shotlist complete"
    );
    print_summary(&args.outdir, &files, &matched, keyframes.len());
    Ok(())
}

/// Detect keyframes only and print one `ms<TAB>timecode` line per keyframe.
fn print_timestamps(args: &Args, config: &ShotlistConfig) -> Result<()> {
    let decoder = VideoDecoder::open(&args.video, &config.decode)?;
    let spinner = spinner()?;
    let detection = detect_keyframes(decoder, &config.analysis, |p| {
        spinner.set_message(p.message)
    });
    spinner.finish_and_clear();
    let detection = detection?;

    for keyframe in &detection.keyframes {
        println!(
            "{}\t{}",
            seconds_to_millis(keyframe.timestamp),
            format_timecode(keyframe.timestamp)
        );
    }
    Ok(())
}

fn spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn print_summary(
    outdir: &Path,
    files: &[PathBuf],
    matched: &BTreeSet<KeyframeId>,
    keyframes: usize,
) {
    println!(
        "Selected {keyframes} keyframes, {} matched to products",
        matched.len()
    );
    for file in files {
        println!("Wrote {}", file.display());
    }
    println!("Output directory: {}", outdir.display());
}

//! clipmix - Main entry point
//!
//! Command-line front end over the merge pipeline: reads clip files,
//! runs a merge (or noise synthesis / loudness analysis) and writes the
//! result. Ctrl+C cancels an in-flight merge.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use clipmix_common::config::{load_config, OutputFormat, CONFIG_ENV_VAR};
use clipmix_common::{FadeCurve, MergeEvent};
use clipmix_engine::analysis::LoudnessAnalyzer;
use clipmix_engine::audio::encode_wav;
use clipmix_engine::mix::schedule_with_curve;
use clipmix_engine::noise::{synthesize, synthesize_with_rng};
use clipmix_engine::{
    AmbientBed, EncodeSettings, MergeOrchestrator, MergeOutcome, MergeRequest, MixConfig, NoiseKind,
    Playlist, SampleDecoder,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for clipmix
#[derive(Parser, Debug)]
#[command(name = "clipmix")]
#[command(about = "Merge audio clips with crossfades into one track")]
#[command(version)]
struct Args {
    /// Config file (overrides CLIPMIX_CONFIG and the user config file)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge clips into one encoded track
    Merge {
        /// Input clips, in timeline order
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Crossfade between adjacent clips in seconds (default from config)
        #[arg(long)]
        crossfade: Option<f64>,

        /// Per-clip gain in [0, 2], repeat once per file; missing gains are 1.0
        #[arg(long = "gain")]
        gains: Vec<f32>,

        /// Normalize each clip's loudness before mixing
        #[arg(long)]
        normalize: bool,

        /// Noise bed before the first clip, KIND:SECONDS[:GAIN]
        #[arg(long, value_parser = parse_bed)]
        intro: Option<AmbientBed>,

        /// Noise bed after the last clip, KIND:SECONDS[:GAIN]
        #[arg(long, value_parser = parse_bed)]
        outro: Option<AmbientBed>,

        /// Output format (default: from the output extension, then config)
        #[arg(long, value_parser = parse_format)]
        format: Option<OutputFormat>,

        /// Crossfade curve: linear, s_curve or equal_power
        #[arg(long, default_value = "linear", value_parser = parse_curve)]
        curve: FadeCurve,

        /// Print the timeline without rendering or writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Synthesize an ambient noise bed to a WAV file
    Noise {
        /// white, pink, brown, light-rain, heavy-rain, river or thunder
        #[arg(value_parser = parse_kind)]
        kind: NoiseKind,

        /// Length in seconds
        #[arg(short, long)]
        duration: f64,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print RMS and normalization gain per file
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref(), CONFIG_ENV_VAR).context("Failed to load configuration")?;

    // Initialize tracing
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("clipmix={level},clipmix_engine={level},clipmix_common={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!(
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "clipmix {}",
        env!("CARGO_PKG_VERSION")
    );

    let mix = MixConfig::from(&config);
    mix.validate().context("Invalid configuration")?;
    let encode = EncodeSettings::from(&config);

    match args.command {
        Command::Merge {
            files,
            output,
            crossfade,
            gains,
            normalize,
            intro,
            outro,
            format,
            curve,
            dry_run,
        } => {
            let format = format
                .or_else(|| format_from_extension(&output))
                .unwrap_or(encode.format);
            let request = MergeRequest {
                crossfade_seconds: crossfade.unwrap_or_else(|| mix.bounded_crossfade()),
                normalize,
                intro,
                outro,
                format,
                fade_curve: curve,
            };
            let playlist = load_playlist(&files, &gains)?;

            if dry_run {
                print_schedule(&playlist, &request, &mix)?;
                return Ok(ExitCode::SUCCESS);
            }
            run_merge(playlist, request, mix, encode, &output).await
        }
        Command::Noise { kind, duration, output, seed } => {
            let buffer = match seed {
                Some(seed) => synthesize_with_rng(kind, duration, &mut StdRng::seed_from_u64(seed)),
                None => synthesize(kind, duration),
            }
            .context("Noise synthesis failed")?;
            let wav = encode_wav(&buffer).context("WAV encoding failed")?;
            std::fs::write(&output, &wav)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(kind = %kind, bytes = wav.len(), output = %output.display(), "Wrote noise bed");
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze { files, json } => {
            analyze_files(&files, &LoudnessAnalyzer::new(mix.target_rms), json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run one merge, cancelling it on Ctrl+C
async fn run_merge(
    playlist: Playlist,
    request: MergeRequest,
    mix: MixConfig,
    encode: EncodeSettings,
    output: &Path,
) -> Result<ExitCode> {
    let orchestrator = Arc::new(MergeOrchestrator::new(mix, encode));

    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(MergeEvent::Progress { percent, stage, .. }) => info!(percent, ?stage, "Progress"),
                Ok(MergeEvent::ClipDecoded { name, duration_seconds, .. }) => {
                    info!(clip = %name, duration_seconds, "Decoded")
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut merge = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.start_merge(&playlist, request).await })
    };

    let joined = tokio::select! {
        res = &mut merge => res,
        _ = signal::ctrl_c() => {
            warn!("Received Ctrl+C, cancelling merge");
            orchestrator.cancel().await;
            merge.await
        }
    };

    match joined.context("Merge task panicked")?.context("Merge failed")? {
        MergeOutcome::Completed(summary) => {
            let bytes = orchestrator
                .take_output()
                .await
                .ok_or_else(|| anyhow!("Merge completed without output"))?;
            std::fs::write(output, &bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(
                output = %output.display(),
                bytes = summary.output_len,
                duration_seconds = summary.duration_seconds,
                "Merge written"
            );
            Ok(ExitCode::SUCCESS)
        }
        MergeOutcome::Cancelled => {
            warn!("Merge cancelled, nothing written");
            Ok(ExitCode::from(130))
        }
    }
}

fn load_playlist(files: &[PathBuf], gains: &[f32]) -> Result<Playlist> {
    if gains.len() > files.len() {
        bail!("Got {} --gain values for {} files", gains.len(), files.len());
    }

    let mut playlist = Playlist::new();
    for (i, path) in files.iter().enumerate() {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let id = playlist.add(name, bytes);
        if let Some(&gain) = gains.get(i) {
            playlist.set_volume(id, gain)?;
        }
    }
    Ok(playlist)
}

/// Decode every clip and print where it would land
fn print_schedule(playlist: &Playlist, request: &MergeRequest, mix: &MixConfig) -> Result<()> {
    let analyzer = LoudnessAnalyzer::new(mix.target_rms);
    let mut names = Vec::new();
    let mut durations = Vec::new();
    let mut gains = Vec::new();

    if let Some(bed) = &request.intro {
        names.push(format!("[intro {}]", bed.kind));
        durations.push(bed.duration_seconds);
        gains.push(bed.gain);
    }
    for clip in playlist.iter() {
        let buffer = SampleDecoder::decode(&clip.bytes).with_context(|| format!("Failed to decode {}", clip.name))?;
        let gain = if request.normalize {
            clip.volume * analyzer.analyze(&buffer)
        } else {
            clip.volume
        };
        names.push(clip.name.clone());
        durations.push(buffer.duration_seconds());
        gains.push(gain);
    }
    if let Some(bed) = &request.outro {
        names.push(format!("[outro {}]", bed.kind));
        durations.push(bed.duration_seconds);
        gains.push(bed.gain);
    }

    let schedule = schedule_with_curve(&durations, &gains, request.crossfade_seconds, request.fade_curve)?;
    for (name, placement) in names.iter().zip(&schedule.placements) {
        println!(
            "{:>9.3}s  {:>8.3}s  fade {:>6.3}s  {}",
            placement.start, placement.duration, placement.fade, name
        );
    }
    println!(
        "total {:.3}s, crossfade {:.3}s, {:?}",
        schedule.total_duration, schedule.crossfade, request.format
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct AnalysisReport {
    file: String,
    duration_seconds: f64,
    sample_rate: u32,
    channels: usize,
    rms: f32,
    gain: f32,
}

fn analyze_files(files: &[PathBuf], analyzer: &LoudnessAnalyzer, json: bool) -> Result<()> {
    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let buffer = SampleDecoder::decode(&bytes).with_context(|| format!("Failed to decode {}", path.display()))?;
        reports.push(AnalysisReport {
            file: path.display().to_string(),
            duration_seconds: buffer.duration_seconds(),
            sample_rate: buffer.sample_rate(),
            channels: buffer.channel_count(),
            rms: LoudnessAnalyzer::rms(&buffer),
            gain: analyzer.analyze(&buffer),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for r in &reports {
            println!(
                "{}: {:.2}s {}Hz {}ch rms {:.4} gain {:.3}",
                r.file, r.duration_seconds, r.sample_rate, r.channels, r.rms, r.gain
            );
        }
    }
    Ok(())
}

fn format_from_extension(path: &Path) -> Option<OutputFormat> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse().ok())
}

fn parse_format(s: &str) -> std::result::Result<OutputFormat, String> {
    s.parse().map_err(|e: clipmix_common::Error| e.to_string())
}

fn parse_curve(s: &str) -> std::result::Result<FadeCurve, String> {
    s.parse().map_err(|e: clipmix_common::Error| e.to_string())
}

fn parse_kind(s: &str) -> std::result::Result<NoiseKind, String> {
    s.parse().map_err(|e: clipmix_engine::Error| e.to_string())
}

/// `KIND:SECONDS` or `KIND:SECONDS:GAIN`
fn parse_bed(s: &str) -> std::result::Result<AmbientBed, String> {
    let mut parts = s.split(':');
    let kind = parse_kind(parts.next().unwrap_or_default())?;
    let seconds: f64 = parts
        .next()
        .ok_or_else(|| format!("Expected KIND:SECONDS, got '{}'", s))?
        .parse()
        .map_err(|e| format!("Invalid seconds in '{}': {}", s, e))?;
    let gain: f32 = match parts.next() {
        Some(g) => g.parse().map_err(|e| format!("Invalid gain in '{}': {}", s, e))?,
        None => 1.0,
    };
    if parts.next().is_some() {
        return Err(format!("Too many fields in '{}'", s));
    }
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(format!("Bed duration must be positive, got {}", seconds));
    }

    Ok(AmbientBed { kind, duration_seconds: seconds, gain })
}

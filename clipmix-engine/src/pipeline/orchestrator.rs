//! Merge orchestration
//!
//! Runs Decoder → Renderer → Encoder as one cancellable async operation and
//! owns the pipeline state machine:
//!
//! ```text
//! Idle ──start_merge──▶ Processing ──▶ Completed
//!   ▲                       │    └───▶ Failed
//!   └──────cancelled────────┘
//! ```
//!
//! Decode and render run on the blocking pool; encode runs on its own
//! worker thread. Cancellation is checked before each decode, before and
//! after render, between encoder blocks, and before every event a merge
//! publishes. A cancelled merge stays in Processing until it has stopped.

use crate::analysis::LoudnessAnalyzer;
use crate::audio::decoder::SampleDecoder;
use crate::audio::types::AudioBuffer;
use crate::config::{EncodeSettings, MixConfig};
use crate::encode::{ChunkedEncoder, EncoderFactory};
use crate::error::{Error, Result};
use crate::mix::renderer::render_with_curve;
use crate::noise::{synthesize, NoiseKind};
use crate::pipeline::progress::{
    decode_percent, encode_percent, ProgressTracker, COMPLETE, RENDER_END, RENDER_START,
};
use crate::pipeline::state::{ActiveMerge, PipelineStatus, StatusInner};
use crate::playlist::{Clip, Playlist};
use chrono::Utc;
use clipmix_common::config::OutputFormat;
use clipmix_common::{FadeCurve, MergeEvent, MergeStage, PipelineState};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Minimum number of playlist clips for a merge
pub const MIN_MERGE_CLIPS: usize = 2;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Procedural noise placed before or after the clips
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientBed {
    pub kind: NoiseKind,
    pub duration_seconds: f64,
    /// Gain multiplier applied like a clip volume
    pub gain: f32,
}

impl AmbientBed {
    pub fn new(kind: NoiseKind, duration_seconds: f64) -> Self {
        Self { kind, duration_seconds, gain: 1.0 }
    }
}

/// Per-merge options
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRequest {
    pub crossfade_seconds: f64,
    /// Multiply each clip gain by its loudness-normalization gain
    pub normalize: bool,
    pub intro: Option<AmbientBed>,
    pub outro: Option<AmbientBed>,
    pub format: OutputFormat,
    pub fade_curve: FadeCurve,
}

impl Default for MergeRequest {
    fn default() -> Self {
        Self {
            crossfade_seconds: MixConfig::default().crossfade_seconds,
            normalize: false,
            intro: None,
            outro: None,
            format: OutputFormat::default(),
            fade_curve: FadeCurve::default(),
        }
    }
}

impl MergeRequest {
    pub fn with_crossfade(mut self, seconds: f64) -> Self {
        self.crossfade_seconds = seconds;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Decoded duration of one playlist clip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipDuration {
    pub clip_id: Uuid,
    pub duration_seconds: f64,
}

/// Result of a successful merge. The bytes stay in the orchestrator until
/// `take_output`.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    pub output_len: usize,
    /// Composite length in seconds
    pub duration_seconds: f64,
    pub clip_durations: Vec<ClipDuration>,
}

impl MergeSummary {
    /// Copy decoded durations back into the playlist; clips removed since
    /// the merge started are skipped.
    pub fn apply_durations(&self, playlist: &mut Playlist) {
        for d in &self.clip_durations {
            if playlist.get(d.clip_id).is_some() {
                let _ = playlist.set_duration(d.clip_id, d.duration_seconds);
            }
        }
    }
}

/// How a merge ended, when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Completed(MergeSummary),
    /// Cancelled by the caller; state is back to Idle
    Cancelled,
}

/// Everything one merge needs, built at start and dropped at the end
struct MergeContext {
    merge_id: Uuid,
    token: CancellationToken,
    finished: CancellationToken,
    clips: Vec<Clip>,
    request: MergeRequest,
    mix: MixConfig,
}

impl MergeContext {
    fn checkpoint(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Drop for MergeContext {
    // Also fires when the `start_merge` future is dropped mid-run
    fn drop(&mut self) {
        self.finished.cancel();
    }
}

/// One timeline entry before decoding
enum Source<'a> {
    Clip(&'a Clip),
    Bed(AmbientBed),
}

/// Merge pipeline orchestrator
pub struct MergeOrchestrator {
    status: RwLock<StatusInner>,
    progress: ProgressTracker,
    events: broadcast::Sender<MergeEvent>,
    mix: MixConfig,
    encode: EncodeSettings,
    encoder_factory: Option<EncoderFactory>,
}

impl MergeOrchestrator {
    pub fn new(mix: MixConfig, encode: EncodeSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            status: RwLock::new(StatusInner::default()),
            progress: ProgressTracker::new(events.clone()),
            events,
            mix,
            encode,
            encoder_factory: None,
        }
    }

    /// Orchestrator whose encoder stage uses `factory` instead of the
    /// built-in MP3/WAV encoders
    pub fn with_encoder_factory(mix: MixConfig, encode: EncodeSettings, factory: EncoderFactory) -> Self {
        let mut orchestrator = Self::new(mix, encode);
        orchestrator.encoder_factory = Some(factory);
        orchestrator
    }

    /// Subscribe to merge events
    pub fn subscribe(&self) -> broadcast::Receiver<MergeEvent> {
        self.events.subscribe()
    }

    pub fn mix_config(&self) -> &MixConfig {
        &self.mix
    }

    /// Default request derived from configuration
    pub fn default_request(&self) -> MergeRequest {
        MergeRequest {
            crossfade_seconds: self.mix.bounded_crossfade(),
            format: self.encode.format,
            ..MergeRequest::default()
        }
    }

    pub async fn status(&self) -> PipelineStatus {
        self.status.read().await.snapshot(self.progress.get())
    }

    /// Move the stored output out, leaving none behind
    pub async fn take_output(&self) -> Option<Vec<u8>> {
        self.status.write().await.output.take()
    }

    /// Signal the in-flight merge to stop. No-op when idle.
    pub async fn cancel(&self) {
        if let Some(active) = &self.status.read().await.active {
            info!(merge_id = %active.merge_id, "Cancelling merge");
            active.token.cancel();
        }
    }

    /// Cancel any in-flight merge, wait for it to stop, then return to Idle
    /// with no output, error or progress.
    ///
    /// Must not be awaited from the task driving `start_merge`.
    pub async fn reset(&self) {
        loop {
            let mut status = self.status.write().await;
            match status.active.clone() {
                Some(active) if !active.finished.is_cancelled() => {
                    drop(status);
                    info!(merge_id = %active.merge_id, "Reset waiting for in-flight merge to stop");
                    active.token.cancel();
                    active.finished.cancelled().await;
                }
                _ => {
                    status.active = None;
                    let old = status.state;
                    status.state = PipelineState::Idle;
                    status.error = None;
                    status.output = None;
                    self.progress.reset();
                    drop(status);

                    if old != PipelineState::Idle {
                        self.emit_state_change(old, PipelineState::Idle);
                    }
                    return;
                }
            }
        }
    }

    /// Merge every playlist clip into one encoded track.
    ///
    /// # Returns
    /// - `Ok(MergeOutcome::Completed)` with bytes stored for `take_output`
    /// - `Ok(MergeOutcome::Cancelled)` when cancelled (state back to Idle)
    ///
    /// # Errors
    /// - `Validation` for fewer than two clips (state untouched)
    /// - `InvalidState` while another merge is processing
    /// - `Decode`/`Render`/`Encode` failures, after moving to Failed
    pub async fn start_merge(&self, playlist: &Playlist, request: MergeRequest) -> Result<MergeOutcome> {
        if playlist.len() < MIN_MERGE_CLIPS {
            return Err(Error::Validation(format!(
                "Need at least {} clips to merge, got {}",
                MIN_MERGE_CLIPS,
                playlist.len()
            )));
        }

        let ctx = self.begin(playlist, request).await?;

        info!(
            merge_id = %ctx.merge_id,
            clips = ctx.clips.len(),
            crossfade = ctx.request.crossfade_seconds,
            format = ?ctx.request.format,
            "Starting merge"
        );

        let result = self.run(&ctx).await;
        self.finish(ctx, result).await
    }

    /// Enter Processing with a fresh token and snapshot
    async fn begin(&self, playlist: &Playlist, request: MergeRequest) -> Result<MergeContext> {
        let mut status = self.status.write().await;
        if status.state.is_busy() {
            return Err(Error::InvalidState("A merge is already in progress".to_string()));
        }

        let ctx = MergeContext {
            merge_id: Uuid::new_v4(),
            token: CancellationToken::new(),
            finished: CancellationToken::new(),
            clips: playlist.clips().to_vec(),
            request,
            mix: self.mix.clone(),
        };

        let old = status.state;
        status.state = PipelineState::Processing;
        status.error = None;
        status.output = None;
        status.active = Some(ActiveMerge {
            merge_id: ctx.merge_id,
            token: ctx.token.clone(),
            finished: ctx.finished.clone(),
        });
        self.progress.reset();
        drop(status);

        self.emit_state_change(old, PipelineState::Processing);
        Ok(ctx)
    }

    async fn run(&self, ctx: &MergeContext) -> Result<(Vec<u8>, f64, Vec<ClipDuration>)> {
        // Decoding (0-30)
        let mut sources = Vec::with_capacity(ctx.clips.len() + 2);
        if let Some(bed) = ctx.request.intro {
            sources.push(Source::Bed(bed));
        }
        sources.extend(ctx.clips.iter().map(Source::Clip));
        if let Some(bed) = ctx.request.outro {
            sources.push(Source::Bed(bed));
        }

        let total = sources.len();
        let analyzer = LoudnessAnalyzer::new(ctx.mix.target_rms);
        let mut buffers = Vec::with_capacity(total);
        let mut gains = Vec::with_capacity(total);
        let mut durations = Vec::with_capacity(ctx.clips.len());

        for (i, source) in sources.iter().enumerate() {
            ctx.checkpoint()?;

            let (buffer, gain) = match source {
                Source::Clip(clip) => {
                    let buffer = decode_clip(clip).await?;
                    let duration_seconds = buffer.duration_seconds();
                    debug!(clip = %clip.name, duration_seconds, "Clip decoded");

                    ctx.checkpoint()?;
                    let _ = self.events.send(MergeEvent::ClipDecoded {
                        clip_id: clip.id,
                        name: clip.name.clone(),
                        duration_seconds,
                        timestamp: Utc::now(),
                    });
                    durations.push(ClipDuration { clip_id: clip.id, duration_seconds });

                    let gain = if ctx.request.normalize {
                        clip.volume * analyzer.analyze(&buffer)
                    } else {
                        clip.volume
                    };
                    (buffer, gain)
                }
                Source::Bed(bed) => (synthesize_bed(*bed).await?, bed.gain),
            };

            buffers.push(buffer);
            gains.push(gain);
            self.report(ctx, decode_percent(i + 1, total), MergeStage::Decoding)?;
        }

        // Rendering (35, 50)
        self.report(ctx, RENDER_START, MergeStage::Rendering)?;

        let crossfade = ctx.request.crossfade_seconds;
        let curve = ctx.request.fade_curve;
        let composite = tokio::task::spawn_blocking(move || render_with_curve(buffers, &gains, crossfade, curve))
            .await
            .map_err(|e| Error::Render(format!("Render task failed: {}", e)))??;

        self.report(ctx, RENDER_END, MergeStage::Rendering)?;
        let duration_seconds = composite.duration_seconds();

        // Encoding (50-100)
        let settings = self.encode.clone().with_format(ctx.request.format);
        let encoder = match &self.encoder_factory {
            Some(factory) => ChunkedEncoder::with_factory(settings, factory.clone()),
            None => ChunkedEncoder::new(settings),
        };
        let output = encoder
            .encode(
                composite,
                |fraction| {
                    let _ = self.report(ctx, encode_percent(fraction), MergeStage::Encoding);
                },
                ctx.token.clone(),
            )
            .await?;

        Ok((output, duration_seconds, durations))
    }

    /// Advance progress unless the merge has been cancelled
    fn report(&self, ctx: &MergeContext, percent: u8, stage: MergeStage) -> Result<()> {
        ctx.checkpoint()?;
        self.progress.advance(percent, stage);
        Ok(())
    }

    /// Map the run result onto the state machine
    async fn finish(
        &self,
        ctx: MergeContext,
        result: Result<(Vec<u8>, f64, Vec<ClipDuration>)>,
    ) -> Result<MergeOutcome> {
        let mut status = self.status.write().await;
        status.active = None;

        match result {
            Ok((output, duration_seconds, clip_durations)) => {
                let output_len = output.len();
                status.output = Some(output);
                status.state = PipelineState::Completed;
                drop(status);

                self.progress.advance(COMPLETE, MergeStage::Encoding);
                info!(merge_id = %ctx.merge_id, output_len, duration_seconds, "Merge completed");

                self.emit_state_change(PipelineState::Processing, PipelineState::Completed);
                let _ = self.events.send(MergeEvent::Completed {
                    output_bytes: output_len,
                    duration_seconds,
                    timestamp: Utc::now(),
                });

                Ok(MergeOutcome::Completed(MergeSummary {
                    output_len,
                    duration_seconds,
                    clip_durations,
                }))
            }
            Err(e) if e.is_cancellation() => {
                status.state = PipelineState::Idle;
                status.error = None;
                status.output = None;
                self.progress.reset();
                drop(status);

                warn!(merge_id = %ctx.merge_id, "Merge cancelled");
                let _ = self.events.send(MergeEvent::Cancelled { timestamp: Utc::now() });
                self.emit_state_change(PipelineState::Processing, PipelineState::Idle);

                Ok(MergeOutcome::Cancelled)
            }
            Err(e) => {
                let message = e.to_string();
                status.state = PipelineState::Failed;
                status.error = Some(message.clone());
                drop(status);

                error!(merge_id = %ctx.merge_id, error = %message, "Merge failed");
                let _ = self.events.send(MergeEvent::Failed {
                    message,
                    timestamp: Utc::now(),
                });
                self.emit_state_change(PipelineState::Processing, PipelineState::Failed);

                Err(e)
            }
        }
    }

    fn emit_state_change(&self, old_state: PipelineState, new_state: PipelineState) {
        debug!(%old_state, %new_state, "Pipeline state changed");
        let _ = self.events.send(MergeEvent::StateChanged {
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }
}

async fn decode_clip(clip: &Clip) -> Result<AudioBuffer> {
    let bytes = clip.bytes.clone();
    let buffer = tokio::task::spawn_blocking(move || SampleDecoder::decode(&bytes))
        .await
        .map_err(|e| Error::Decode(format!("Decode task failed: {}", e)))?;

    buffer.map_err(|e| match e {
        Error::Decode(msg) => Error::Decode(format!("{}: {}", clip.name, msg)),
        other => other,
    })
}

async fn synthesize_bed(bed: AmbientBed) -> Result<AudioBuffer> {
    if !bed.gain.is_finite() || bed.gain < 0.0 {
        return Err(Error::InvalidInput(format!("Invalid ambient bed gain: {}", bed.gain)));
    }
    tokio::task::spawn_blocking(move || synthesize(bed.kind, bed.duration_seconds))
        .await
        .map_err(|e| Error::Render(format!("Noise task failed: {}", e)))?
}

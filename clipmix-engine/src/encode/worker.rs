//! Chunked, cancellable encoding on a dedicated worker thread
//!
//! The composite buffer is moved into a `std::thread` worker that quantizes
//! and encodes one block at a time. The worker talks back to the async
//! caller only through an mpsc channel: zero or more `Progress` messages
//! followed by exactly one `Finished`.

use crate::audio::pcm::interleave_block;
use crate::audio::types::AudioBuffer;
use crate::config::EncodeSettings;
use crate::encode::block::{BlockEncoder, Mp3BlockEncoder, StreamFormat, WavBlockEncoder};
use crate::error::{Error, Result};
use clipmix_common::config::OutputFormat;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Builds the block encoder for a stream. Called on the worker thread.
pub type EncoderFactory = Arc<dyn Fn(&StreamFormat) -> Result<Box<dyn BlockEncoder>> + Send + Sync>;

/// Messages from the worker thread
#[derive(Debug)]
enum WorkerMessage {
    /// Fraction of blocks done, in [0, 1]
    Progress(f32),
    /// Terminal result; no message follows
    Finished(Result<Vec<u8>>),
}

/// Chunked encoder front end
#[derive(Clone)]
pub struct ChunkedEncoder {
    settings: EncodeSettings,
    factory: EncoderFactory,
}

impl std::fmt::Debug for ChunkedEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedEncoder").field("settings", &self.settings).finish()
    }
}

impl ChunkedEncoder {
    /// Encoder for the configured output format
    pub fn new(settings: EncodeSettings) -> Self {
        let factory = default_factory(settings.format);
        Self { settings, factory }
    }

    /// Encoder with a caller-supplied block encoder
    pub fn with_factory(settings: EncodeSettings, factory: EncoderFactory) -> Self {
        Self { settings, factory }
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    /// Encode `buffer`, reporting progress in [0, 1].
    ///
    /// `on_progress` runs on the calling task. Values are non-decreasing and
    /// the last one on success is exactly 1.0.
    ///
    /// # Errors
    /// - `Cancelled` if `cancel` fires before the worker finishes; no bytes
    ///   are returned
    /// - `Encode` for malformed PCM or a codec failure
    pub async fn encode<F>(&self, buffer: AudioBuffer, mut on_progress: F, cancel: CancellationToken) -> Result<Vec<u8>>
    where
        F: FnMut(f32),
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let channels = buffer.channel_count();
        if !(1..=2).contains(&channels) {
            return Err(Error::Encode(format!(
                "Encoder accepts mono or stereo PCM, got {} channels",
                channels
            )));
        }

        // MP3 output is always stereo
        let buffer = match self.settings.format {
            OutputFormat::Mp3 => buffer.into_stereo(),
            OutputFormat::Wav => buffer,
        };

        let format = StreamFormat {
            channels: buffer.channel_count() as u16,
            sample_rate: buffer.sample_rate(),
            total_frames: buffer.frames(),
            bitrate_kbps: self.settings.bitrate_kbps,
        };
        let block_frames = self.settings.block_frames.max(1);
        let interval = self.settings.progress_interval_blocks.max(1);

        info!(
            format = ?self.settings.format,
            frames = format.total_frames,
            sample_rate = format.sample_rate,
            "Starting encode"
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let factory = Arc::clone(&self.factory);
        let worker_cancel = cancel.clone();

        thread::Builder::new()
            .name("clipmix-encoder".to_string())
            .spawn(move || {
                let result =
                    run_worker(buffer, &format, block_frames, interval, factory.as_ref(), &tx, &worker_cancel);
                // Receiver may already be gone after a cancel
                let _ = tx.send(WorkerMessage::Finished(result));
            })?;

        let mut last_progress = 0.0f32;
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    warn!("Encode cancelled");
                    return Err(Error::Cancelled);
                }

                msg = rx.recv() => match msg {
                    Some(WorkerMessage::Progress(p)) => {
                        if p >= last_progress {
                            last_progress = p;
                            on_progress(p);
                        }
                    }
                    Some(WorkerMessage::Finished(result)) => {
                        if let Ok(bytes) = &result {
                            info!(bytes = bytes.len(), "Encode finished");
                        }
                        return result;
                    }
                    None => {
                        return Err(Error::Encode("Encoder worker exited without a result".to_string()));
                    }
                },
            }
        }
    }
}

/// Encoder factory for an output format
pub fn default_factory(format: OutputFormat) -> EncoderFactory {
    match format {
        OutputFormat::Mp3 => Arc::new(|f: &StreamFormat| {
            Mp3BlockEncoder::new(f).map(|e| Box::new(e) as Box<dyn BlockEncoder>)
        }),
        OutputFormat::Wav => Arc::new(|f: &StreamFormat| {
            WavBlockEncoder::new(f).map(|e| Box::new(e) as Box<dyn BlockEncoder>)
        }),
    }
}

/// Worker thread body
fn run_worker(
    buffer: AudioBuffer,
    format: &StreamFormat,
    block_frames: usize,
    interval: usize,
    factory: &(dyn Fn(&StreamFormat) -> Result<Box<dyn BlockEncoder>> + Send + Sync),
    tx: &mpsc::UnboundedSender<WorkerMessage>,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    let mut encoder = factory(format)?;

    let frames = buffer.frames();
    let total_blocks = frames.div_ceil(block_frames);
    let mut out = Vec::new();
    let mut pcm = Vec::with_capacity(block_frames * format.channels as usize);

    debug!(total_blocks, block_frames, "Encoder worker started");

    for block in 0..total_blocks {
        if cancel.is_cancelled() {
            debug!(block, "Encoder worker observed cancellation");
            return Err(Error::Cancelled);
        }

        pcm.clear();
        let start = block * block_frames;
        interleave_block(&buffer, start, start + block_frames, &mut pcm);
        encoder.encode_block(&pcm, &mut out)?;

        let done = block + 1;
        if done % interval == 0 && done < total_blocks {
            let _ = tx.send(WorkerMessage::Progress(done as f32 / total_blocks as f32));
        }
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    encoder.finish(&mut out)?;
    let _ = tx.send(WorkerMessage::Progress(1.0));

    Ok(out)
}

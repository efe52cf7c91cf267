//! Audio decoder using symphonia
//!
//! Decodes an in-memory compressed clip (MP3, FLAC, AAC, Vorbis, WAV) to
//! planar f32 PCM at the source's native rate and channel count. No
//! resampling or channel mapping happens here; the renderer does both.

use crate::audio::types::AudioBuffer;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::{AudioBuffer as SymphoniaBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

/// Stateless decoder for opaque compressed-audio blobs.
pub struct SampleDecoder;

impl SampleDecoder {
    /// Decode an entire blob to planar PCM.
    ///
    /// The container is self-describing, so no file name or extension hint
    /// is needed. Packets that fail to decode are skipped with a warning; a
    /// stream that yields no audio at all is rejected.
    ///
    /// # Errors
    /// - Empty input
    /// - Unrecognized container or codec
    /// - No decodable audio track, or zero frames decoded
    pub fn decode(bytes: &[u8]) -> Result<AudioBuffer> {
        Self::decode_with_hint(bytes, None)
    }

    /// Decode with an optional file-extension hint (e.g. "mp3") to speed up
    /// probing of containers without a strong magic number.
    pub fn decode_with_hint(bytes: &[u8], extension: Option<&str>) -> Result<AudioBuffer> {
        if bytes.is_empty() {
            return Err(Error::Decode("Input is empty".to_string()));
        }

        debug!(bytes = bytes.len(), "Decoding clip");

        let source = Cursor::new(bytes.to_vec());
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        // Get the default audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut sample_rate = codec_params.sample_rate;
        let mut channel_count = codec_params.channels.map(|c| c.count());

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut channels: Vec<Vec<f32>> = Vec::new();
        let mut skipped_packets = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    // End of stream
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = decoded.spec();
                    if sample_rate.is_none() {
                        sample_rate = Some(spec.rate);
                    }
                    let count = *channel_count.get_or_insert(spec.channels.count());
                    if channels.is_empty() {
                        channels = vec![Vec::new(); count];
                    }
                    append_planar(&decoded, &mut channels);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    skipped_packets += 1;
                    warn!("Decode error: {}", e);
                    continue;
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Decoder failed: {}", e)));
                }
            }
        }

        let sample_rate = sample_rate.ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        if channels.first().map_or(true, Vec::is_empty) {
            return Err(Error::Decode("Stream contains no decodable audio".to_string()));
        }

        // Some codecs emit a short trailing packet on one channel only; keep
        // channels aligned to the shortest.
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for ch in channels.iter_mut() {
            ch.truncate(frames);
        }

        debug!(
            sample_rate,
            channels = channels.len(),
            frames,
            skipped_packets,
            "Decoded clip"
        );

        AudioBuffer::new(sample_rate, channels)
            .map_err(|e| Error::Decode(format!("Decoded stream is inconsistent: {}", e)))
    }
}

/// Append one decoded packet to the planar accumulators, converting any
/// sample format to f32.
fn append_planar(decoded: &AudioBufferRef<'_>, channels: &mut [Vec<f32>]) {
    match decoded {
        AudioBufferRef::U8(buf) => extend_channels(&**buf, channels),
        AudioBufferRef::U16(buf) => extend_channels(&**buf, channels),
        AudioBufferRef::U24(buf) => extend_channels(&**buf, channels),
        AudioBufferRef::U32(buf) => extend_channels(&**buf, channels),
        AudioBufferRef::S8(buf) => extend_channels(&**buf, channels),
        AudioBufferRef::S16(buf) => extend_channels(&**buf, channels),
        AudioBufferRef::S24(buf) => extend_channels(&**buf, channels),
        AudioBufferRef::S32(buf) => extend_channels(&**buf, channels),
        AudioBufferRef::F32(buf) => extend_channels(&**buf, channels),
        AudioBufferRef::F64(buf) => extend_channels(&**buf, channels),
    }
}

fn extend_channels<S>(buf: &SymphoniaBuffer<S>, channels: &mut [Vec<f32>])
where
    S: Sample + IntoSample<f32>,
{
    let available = buf.spec().channels.count();
    for (idx, dest) in channels.iter_mut().enumerate() {
        // A packet with fewer channels than the stream header is padded with
        // its last channel rather than dropped
        let src = idx.min(available.saturating_sub(1));
        dest.extend(buf.chan(src).iter().map(|&s| s.into_sample()));
    }
}

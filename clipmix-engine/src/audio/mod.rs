//! Audio primitives: buffer type, decoding, resampling, PCM and WAV output

pub mod decoder;
pub mod pcm;
pub mod resampler;
pub mod types;
pub mod wav;

pub use decoder::SampleDecoder;
pub use resampler::Resampler;
pub use types::AudioBuffer;
pub use wav::encode_wav;

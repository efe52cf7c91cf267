//! Test helper modules for clipmix-engine integration tests
//!
//! Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

pub mod audio_generator;
pub mod slow_encoder;

pub use audio_generator::{constant_wav, silent_wav, sine_wav, split_stereo_wav, TEST_SAMPLE_RATE};
pub use slow_encoder::slow_factory;

use clipmix_engine::Playlist;

/// Playlist of in-memory clips named `clip0.wav`, `clip1.wav`, ...
pub fn playlist_of(blobs: Vec<Vec<u8>>) -> Playlist {
    let mut playlist = Playlist::new();
    for (i, bytes) in blobs.into_iter().enumerate() {
        playlist.add(format!("clip{}.wav", i), bytes);
    }
    playlist
}

//! Composite-to-bitstream encoding

pub mod block;
pub mod worker;

pub use block::{BlockEncoder, Mp3BlockEncoder, StreamFormat, WavBlockEncoder};
pub use worker::{default_factory, ChunkedEncoder, EncoderFactory};

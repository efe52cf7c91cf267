//! Block encoder stand-in for cancellation tests
//!
//! Sleeps on every block so a test has time to cancel mid-encode, and
//! counts the blocks it actually processed.

use clipmix_engine::encode::{BlockEncoder, EncoderFactory, StreamFormat};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct SlowEncoder {
    blocks: Arc<AtomicUsize>,
    delay: Duration,
}

impl BlockEncoder for SlowEncoder {
    fn encode_block(&mut self, pcm: &[i16], out: &mut Vec<u8>) -> clipmix_engine::Result<()> {
        std::thread::sleep(self.delay);
        self.blocks.fetch_add(1, Ordering::SeqCst);
        out.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
        Ok(())
    }

    fn finish(&mut self, _out: &mut Vec<u8>) -> clipmix_engine::Result<()> {
        Ok(())
    }
}

/// Factory producing `SlowEncoder`s that share one block counter
pub fn slow_factory(blocks: Arc<AtomicUsize>, delay: Duration) -> EncoderFactory {
    Arc::new(move |_: &StreamFormat| {
        Ok(Box::new(SlowEncoder {
            blocks: Arc::clone(&blocks),
            delay,
        }) as Box<dyn BlockEncoder>)
    })
}

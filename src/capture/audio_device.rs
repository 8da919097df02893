use std::{
    sync::mpsc::Sender,
    thread,
    time::{Duration, Instant},
};

use crate::{capture::capture_error::CaptureError, config::AudioConfig};

/// Microphone side: yields one fixed-size chunk of raw PCM per call.
pub trait AudioInput: Send {
    fn read_chunk(&mut self) -> Result<Vec<u8>, CaptureError>;
    fn release(&mut self);
}

/// Speaker side: plays chunks in the order they are written.
pub trait AudioOutput: Send {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), CaptureError>;
    fn release(&mut self);
}

/// Repeats one chunk at real-time pace. `silence` stands in for a muted or
/// absent microphone.
pub struct FixedChunkInput {
    chunk: Vec<u8>,
    pace: Duration,
    next_deadline: Instant,
    released: bool,
}

impl FixedChunkInput {
    #[must_use]
    pub fn new(chunk: Vec<u8>, pace: Duration) -> Self {
        Self {
            chunk,
            pace,
            next_deadline: Instant::now(),
            released: false,
        }
    }

    #[must_use]
    pub fn silence(cfg: &AudioConfig) -> Self {
        Self::new(vec![0; cfg.chunk_bytes()], cfg.chunk_duration())
    }
}

impl AudioInput for FixedChunkInput {
    fn read_chunk(&mut self) -> Result<Vec<u8>, CaptureError> {
        if self.released {
            return Err(CaptureError::DeviceClosed);
        }
        let now = Instant::now();
        if now < self.next_deadline {
            thread::sleep(self.next_deadline - now);
            self.next_deadline += self.pace;
        } else {
            self.next_deadline = now + self.pace;
        }
        Ok(self.chunk.clone())
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullOutput {
    released: bool,
}

impl AudioOutput for NullOutput {
    fn write_chunk(&mut self, _chunk: &[u8]) -> Result<(), CaptureError> {
        if self.released {
            return Err(CaptureError::DeviceClosed);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Hands every played chunk to a channel, in arrival order.
pub struct ChannelOutput {
    tx: Option<Sender<Vec<u8>>>,
}

impl ChannelOutput {
    #[must_use]
    pub fn new(tx: Sender<Vec<u8>>) -> Self {
        Self { tx: Some(tx) }
    }
}

impl AudioOutput for ChannelOutput {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), CaptureError> {
        match &self.tx {
            Some(tx) => tx
                .send(chunk.to_vec())
                .map_err(|_| CaptureError::DeviceClosed),
            None => Err(CaptureError::DeviceClosed),
        }
    }

    fn release(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn silence_matches_configured_chunk_size() {
        let cfg = AudioConfig::default();
        let mut input = FixedChunkInput::silence(&cfg);
        let chunk = input.read_chunk().unwrap();
        assert_eq!(chunk.len(), cfg.chunk_bytes());
        assert!(chunk.iter().all(|b| *b == 0));
    }

    #[test]
    fn channel_output_preserves_order_and_closes() {
        let (tx, rx) = mpsc::channel();
        let mut out = ChannelOutput::new(tx);
        out.write_chunk(&[1, 2]).unwrap();
        out.write_chunk(&[3]).unwrap();
        assert_eq!(rx.recv().unwrap(), vec![1, 2]);
        assert_eq!(rx.recv().unwrap(), vec![3]);

        out.release();
        assert!(matches!(out.write_chunk(&[4]), Err(CaptureError::DeviceClosed)));
    }
}

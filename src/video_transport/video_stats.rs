use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the video loops and whoever displays them.
#[derive(Debug, Default)]
pub struct VideoStats {
    frames_sent: AtomicU64,
    chunks_sent: AtomicU64,
    encode_failures: AtomicU64,
    frames_delivered: AtomicU64,
    decode_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoStatsSnapshot {
    pub frames_sent: u64,
    pub chunks_sent: u64,
    pub encode_failures: u64,
    pub frames_delivered: u64,
    pub decode_failures: u64,
}

impl VideoStats {
    pub(crate) fn frame_sent(&self, chunks: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.chunks_sent.fetch_add(chunks, Ordering::Relaxed);
    }

    pub(crate) fn encode_failed(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_delivered(&self) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn decode_failed(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> VideoStatsSnapshot {
        VideoStatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }
}

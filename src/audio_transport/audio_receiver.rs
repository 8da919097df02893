use std::{
    io,
    net::UdpSocket,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    capture::audio_device::AudioOutput,
    log::log_sink::LogSink,
    media::audio_codec::AudioCodec,
    sink_debug, sink_info,
    video_transport::transport_error::TransportError,
};

/// Plays every datagram in arrival order. No jitter buffer, no resequencing.
pub struct AudioReceiver {
    socket: UdpSocket,
    output: Box<dyn AudioOutput>,
    codec: Arc<dyn AudioCodec>,
    chunk_bytes: usize,
    played: Arc<AtomicU64>,
    logger: Arc<dyn LogSink>,
}

impl AudioReceiver {
    /// `socket` must already carry a read timeout; `chunk_bytes` sizes the
    /// receive buffer to exactly one chunk.
    #[must_use]
    pub fn new(
        socket: UdpSocket,
        output: Box<dyn AudioOutput>,
        codec: Arc<dyn AudioCodec>,
        chunk_bytes: usize,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            socket,
            output,
            codec,
            chunk_bytes: chunk_bytes.max(1),
            played: Arc::new(AtomicU64::new(0)),
            logger,
        }
    }

    #[must_use]
    pub fn played_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.played)
    }

    /// Runs the loop on a thread named `audio-rx`.
    pub fn spawn(self, running: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("audio-rx".into())
            .spawn(move || self.run(&running))
    }

    pub fn run(mut self, running: &AtomicBool) {
        sink_info!(
            self.logger,
            "[audio-rx] listening on {:?}",
            self.socket.local_addr().ok()
        );
        let mut buf = vec![0u8; self.chunk_bytes];

        while running.load(Ordering::SeqCst) {
            let n = match self.socket.recv_from(&mut buf) {
                Ok((n, _src)) => n,
                Err(e) if TransportError::is_timeout(&e) => continue,
                Err(e) => {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    sink_debug!(self.logger, "[audio-rx] recv error: {e}");
                    thread::sleep(Duration::from_millis(10));
                    continue;
                }
            };

            let pcm = self.codec.decode(&buf[..n]);
            match self.output.write_chunk(&pcm) {
                Ok(()) => {
                    self.played.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => sink_debug!(self.logger, "[audio-rx] chunk dropped: {e}"),
            }
        }

        self.output.release();
        sink_info!(self.logger, "[audio-rx] stopped");
    }
}

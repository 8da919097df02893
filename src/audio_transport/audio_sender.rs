use std::{
    io,
    net::{SocketAddr, UdpSocket},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    capture::{audio_device::AudioInput, capture_error::CaptureError},
    log::log_sink::LogSink,
    media::audio_codec::AudioCodec,
    sink_debug, sink_info, sink_warn,
};

/// Microphone chunk in, one datagram out. No fragmentation: a chunk always
/// fits a datagram.
pub struct AudioSender {
    socket: UdpSocket,
    dest: SocketAddr,
    input: Box<dyn AudioInput>,
    codec: Arc<dyn AudioCodec>,
    pacing: Duration,
    sent: Arc<AtomicU64>,
    logger: Arc<dyn LogSink>,
}

impl AudioSender {
    #[must_use]
    pub fn new(
        socket: UdpSocket,
        dest: SocketAddr,
        input: Box<dyn AudioInput>,
        codec: Arc<dyn AudioCodec>,
        pacing: Duration,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            socket,
            dest,
            input,
            codec,
            pacing,
            sent: Arc::new(AtomicU64::new(0)),
            logger,
        }
    }

    /// Datagram counter, readable while the loop runs.
    #[must_use]
    pub fn sent_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.sent)
    }

    /// Runs the loop on a thread named `audio-tx`.
    pub fn spawn(self, running: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("audio-tx".into())
            .spawn(move || self.run(&running))
    }

    pub fn run(mut self, running: &AtomicBool) {
        sink_info!(self.logger, "[audio-tx] sending to {}", self.dest);

        while running.load(Ordering::SeqCst) {
            let chunk = match self.input.read_chunk() {
                Ok(c) => c,
                Err(e) if e.is_transient() => continue,
                Err(CaptureError::DeviceClosed) if !running.load(Ordering::SeqCst) => break,
                Err(e) => {
                    sink_warn!(self.logger, "[audio-tx] microphone stopped: {e}");
                    break;
                }
            };

            let wire = self.codec.encode(&chunk);
            match self.socket.send_to(&wire, self.dest) {
                Ok(_) => {
                    self.sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    sink_debug!(self.logger, "[audio-tx] send failed: {e}");
                }
            }

            thread::sleep(self.pacing);
        }

        self.input.release();
        sink_info!(self.logger, "[audio-tx] stopped");
    }
}

use std::{
    io,
    net::{SocketAddr, UdpSocket},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use crate::{
    capture::{capture_error::CaptureError, frame_source::FrameSource},
    config::{VideoConfig, WireFormat},
    log::log_sink::LogSink,
    media::video_codec::VideoCodec,
    sink_debug, sink_info, sink_trace, sink_warn,
    video_transport::{
        chunking::chunk_frame, sequenced, transport_error::TransportError,
        video_stats::VideoStats,
    },
};

/// Capture, encode, chunk, send; once per frame until the flag drops.
pub struct VideoSender {
    socket: UdpSocket,
    dest: SocketAddr,
    source: Box<dyn FrameSource>,
    codec: Arc<dyn VideoCodec>,
    cfg: VideoConfig,
    stats: Arc<VideoStats>,
    logger: Arc<dyn LogSink>,
    next_frame_id: u32,
}

impl VideoSender {
    #[must_use]
    pub fn new(
        socket: UdpSocket,
        dest: SocketAddr,
        source: Box<dyn FrameSource>,
        codec: Arc<dyn VideoCodec>,
        cfg: VideoConfig,
        stats: Arc<VideoStats>,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            socket,
            dest,
            source,
            codec,
            cfg,
            stats,
            logger,
            next_frame_id: rand::random(),
        }
    }

    /// Runs the loop on a thread named `video-tx`.
    pub fn spawn(self, running: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("video-tx".into())
            .spawn(move || self.run(&running))
    }

    /// Blocks until `running` is cleared or the camera goes away. Releases
    /// the camera and closes the socket on return.
    pub fn run(mut self, running: &AtomicBool) {
        sink_info!(
            self.logger,
            "[video-tx] sending to {} ({:?}, M={})",
            self.dest,
            self.cfg.wire_format,
            self.cfg.max_datagram
        );

        while running.load(Ordering::SeqCst) {
            let frame = match self.source.next_frame() {
                Ok(f) => f,
                Err(e) if e.is_transient() => continue,
                Err(CaptureError::DeviceClosed) if !running.load(Ordering::SeqCst) => break,
                Err(e) => {
                    sink_warn!(self.logger, "[video-tx] capture stopped: {e}");
                    break;
                }
            };

            let Some(encoded) = self.codec.encode(&frame) else {
                self.stats.encode_failed();
                sink_debug!(self.logger, "[video-tx] encode failed, frame skipped");
                continue;
            };
            if encoded.is_empty() {
                continue;
            }

            match self.send_frame(&encoded) {
                Ok(chunks) => {
                    self.stats.frame_sent(chunks);
                    sink_trace!(
                        self.logger,
                        "[video-tx] frame {} bytes in {chunks} chunks",
                        encoded.len()
                    );
                }
                Err(e) => {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    sink_debug!(self.logger, "[video-tx] frame dropped: {e}");
                }
            }

            thread::sleep(self.cfg.frame_pacing);
        }

        self.source.release();
        sink_info!(self.logger, "[video-tx] stopped");
    }

    fn send_frame(&mut self, encoded: &[u8]) -> Result<u64, TransportError> {
        let mut chunks = 0u64;
        match self.cfg.wire_format {
            WireFormat::Legacy => {
                for chunk in chunk_frame(encoded, self.cfg.max_datagram) {
                    self.socket.send_to(chunk, self.dest)?;
                    chunks += 1;
                }
            }
            WireFormat::Sequenced => {
                let frame_id = self.next_frame_id;
                self.next_frame_id = self.next_frame_id.wrapping_add(1);
                for dgram in sequenced::fragment(frame_id, encoded, self.cfg.max_datagram)? {
                    self.socket.send_to(&dgram, self.dest)?;
                    chunks += 1;
                }
            }
        }
        Ok(chunks)
    }
}

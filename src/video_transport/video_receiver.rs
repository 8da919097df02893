use std::{
    io,
    net::{SocketAddr, UdpSocket},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    config::{VideoConfig, WireFormat},
    log::log_sink::LogSink,
    media::{video_codec::VideoCodec, video_frame::VideoFrame},
    sink_debug, sink_info, sink_warn,
    video_transport::{
        chunking::FrameReassembler, sequenced::SequencedReassembler,
        transport_error::TransportError, video_stats::VideoStats,
    },
};

/// Consumer of decoded remote frames, called on the receiver thread.
pub type FrameSink = Box<dyn FnMut(SocketAddr, VideoFrame) + Send>;

/// Reassembly state for whichever wire format the call uses.
#[derive(Debug)]
pub enum Reassembly {
    Legacy(FrameReassembler),
    Sequenced(SequencedReassembler),
}

impl Reassembly {
    #[must_use]
    pub fn for_config(cfg: &VideoConfig) -> Self {
        match cfg.wire_format {
            WireFormat::Legacy => Self::Legacy(FrameReassembler::new(cfg.max_datagram)),
            WireFormat::Sequenced => Self::Sequenced(SequencedReassembler::new()),
        }
    }

    pub fn push(&mut self, src: SocketAddr, datagram: &[u8]) -> Option<Vec<u8>> {
        match self {
            Self::Legacy(r) => r.push(src, datagram),
            Self::Sequenced(r) => r.push(src, datagram),
        }
    }
}

/// Receives chunks from any sender on the bound port, rebuilds frames per
/// source address and hands every decodable one to the sink.
pub struct VideoReceiver {
    socket: UdpSocket,
    codec: Arc<dyn VideoCodec>,
    reassembly: Reassembly,
    max_datagram: usize,
    sink: FrameSink,
    stats: Arc<VideoStats>,
    logger: Arc<dyn LogSink>,
}

impl VideoReceiver {
    /// `socket` must already carry a read timeout.
    #[must_use]
    pub fn new(
        socket: UdpSocket,
        codec: Arc<dyn VideoCodec>,
        cfg: &VideoConfig,
        sink: FrameSink,
        stats: Arc<VideoStats>,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            socket,
            codec,
            reassembly: Reassembly::for_config(cfg),
            max_datagram: cfg.max_datagram,
            sink,
            stats,
            logger,
        }
    }

    /// Runs the loop on a thread named `video-rx`.
    pub fn spawn(self, running: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("video-rx".into())
            .spawn(move || self.run(&running))
    }

    pub fn run(mut self, running: &AtomicBool) {
        sink_info!(
            self.logger,
            "[video-rx] listening on {:?}",
            self.socket.local_addr().ok()
        );
        let mut buf = vec![0u8; self.max_datagram];

        while running.load(Ordering::SeqCst) {
            let (n, src) = match self.socket.recv_from(&mut buf) {
                Ok(r) => r,
                Err(e) if TransportError::is_timeout(&e) => continue,
                Err(e) => {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    // ICMP unreachable and similar; the socket is still usable.
                    sink_debug!(self.logger, "[video-rx] recv error: {e}");
                    thread::sleep(Duration::from_millis(10));
                    continue;
                }
            };

            let Some(encoded) = self.reassembly.push(src, &buf[..n]) else {
                continue;
            };

            match self.codec.decode(&encoded) {
                Some(frame) => {
                    self.stats.frame_delivered();
                    (self.sink)(src, frame);
                }
                None => {
                    self.stats.decode_failed();
                    sink_warn!(
                        self.logger,
                        "[video-rx] dropped undecodable frame of {} bytes from {src}",
                        encoded.len()
                    );
                }
            }
        }

        sink_info!(self.logger, "[video-rx] stopped");
    }
}

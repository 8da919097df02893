//! Video over UDP: chunking, per-sender reassembly, and the two loops.
pub mod chunking;
pub mod sequenced;
pub mod transport_error;
pub mod udp;
pub mod video_receiver;
pub mod video_sender;
pub mod video_stats;

pub use chunking::{FrameReassembler, chunk_frame};
pub use sequenced::SequencedReassembler;
pub use transport_error::TransportError;
pub use video_receiver::{FrameSink, VideoReceiver};
pub use video_sender::VideoSender;
pub use video_stats::{VideoStats, VideoStatsSnapshot};

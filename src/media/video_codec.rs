use crate::media::video_frame::VideoFrame;

/// Compression boundary for video.
///
/// Both directions are total: a frame that cannot be encoded, or bytes that do
/// not decode, yield `None` and the caller drops that unit.
pub trait VideoCodec: Send + Sync {
    fn encode(&self, frame: &VideoFrame) -> Option<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Option<VideoFrame>;
}

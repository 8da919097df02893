//! Raw media types and the codec boundary the transports call into.
pub mod audio_codec;
pub mod codec_error;
pub mod jpeg_codec;
pub mod pcm;
pub mod utils;
pub mod video_codec;
pub mod video_frame;

pub use audio_codec::{AudioCodec, PassthroughAudioCodec};
pub use codec_error::CodecError;
pub use jpeg_codec::JpegCodec;
pub use video_codec::VideoCodec;
pub use video_frame::VideoFrame;

//! Frame and audio sources/sinks the media loops pull from and push to.
//!
//! Real hardware lives behind the `camera` (OpenCV) and `audio-device`
//! (CPAL) features; the synthetic and in-memory devices are always built.
pub mod audio_device;
#[cfg(feature = "camera")]
pub mod camera_source;
pub mod capture_error;
#[cfg(feature = "audio-device")]
pub mod cpal_audio;
pub mod frame_source;
pub mod media_devices;

pub use audio_device::{AudioInput, AudioOutput, ChannelOutput, FixedChunkInput, NullOutput};
pub use capture_error::CaptureError;
pub use frame_source::{FrameSource, SyntheticSource};
pub use media_devices::MediaDevices;

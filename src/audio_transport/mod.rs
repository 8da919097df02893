//! Audio over UDP: one fixed-size chunk per datagram, both directions.
pub mod audio_receiver;
pub mod audio_sender;

pub use audio_receiver::AudioReceiver;
pub use audio_sender::AudioSender;

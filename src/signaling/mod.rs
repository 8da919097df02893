//! Call setup, chat and teardown over one TCP connection per call.
pub mod call_state;
pub mod channel;
pub mod decoder;
pub mod dialer;
pub mod listener;
pub mod message;
pub mod signaling_error;

pub use call_state::{CallState, CallStateCell};
pub use channel::SignalingChannel;
pub use decoder::MessageDecoder;
pub use dialer::dial;
pub use listener::{IncomingCall, IncomingCallHandler, PendingCalls, SignalingListener};
pub use message::SignalingMessage;
pub use signaling_error::SignalingError;

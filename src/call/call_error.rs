use std::net::IpAddr;

use thiserror::Error;

use crate::signaling::signaling_error::SignalingError;

#[derive(Debug, Error)]
pub enum CallError {
    /// A port could not be bound or a device could not be opened; the call
    /// never reached ACTIVE.
    #[error("call setup failed: {0}")]
    Setup(String),
    #[error("call declined")]
    Declined,
    /// The callee wanted the call but could not set it up.
    #[error("peer could not take the call: {0}")]
    Refused(String),
    #[error("no response from peer")]
    NoResponse,
    #[error("unexpected response {0:?}")]
    UnexpectedResponse(String),
    #[error("already in a call with {0}")]
    AlreadyInCall(IpAddr),
    #[error("no active call")]
    NotActive,
    #[error("no pending call from {0}")]
    NoPendingCall(IpAddr),
    #[error(transparent)]
    Signaling(#[from] SignalingError),
}

pub type Result<T> = std::result::Result<T, CallError>;

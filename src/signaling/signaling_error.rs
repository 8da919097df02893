use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("signaling i/o: {0}")]
    Io(#[from] io::Error),
    #[error("malformed signaling message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("no response within {0:?}")]
    Timeout(std::time::Duration),
    #[error("signaling channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, SignalingError>;

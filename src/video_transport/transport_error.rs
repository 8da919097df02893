use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind udp port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("datagram too short: got {got} bytes, header needs {expected}")]
    Truncated { expected: usize, got: usize },
    #[error("header announces {announced} payload bytes, datagram carries {actual}")]
    LengthMismatch { announced: usize, actual: usize },
    #[error("frame of {len} bytes needs more than {max_chunks} chunks")]
    FrameTooLarge { len: usize, max_chunks: usize },
}

pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Read timeouts the receive loops simply retry.
    #[must_use]
    pub fn is_timeout(err: &io::Error) -> bool {
        matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
        )
    }
}

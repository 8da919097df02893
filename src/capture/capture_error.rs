use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device could not be opened; fatal for session start.
    #[error("failed to open {device}: {reason}")]
    Open { device: String, reason: String },
    /// The device is up but produced nothing this time; skip and retry.
    #[error("no frame available")]
    NoFrame,
    /// The device was released or its peer end went away.
    #[error("device closed")]
    DeviceClosed,
    #[error("device error: {0}")]
    Device(String),
}

impl CaptureError {
    /// Whether the loop reading this device should keep going.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::NoFrame)
    }
}

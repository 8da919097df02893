use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame buffer is {actual} bytes, expected {expected} for {width}x{height} RGB")]
    BadFrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("jpeg: {0}")]
    Jpeg(#[from] image::ImageError),
}

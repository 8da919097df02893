use image::{ExtendedColorType, ImageFormat, codecs::jpeg::JpegEncoder};

use crate::media::{codec_error::CodecError, video_codec::VideoCodec, video_frame::VideoFrame};

/// JPEG still-image compression per frame.
#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    quality: u8,
}

impl JpegCodec {
    #[must_use]
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    #[must_use]
    pub const fn quality(&self) -> u8 {
        self.quality
    }

    pub fn try_encode(&self, frame: &VideoFrame) -> Result<Vec<u8>, CodecError> {
        if !frame.is_well_formed() {
            return Err(CodecError::BadFrameSize {
                width: frame.width,
                height: frame.height,
                expected: VideoFrame::expected_len(frame.width, frame.height),
                actual: frame.bytes.len(),
            });
        }
        let mut out = Vec::with_capacity(frame.bytes.len() / 8);
        let mut encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
        encoder.encode(
            frame.bytes.as_slice(),
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(out)
    }

    pub fn try_decode(&self, bytes: &[u8]) -> Result<VideoFrame, CodecError> {
        let rgb = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(VideoFrame::new(width, height, rgb.into_raw()))
    }
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self::new(80)
    }
}

impl VideoCodec for JpegCodec {
    fn encode(&self, frame: &VideoFrame) -> Option<Vec<u8>> {
        self.try_encode(frame).ok()
    }

    fn decode(&self, bytes: &[u8]) -> Option<VideoFrame> {
        self.try_decode(bytes).ok()
    }
}

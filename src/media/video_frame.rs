use std::sync::Arc;

use crate::media::utils::now_millis;

/// One raw video frame, tightly packed RGB8.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: u128,
    pub bytes: Arc<Vec<u8>>,
}

impl VideoFrame {
    #[must_use]
    pub fn new(width: u32, height: u32, bytes: Vec<u8>) -> Self {
        Self {
            width,
            height,
            timestamp_ms: now_millis(),
            bytes: Arc::new(bytes),
        }
    }

    /// Byte length an RGB frame of this size must have.
    #[must_use]
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.bytes.len() == Self::expected_len(self.width, self.height)
    }

    /// Moving XOR test pattern; `tick` shifts it between frames.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn synthetic(width: u32, height: u32, tick: u8) -> Self {
        let mut data = Vec::with_capacity(Self::expected_len(width, height));
        for y in 0..height {
            for x in 0..width {
                data.push(x as u8 ^ tick);
                data.push(y as u8 ^ tick);
                data.push(x.wrapping_add(y) as u8 ^ tick);
            }
        }
        Self::new(width, height, data)
    }

    /// Single-colour frame. JPEG reproduces these almost exactly, which makes
    /// them the reference input for codec round trips.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let data = rgb.iter().copied().cycle().take(pixels * 3).collect();
        Self::new(width, height, data)
    }
}

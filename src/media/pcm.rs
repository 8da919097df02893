//! i16 PCM <-> wire bytes (native little-endian layout, as captured).

/// Reinterprets samples as bytes without copying.
#[must_use]
pub fn samples_as_bytes(samples: &[i16]) -> &[u8] {
    bytemuck::cast_slice(samples)
}

/// Copies wire bytes into samples. A trailing odd byte is ignored.
#[must_use]
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_ne_bytes([b[0], b[1]]))
        .collect()
}

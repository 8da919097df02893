/// Transmission boundary for audio chunks.
pub trait AudioCodec: Send + Sync {
    fn encode(&self, chunk: &[u8]) -> Vec<u8>;
    fn decode(&self, bytes: &[u8]) -> Vec<u8>;
}

/// Raw PCM goes on the wire unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughAudioCodec;

impl AudioCodec for PassthroughAudioCodec {
    #[inline]
    fn encode(&self, chunk: &[u8]) -> Vec<u8> {
        chunk.to_vec()
    }

    #[inline]
    fn decode(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn passthrough_is_exact_for_arbitrary_chunks() {
        let codec = PassthroughAudioCodec;
        let mut rng = rand::thread_rng();
        for len in [0usize, 1, 2047, 2048] {
            let mut chunk = vec![0u8; len];
            rng.fill_bytes(&mut chunk);
            assert_eq!(codec.decode(&codec.encode(&chunk)), chunk);
        }
    }
}

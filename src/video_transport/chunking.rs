use std::{collections::HashMap, net::SocketAddr};

use bytes::BytesMut;

/// A sender that never emits a short chunk cannot grow its buffer past this.
pub const MAX_PENDING_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Cuts an encoded frame into consecutive chunks of at most `max_datagram`
/// bytes: `ceil(len / max_datagram)` of them, none for an empty frame.
pub fn chunk_frame(encoded: &[u8], max_datagram: usize) -> impl Iterator<Item = &[u8]> {
    encoded.chunks(max_datagram.max(1))
}

/// Per-sender reassembly for the legacy wire format, where chunks carry no
/// header and a chunk shorter than the datagram limit closes the frame.
///
/// A frame whose size is an exact multiple of the limit is never closed on
/// its own; its bytes stay buffered and are delivered glued to the front of
/// the next frame. That is inherent to the format.
#[derive(Debug)]
pub struct FrameReassembler {
    max_datagram: usize,
    buffers: HashMap<SocketAddr, BytesMut>,
    overflowed: u64,
}

impl FrameReassembler {
    #[must_use]
    pub fn new(max_datagram: usize) -> Self {
        Self {
            max_datagram,
            buffers: HashMap::new(),
            overflowed: 0,
        }
    }

    /// Appends `chunk` to the buffer of `src`. Returns the whole frame when
    /// the chunk is shorter than the limit; the buffer is removed then.
    pub fn push(&mut self, src: SocketAddr, chunk: &[u8]) -> Option<Vec<u8>> {
        let buf = self.buffers.entry(src).or_default();
        buf.extend_from_slice(chunk);

        if chunk.len() < self.max_datagram {
            let frame = self.buffers.remove(&src)?;
            return (!frame.is_empty()).then(|| frame.to_vec());
        }

        if buf.len() > MAX_PENDING_FRAME_BYTES {
            self.buffers.remove(&src);
            self.overflowed += 1;
        }
        None
    }

    /// Bytes held for `src` awaiting a closing chunk.
    #[must_use]
    pub fn pending_len(&self, src: &SocketAddr) -> usize {
        self.buffers.get(src).map_or(0, BytesMut::len)
    }

    /// Senders with a partially received frame.
    #[must_use]
    pub fn pending_senders(&self) -> usize {
        self.buffers.len()
    }

    /// Buffers discarded for exceeding [`MAX_PENDING_FRAME_BYTES`].
    #[must_use]
    pub const fn overflowed(&self) -> u64 {
        self.overflowed
    }
}

//! Sequenced wire format: every chunk carries the frame it belongs to.
//!
//! ```text
//! [frame_id u32 BE][index u16 BE][count u16 BE][payload_len u32 BE][payload]
//! ```
//!
//! Reassembly is unambiguous whatever the frame size, and survives
//! reordering, duplicates and loss (an incomplete frame is dropped when a
//! newer one starts).

use std::{collections::HashMap, io::Cursor, net::SocketAddr};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::video_transport::transport_error::{Result, TransportError};

pub const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub frame_id: u32,
    pub index: u16,
    pub count: u16,
    pub payload_len: u32,
}

impl ChunkHeader {
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_u32::<BigEndian>(self.frame_id)?;
        out.write_u16::<BigEndian>(self.index)?;
        out.write_u16::<BigEndian>(self.count)?;
        out.write_u32::<BigEndian>(self.payload_len)?;
        Ok(())
    }

    /// Splits a datagram into header and payload, checking the announced
    /// payload length against what actually arrived.
    pub fn parse(datagram: &[u8]) -> Result<(Self, &[u8])> {
        if datagram.len() < HEADER_LEN {
            return Err(TransportError::Truncated {
                expected: HEADER_LEN,
                got: datagram.len(),
            });
        }
        let mut rd = Cursor::new(&datagram[..HEADER_LEN]);
        let header = Self {
            frame_id: rd.read_u32::<BigEndian>()?,
            index: rd.read_u16::<BigEndian>()?,
            count: rd.read_u16::<BigEndian>()?,
            payload_len: rd.read_u32::<BigEndian>()?,
        };
        let payload = &datagram[HEADER_LEN..];
        if header.payload_len as usize != payload.len() {
            return Err(TransportError::LengthMismatch {
                announced: header.payload_len as usize,
                actual: payload.len(),
            });
        }
        Ok((header, payload))
    }
}

/// Whether `a` comes after `b` in serial-number order, so ids keep working
/// across the u32 wrap.
#[must_use]
pub const fn is_newer(a: u32, b: u32) -> bool {
    a != b && a.wrapping_sub(b) < 0x8000_0000
}

/// Builds the datagrams for one frame. Each is at most `max_datagram` bytes.
pub fn fragment(frame_id: u32, encoded: &[u8], max_datagram: usize) -> Result<Vec<Vec<u8>>> {
    let per_chunk = max_datagram.saturating_sub(HEADER_LEN).max(1);
    let count = encoded.len().div_ceil(per_chunk);
    let count = u16::try_from(count).map_err(|_| TransportError::FrameTooLarge {
        len: encoded.len(),
        max_chunks: usize::from(u16::MAX),
    })?;

    let mut out = Vec::with_capacity(usize::from(count));
    for (index, payload) in (0..count).zip(encoded.chunks(per_chunk)) {
        let mut dgram = Vec::with_capacity(HEADER_LEN + payload.len());
        ChunkHeader {
            frame_id,
            index,
            count,
            payload_len: u32::try_from(payload.len()).unwrap_or(u32::MAX),
        }
        .write_to(&mut dgram)?;
        dgram.extend_from_slice(payload);
        out.push(dgram);
    }
    Ok(out)
}

#[derive(Debug)]
struct PartialFrame {
    frame_id: u32,
    parts: Vec<Option<Vec<u8>>>,
    received: usize,
}

impl PartialFrame {
    fn new(frame_id: u32, count: u16) -> Self {
        Self {
            frame_id,
            parts: vec![None; usize::from(count)],
            received: 0,
        }
    }
}

#[derive(Debug, Default)]
struct SenderState {
    current: Option<PartialFrame>,
    last_completed: Option<u32>,
}

#[derive(Debug, Default)]
pub struct SequencedReassembler {
    senders: HashMap<SocketAddr, SenderState>,
    dropped_incomplete: u64,
    rejected: u64,
}

impl SequencedReassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one datagram from `src`; returns the frame it completes, if any.
    pub fn push(&mut self, src: SocketAddr, datagram: &[u8]) -> Option<Vec<u8>> {
        let Ok((hdr, payload)) = ChunkHeader::parse(datagram) else {
            self.rejected += 1;
            return None;
        };
        if hdr.count == 0 || hdr.index >= hdr.count {
            self.rejected += 1;
            return None;
        }

        let state = self.senders.entry(src).or_default();
        if state
            .last_completed
            .is_some_and(|last| !is_newer(hdr.frame_id, last))
        {
            return None;
        }

        match &state.current {
            Some(p) if p.frame_id == hdr.frame_id => {}
            Some(p) if !is_newer(hdr.frame_id, p.frame_id) => return None,
            Some(_) => {
                self.dropped_incomplete += 1;
                state.current = Some(PartialFrame::new(hdr.frame_id, hdr.count));
            }
            None => state.current = Some(PartialFrame::new(hdr.frame_id, hdr.count)),
        }

        let partial = state.current.as_mut()?;
        let slot = partial.parts.get_mut(usize::from(hdr.index))?;
        if slot.is_some() {
            return None;
        }
        *slot = Some(payload.to_vec());
        partial.received += 1;

        if partial.received < partial.parts.len() {
            return None;
        }
        let done = state.current.take()?;
        state.last_completed = Some(done.frame_id);
        Some(done.parts.into_iter().flatten().flatten().collect())
    }

    /// Incomplete frames abandoned because a newer one started.
    #[must_use]
    pub const fn dropped_incomplete(&self) -> u64 {
        self.dropped_incomplete
    }

    /// Datagrams with an unreadable or inconsistent header.
    #[must_use]
    pub const fn rejected(&self) -> u64 {
        self.rejected
    }
}

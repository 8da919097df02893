use bytes::{Buf, BytesMut};
use serde_json::Value;

use crate::signaling::{message::SignalingMessage, signaling_error::Result};

/// Splits a byte stream into signaling messages.
///
/// Messages are concatenated JSON values with no framing, so one read may
/// hold part of a message, exactly one, or several. Complete values are
/// handed out in order and an incomplete tail waits for the next `feed`.
#[derive(Debug, Default, Clone)]
pub struct MessageDecoder {
    buf: BytesMut,
    skipped: u64,
}

impl MessageDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete message, if the buffer holds one.
    ///
    /// Well-formed JSON that is not a known message is skipped. Broken JSON
    /// empties the buffer and is reported as `Malformed`.
    pub fn next_message(&mut self) -> Result<Option<SignalingMessage>> {
        loop {
            let next = {
                let mut values =
                    serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();
                values
                    .next()
                    .map(|r| r.map(|v| (v, values.byte_offset())))
            };
            let value = match next {
                None => {
                    self.buf.clear();
                    return Ok(None);
                }
                Some(Ok((v, used))) => {
                    self.buf.advance(used);
                    v
                }
                Some(Err(e)) if e.is_eof() => return Ok(None),
                Some(Err(e)) => {
                    self.buf.clear();
                    return Err(e.into());
                }
            };

            match serde_json::from_value::<SignalingMessage>(value) {
                Ok(msg) => return Ok(Some(msg)),
                Err(_) => self.skipped += 1,
            }
        }
    }

    /// Bytes waiting for the rest of their message.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Well-formed values that matched no message type.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::signaling::signaling_error::SignalingError;

    fn drain(d: &mut MessageDecoder) -> Vec<SignalingMessage> {
        let mut out = Vec::new();
        while let Some(m) = d.next_message().unwrap() {
            out.push(m);
        }
        out
    }

    #[test]
    fn combined_read_yields_every_message() {
        let mut d = MessageDecoder::new();
        d.feed(br#"{"type":"chat_message","content":"a"}{"type":"hang_up"}"#);
        assert_eq!(
            drain(&mut d),
            vec![SignalingMessage::chat("a"), SignalingMessage::HangUp]
        );
        assert_eq!(d.pending(), 0);
    }

    #[test]
    fn split_message_waits_for_its_tail() {
        let wire = br#"{"type":"chat_message","content":"hello there"}"#;
        let (head, tail) = wire.split_at(17);
        let mut d = MessageDecoder::new();

        d.feed(head);
        assert!(d.next_message().unwrap().is_none());
        assert_eq!(d.pending(), head.len());

        d.feed(tail);
        assert_eq!(drain(&mut d), vec![SignalingMessage::chat("hello there")]);
    }

    #[test]
    fn whole_message_followed_by_partial_one() {
        let mut d = MessageDecoder::new();
        d.feed(br#"{"type":"hang_up"} {"type":"chat_"#);
        assert_eq!(d.next_message().unwrap(), Some(SignalingMessage::HangUp));
        assert!(d.next_message().unwrap().is_none());
        d.feed(br#"message","content":"x"}"#);
        assert_eq!(drain(&mut d), vec![SignalingMessage::chat("x")]);
    }

    #[test]
    fn unknown_message_types_are_skipped() {
        let mut d = MessageDecoder::new();
        d.feed(br#"{"type":"ping"}[1,2]{"type":"hang_up"}"#);
        assert_eq!(drain(&mut d), vec![SignalingMessage::HangUp]);
        assert_eq!(d.skipped(), 2);
    }

    #[test]
    fn broken_json_is_malformed_and_clears_buffer() {
        let mut d = MessageDecoder::new();
        d.feed(b"{\"type\": nope}");
        assert!(matches!(d.next_message(), Err(SignalingError::Malformed(_))));
        assert_eq!(d.pending(), 0);

        d.feed(br#"{"type":"hang_up"}"#);
        assert_eq!(drain(&mut d), vec![SignalingMessage::HangUp]);
    }
}

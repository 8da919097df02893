use serde::{Deserialize, Serialize};

/// One JSON object on the signaling connection, discriminated by `type`.
///
/// ```text
/// {"type":"call_request","from_ip":"192.168.1.4","from_hostname":"den"}
/// {"type":"chat_message","content":"hi"}
/// {"type":"hang_up"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingMessage {
    CallRequest {
        #[serde(default)]
        from_ip: String,
        /// Empty when the caller did not send one; the callee then shows the
        /// remote address instead.
        #[serde(default)]
        from_hostname: String,
    },
    CallAccepted {
        #[serde(default)]
        from_ip: String,
    },
    CallDeclined {
        #[serde(default)]
        from_ip: String,
    },
    HangUp,
    ChatMessage {
        #[serde(default)]
        content: String,
    },
    ClientList {
        #[serde(default)]
        clients: Vec<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

impl SignalingMessage {
    /// The `type` tag as it appears on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CallRequest { .. } => "call_request",
            Self::CallAccepted { .. } => "call_accepted",
            Self::CallDeclined { .. } => "call_declined",
            Self::HangUp => "hang_up",
            Self::ChatMessage { .. } => "chat_message",
            Self::ClientList { .. } => "client_list",
            Self::Error { .. } => "error",
        }
    }

    #[must_use]
    pub fn chat(content: impl Into<String>) -> Self {
        Self::ChatMessage {
            content: content.into(),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn wire_shape_uses_type_tag() {
        let msg = SignalingMessage::CallRequest {
            from_ip: "10.0.0.2".into(),
            from_hostname: "den".into(),
        };
        let v: serde_json::Value = serde_json::from_slice(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(v["type"], "call_request");
        assert_eq!(v["from_ip"], "10.0.0.2");
        assert_eq!(v["from_hostname"], "den");

        let hang_up = String::from_utf8(SignalingMessage::HangUp.to_bytes().unwrap()).unwrap();
        assert_eq!(hang_up, r#"{"type":"hang_up"}"#);
    }

    #[test]
    fn missing_fields_default_and_extra_fields_are_ignored() {
        let req: SignalingMessage = serde_json::from_str(r#"{"type":"call_request"}"#).unwrap();
        assert_eq!(
            req,
            SignalingMessage::CallRequest {
                from_ip: String::new(),
                from_hostname: String::new()
            }
        );

        let chat: SignalingMessage =
            serde_json::from_str(r#"{"type":"chat_message","content":"hi","ts":3}"#).unwrap();
        assert_eq!(chat, SignalingMessage::chat("hi"));
        assert_eq!(chat.kind(), "chat_message");
    }

    #[test]
    fn unknown_type_is_an_error() {
        assert!(serde_json::from_str::<SignalingMessage>(r#"{"type":"dance"}"#).is_err());
        assert!(serde_json::from_str::<SignalingMessage>(r#"{"content":"x"}"#).is_err());
    }
}

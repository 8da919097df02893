use std::net::IpAddr;

use crate::{call::session::EndReason, media::video_frame::VideoFrame};

/// Everything the core reports to the front end, drained on its own
/// schedule through `Engine::poll` or `Engine::events`.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    IncomingCall {
        peer: IpAddr,
        from_hostname: String,
    },
    CallStarted {
        peer: IpAddr,
    },
    CallFailed {
        peer: IpAddr,
        reason: String,
    },
    ChatReceived {
        peer: IpAddr,
        content: String,
    },
    RemoteFrame {
        peer: IpAddr,
        frame: VideoFrame,
    },
    CallEnded {
        peer: IpAddr,
        reason: EndReason,
    },
    Status(String),
}

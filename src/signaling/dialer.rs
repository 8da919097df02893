use std::{
    net::{SocketAddr, TcpStream},
    sync::Arc,
};

use crate::{
    call::call_error::{CallError, Result},
    config::{IdentityConfig, NetworkConfig},
    log::log_sink::LogSink,
    signaling::{
        channel::SignalingChannel, message::SignalingMessage, signaling_error::SignalingError,
    },
    sink_info,
};

/// Caller side of call setup: connect, send `call_request`, wait for the
/// answer. On `call_accepted` the open channel is returned for the session;
/// on every other outcome it is closed.
pub fn dial(
    addr: SocketAddr,
    identity: &IdentityConfig,
    net: &NetworkConfig,
    logger: &Arc<dyn LogSink>,
) -> Result<SignalingChannel> {
    let stream = TcpStream::connect_timeout(&addr, net.connect_timeout)
        .map_err(|e| CallError::Setup(format!("connect {addr}: {e}")))?;
    let channel = SignalingChannel::new(stream)?;

    match request_call(&channel, identity, net) {
        Ok(()) => {
            sink_info!(logger, "[dial] {addr} accepted");
            Ok(channel)
        }
        Err(e) => {
            sink_info!(logger, "[dial] {addr}: {e}");
            channel.close();
            Err(e)
        }
    }
}

fn request_call(
    channel: &SignalingChannel,
    identity: &IdentityConfig,
    net: &NetworkConfig,
) -> Result<()> {
    let from_ip = channel
        .local_addr()
        .map(|a| a.ip().to_string())
        .unwrap_or_default();
    channel.send(&SignalingMessage::CallRequest {
        from_ip,
        from_hostname: identity.display_name.clone(),
    })?;

    match channel.recv_timeout(net.response_timeout) {
        Ok(Some(SignalingMessage::CallAccepted { .. })) => Ok(()),
        Ok(Some(SignalingMessage::CallDeclined { .. })) => Err(CallError::Declined),
        Ok(Some(SignalingMessage::Error { message })) => Err(CallError::Refused(message)),
        Ok(Some(other)) => Err(CallError::UnexpectedResponse(other.kind().to_owned())),
        Ok(None) | Err(SignalingError::Timeout(_)) => Err(CallError::NoResponse),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::log_sink::NoopLogSink;
    use std::{net::TcpListener, thread, time::Duration};

    /// Dials a one-shot callee that reads the request and answers `reply`.
    fn dial_answered_with(reply: SignalingMessage) -> Result<SignalingChannel> {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let callee = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let channel = SignalingChannel::new(stream).unwrap();
            let request = channel.recv().unwrap();
            assert!(matches!(request, Some(SignalingMessage::CallRequest { .. })));
            channel.send(&reply).unwrap();
            channel
        });

        let net = NetworkConfig {
            response_timeout: Duration::from_secs(2),
            ..NetworkConfig::default()
        };
        let logger: Arc<dyn LogSink> = Arc::new(NoopLogSink);
        let outcome = dial(addr, &IdentityConfig::default(), &net, &logger);
        drop(callee.join().unwrap());
        outcome
    }

    #[test]
    fn accepted_call_keeps_the_channel() {
        let channel = dial_answered_with(SignalingMessage::CallAccepted {
            from_ip: "127.0.0.1".into(),
        })
        .unwrap();
        assert_eq!(channel.peer().ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn declined_call_is_an_error() {
        let outcome = dial_answered_with(SignalingMessage::CallDeclined {
            from_ip: String::new(),
        });
        assert!(matches!(outcome, Err(CallError::Declined)));
    }

    #[test]
    fn callee_setup_failure_carries_its_reason() {
        let outcome = dial_answered_with(SignalingMessage::Error {
            message: "video port: address in use".into(),
        });
        match outcome {
            Err(CallError::Refused(reason)) => assert!(reason.contains("video port")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}

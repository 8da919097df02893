use std::{
    collections::HashMap,
    fmt,
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    log::log_sink::LogSink,
    signaling::{
        channel::SignalingChannel,
        message::SignalingMessage,
        signaling_error::{Result, SignalingError},
    },
    sink_debug, sink_info, sink_warn,
};

const ACCEPT_POLL: Duration = Duration::from_millis(25);

/// A `call_request` that has arrived and waits for accept or decline.
pub struct IncomingCall {
    pub peer: SocketAddr,
    /// Caller's display name, or its address when it sent none.
    pub from_hostname: String,
    pub channel: SignalingChannel,
}

impl fmt::Debug for IncomingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingCall")
            .field("peer", &self.peer)
            .field("from_hostname", &self.from_hostname)
            .finish_non_exhaustive()
    }
}

pub type IncomingCallHandler = Arc<dyn Fn(IncomingCall) + Send + Sync>;

/// Accepts signaling connections and turns those opening with a
/// `call_request` into [`IncomingCall`]s.
///
/// One `signaling-accept` thread polls the listening socket; every accepted
/// connection gets a short-lived thread that reads its first message, so a
/// silent client never holds up the next one.
pub struct SignalingListener {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SignalingListener {
    /// Binds `0.0.0.0:port`. `first_message_timeout` bounds how long a new
    /// connection may stay silent.
    pub fn bind(
        port: u16,
        first_message_timeout: Duration,
        on_call: IncomingCallHandler,
        logger: Arc<dyn LogSink>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("signaling-accept".into())
            .spawn(move || accept_loop(&listener, &flag, first_message_timeout, &on_call, &logger))?;

        Ok(Self {
            local_addr,
            running,
            thread: Some(thread),
        })
    }

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl Drop for SignalingListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: &TcpListener,
    running: &AtomicBool,
    first_message_timeout: Duration,
    on_call: &IncomingCallHandler,
    logger: &Arc<dyn LogSink>,
) {
    sink_info!(logger, "[signaling] listening on {:?}", listener.local_addr().ok());

    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let on_call = Arc::clone(on_call);
                let conn_logger = Arc::clone(logger);
                let spawned = thread::Builder::new()
                    .name("signaling-conn".into())
                    .spawn(move || {
                        handle_connection(
                            stream,
                            peer,
                            first_message_timeout,
                            &on_call,
                            &conn_logger,
                        );
                    });
                if let Err(e) = spawned {
                    sink_warn!(logger, "[signaling] cannot handle {peer}: {e}");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                sink_warn!(logger, "[signaling] accept failed: {e}");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }

    sink_info!(logger, "[signaling] listener stopped");
}

fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    first_message_timeout: Duration,
    on_call: &IncomingCallHandler,
    logger: &Arc<dyn LogSink>,
) {
    // Some platforms hand out accepted sockets in the listener's mode.
    if stream.set_nonblocking(false).is_err() {
        return;
    }
    let channel = match SignalingChannel::new(stream) {
        Ok(c) => c,
        Err(e) => {
            sink_debug!(logger, "[signaling] {peer}: {e}");
            return;
        }
    };

    match channel.recv_timeout(first_message_timeout) {
        Ok(Some(SignalingMessage::CallRequest { from_hostname, .. })) => {
            let from_hostname = if from_hostname.is_empty() {
                peer.ip().to_string()
            } else {
                from_hostname
            };
            sink_info!(logger, "[signaling] call request from {from_hostname} ({peer})");
            on_call(IncomingCall {
                peer,
                from_hostname,
                channel,
            });
        }
        Ok(Some(other)) => {
            sink_debug!(
                logger,
                "[signaling] {peer} opened with {}, closing",
                other.kind()
            );
            channel.close();
        }
        Ok(None) => channel.close(),
        Err(SignalingError::Timeout(_)) => {
            sink_debug!(logger, "[signaling] {peer} sent nothing, closing");
            channel.close();
        }
        Err(e) => {
            sink_debug!(logger, "[signaling] {peer}: {e}");
            channel.close();
        }
    }
}

/// Ringing calls keyed by caller IP. A second request from the same host
/// replaces the first, whose connection is closed.
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: Mutex<HashMap<IpAddr, IncomingCall>>,
}

impl PendingCalls {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `call`; returns whether an older request was replaced.
    pub fn insert(&self, call: IncomingCall) -> bool {
        let Ok(mut calls) = self.calls.lock() else {
            call.channel.close();
            return false;
        };
        match calls.insert(call.peer.ip(), call) {
            Some(old) => {
                old.channel.close();
                true
            }
            None => false,
        }
    }

    pub fn take(&self, ip: IpAddr) -> Option<IncomingCall> {
        self.calls.lock().ok()?.remove(&ip)
    }

    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.calls.lock().is_ok_and(|c| c.contains_key(&ip))
    }

    #[must_use]
    pub fn peers(&self) -> Vec<IpAddr> {
        self.calls
            .lock()
            .map(|c| c.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Closes every ringing connection without answering.
    pub fn close_all(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            for (_, call) in calls.drain() {
                call.channel.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::NoopLogSink;
    use std::{io::Write, sync::mpsc};

    fn start() -> (SignalingListener, mpsc::Receiver<IncomingCall>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let listener = SignalingListener::bind(
            0,
            Duration::from_millis(500),
            Arc::new(move |call| {
                let _ = tx.lock().unwrap().send(call);
            }),
            Arc::new(NoopLogSink),
        )
        .unwrap();
        (listener, rx)
    }

    fn connect(listener: &SignalingListener) -> TcpStream {
        TcpStream::connect(("127.0.0.1", listener.local_addr().port())).unwrap()
    }

    #[test]
    fn call_request_becomes_incoming_call() {
        let (listener, rx) = start();
        let mut s = connect(&listener);
        s.write_all(br#"{"type":"call_request","from_ip":"x","from_hostname":"den"}"#)
            .unwrap();

        let call = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(call.from_hostname, "den");
        assert!(call.peer.ip().is_loopback());
        assert!(!call.channel.is_closed());
    }

    #[test]
    fn missing_hostname_falls_back_to_address() {
        let (listener, rx) = start();
        let mut s = connect(&listener);
        s.write_all(br#"{"type":"call_request"}"#).unwrap();

        let call = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(call.from_hostname, "127.0.0.1");
    }

    #[test]
    fn other_first_messages_are_closed() {
        let (listener, rx) = start();
        let mut s = connect(&listener);
        s.write_all(br#"{"type":"chat_message","content":"hi"}"#).unwrap();

        let mut buf = [0u8; 8];
        s.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(io::Read::read(&mut s, &mut buf).unwrap_or(0), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn newer_request_replaces_pending_one() {
        let (listener, rx) = start();
        let pending = PendingCalls::new();

        let mut first = connect(&listener);
        first.write_all(br#"{"type":"call_request"}"#).unwrap();
        assert!(!pending.insert(rx.recv_timeout(Duration::from_secs(2)).unwrap()));

        let mut second = connect(&listener);
        second.write_all(br#"{"type":"call_request"}"#).unwrap();
        assert!(pending.insert(rx.recv_timeout(Duration::from_secs(2)).unwrap()));

        let ip = IpAddr::from([127, 0, 0, 1]);
        assert_eq!(pending.peers(), vec![ip]);
        let mut buf = [0u8; 8];
        first.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(io::Read::read(&mut first, &mut buf).unwrap_or(0), 0);

        assert!(pending.take(ip).is_some());
        assert!(!pending.contains(ip));
    }
}

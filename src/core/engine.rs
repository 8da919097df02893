use std::{
    collections::HashSet,
    net::{IpAddr, SocketAddr},
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, Sender},
    },
    thread,
    time::Duration,
};

use crate::{
    call::{
        call_error::{CallError, Result},
        directory::CallDirectory,
        session::{CallSession, SessionContext},
    },
    capture::media_devices::MediaDevices,
    config::CallConfig,
    core::events::EngineEvent,
    discovery::{DiscoveryResponder, Peer, local_ip, scan_subnet},
    log::log_sink::LogSink,
    media::{audio_codec::PassthroughAudioCodec, jpeg_codec::JpegCodec},
    signaling::{
        call_state::CallState,
        dialer::dial,
        listener::{IncomingCall, PendingCalls, SignalingListener},
        message::SignalingMessage,
    },
    sink_info, sink_warn,
};

const SCAN_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// Hosts with a `dialer` thread in flight.
#[derive(Debug, Clone, Default)]
struct Dialing {
    hosts: Arc<Mutex<HashSet<IpAddr>>>,
}

impl Dialing {
    fn contains(&self, peer: IpAddr) -> bool {
        self.hosts.lock().is_ok_and(|h| h.contains(&peer))
    }
}

/// Holds a host in [`Dialing`] until dropped.
struct DialGuard {
    dialing: Dialing,
    peer: IpAddr,
}

impl Drop for DialGuard {
    fn drop(&mut self) {
        if let Ok(mut hosts) = self.dialing.hosts.lock() {
            hosts.remove(&self.peer);
        }
    }
}

/// Application-facing handle on a node: answers calls, places calls, and
/// reports everything as [`EngineEvent`]s.
pub struct Engine {
    ctx: SessionContext,
    directory: CallDirectory,
    dialing: Dialing,
    pending: Arc<PendingCalls>,
    listener: Option<SignalingListener>,
    responder: Option<DiscoveryResponder>,
    event_rx: Receiver<EngineEvent>,
    logger: Arc<dyn LogSink>,
}

impl Engine {
    /// Binds the signaling port and starts the discovery responder. Only the
    /// signaling port is required; a busy discovery port is logged.
    pub fn start(
        config: CallConfig,
        devices: MediaDevices,
        logger: Arc<dyn LogSink>,
    ) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel();
        let pending = Arc::new(PendingCalls::new());

        let net = &config.network;
        let listener = SignalingListener::bind(
            net.signaling_port,
            net.connect_timeout,
            Self::ringing_handler(Arc::clone(&pending), event_tx.clone()),
            Arc::clone(&logger),
        )
        .map_err(|e| CallError::Setup(format!("signaling port {}: {e}", net.signaling_port)))?;

        let responder = match DiscoveryResponder::start(net.discovery_port, Arc::clone(&logger)) {
            Ok(r) => Some(r),
            Err(e) => {
                sink_warn!(logger, "[engine] discovery port {}: {e}", net.discovery_port);
                None
            }
        };

        let ctx = SessionContext {
            video_codec: Arc::new(JpegCodec::new(config.video.jpeg_quality)),
            audio_codec: Arc::new(PassthroughAudioCodec),
            config,
            devices,
            events: event_tx,
            logger: Arc::clone(&logger),
        };
        sink_info!(logger, "[engine] ready on {}", listener.local_addr());

        Ok(Self {
            ctx,
            directory: CallDirectory::new(),
            dialing: Dialing::default(),
            pending,
            listener: Some(listener),
            responder,
            event_rx,
            logger,
        })
    }

    fn ringing_handler(
        pending: Arc<PendingCalls>,
        events: Sender<EngineEvent>,
    ) -> Arc<dyn Fn(IncomingCall) + Send + Sync> {
        Arc::new(move |call: IncomingCall| {
            let peer = call.peer.ip();
            let from_hostname = call.from_hostname.clone();
            pending.insert(call);
            let _ = events.send(EngineEvent::IncomingCall {
                peer,
                from_hostname,
            });
        })
    }

    #[must_use]
    pub fn signaling_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(SignalingListener::local_addr)
    }

    #[must_use]
    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        self.responder.as_ref().map(DiscoveryResponder::local_addr)
    }

    #[must_use]
    pub const fn config(&self) -> &CallConfig {
        &self.ctx.config
    }

    /// Calls `ip` on the configured signaling port.
    pub fn call(&self, ip: IpAddr) -> Result<()> {
        self.call_addr(SocketAddr::new(ip, self.ctx.config.network.signaling_port))
    }

    /// Dials `addr` on a `dialer` thread. The host reads CONNECTING until
    /// the outcome arrives as `CallStarted` or `CallFailed`; a second dial
    /// meanwhile is refused with [`CallError::AlreadyInCall`].
    pub fn call_addr(&self, addr: SocketAddr) -> Result<()> {
        let peer = addr.ip();
        let guard = {
            let Ok(mut hosts) = self.dialing.hosts.lock() else {
                return Err(CallError::Setup("dialing set poisoned".into()));
            };
            if self.directory.contains(peer) || !hosts.insert(peer) {
                return Err(CallError::AlreadyInCall(peer));
            }
            DialGuard {
                dialing: self.dialing.clone(),
                peer,
            }
        };

        let ctx = self.ctx.clone();
        let directory = self.directory.clone();
        thread::Builder::new()
            .name("dialer".into())
            .spawn(move || {
                let outcome = dial(addr, &ctx.config.identity, &ctx.config.network, &ctx.logger)
                    .and_then(|channel| {
                        directory.admit(channel, |ch| CallSession::start(ch, &ctx))
                    });
                // Out of CONNECTING before anyone hears the outcome.
                drop(guard);
                let event = match outcome {
                    Ok(session) => EngineEvent::CallStarted {
                        peer: session.peer(),
                    },
                    Err(e) => EngineEvent::CallFailed {
                        peer,
                        reason: e.to_string(),
                    },
                };
                let _ = ctx.events.send(event);
            })
            .map_err(|e| CallError::Setup(format!("dialer thread: {e}")))?;
        Ok(())
    }

    /// Answers a ringing call from `ip` and starts the session. The caller
    /// hears `call_accepted` only once local media is up.
    pub fn accept_call(&self, ip: IpAddr) -> Result<Arc<CallSession>> {
        let call = self.pending.take(ip).ok_or(CallError::NoPendingCall(ip))?;
        if self.directory.contains(ip) {
            call.channel.close();
            return Err(CallError::AlreadyInCall(ip));
        }

        match self
            .directory
            .admit(call.channel, |ch| CallSession::answer(ch, &self.ctx))
        {
            Ok(session) => {
                let _ = self
                    .ctx
                    .events
                    .send(EngineEvent::CallStarted { peer: ip });
                Ok(session)
            }
            Err(e) => {
                let _ = self.ctx.events.send(EngineEvent::CallFailed {
                    peer: ip,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn decline_call(&self, ip: IpAddr) -> Result<()> {
        let call = self.pending.take(ip).ok_or(CallError::NoPendingCall(ip))?;
        let from_ip = call
            .channel
            .local_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_default();
        let sent = call.channel.send(&SignalingMessage::CallDeclined { from_ip });
        call.channel.close();
        sink_info!(self.logger, "[engine] declined {ip}");
        sent.map_err(CallError::from)
    }

    pub fn send_chat(&self, ip: IpAddr, text: &str) -> Result<()> {
        self.directory
            .get(ip)
            .ok_or(CallError::NotActive)?
            .send_chat(text)
    }

    /// Ends the call with `ip`; returns once its workers have stopped.
    pub fn hang_up(&self, ip: IpAddr) -> Result<()> {
        self.directory
            .get(ip)
            .ok_or(CallError::NotActive)?
            .hang_up();
        Ok(())
    }

    #[must_use]
    pub fn session(&self, ip: IpAddr) -> Option<Arc<CallSession>> {
        self.directory.get(ip)
    }

    #[must_use]
    pub fn active_calls(&self) -> Vec<IpAddr> {
        self.directory.peers()
    }

    #[must_use]
    pub fn pending_calls(&self) -> Vec<IpAddr> {
        self.pending.peers()
    }

    #[must_use]
    pub fn call_state(&self, ip: IpAddr) -> CallState {
        if let Some(session) = self.directory.get(ip) {
            session.state()
        } else if self.dialing.contains(ip) {
            CallState::Connecting
        } else if self.pending.contains(ip) {
            CallState::Ringing
        } else {
            CallState::Idle
        }
    }

    /// Probes the local /24 for other nodes. Blocks for about one probe
    /// timeout.
    #[must_use]
    pub fn scan(&self) -> Vec<Peer> {
        match local_ip() {
            IpAddr::V4(me) => scan_subnet(
                me,
                self.ctx.config.network.discovery_port,
                SCAN_PROBE_TIMEOUT,
            ),
            IpAddr::V6(_) => Vec::new(),
        }
    }

    /// Drains every queued event without blocking.
    pub fn poll(&self) -> Vec<EngineEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Blocking access to the event queue, e.g. for `recv_timeout`.
    #[must_use]
    pub const fn events(&self) -> &Receiver<EngineEvent> {
        &self.event_rx
    }

    /// Hangs up every call, refuses every ringing one, and stops listening.
    pub fn shutdown(&mut self) {
        self.directory.shutdown_all();
        self.pending.close_all();
        if let Some(mut l) = self.listener.take() {
            l.stop();
        }
        if let Some(mut r) = self.responder.take() {
            r.stop();
        }
        let _ = self
            .ctx
            .events
            .send(EngineEvent::Status("engine stopped".into()));
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

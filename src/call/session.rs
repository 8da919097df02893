use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::Sender,
    },
    time::{Duration, Instant},
};

use crate::{
    audio_transport::{AudioReceiver, AudioSender},
    call::{
        call_error::{CallError, Result},
        supervisor::WorkerSet,
    },
    capture::media_devices::MediaDevices,
    config::CallConfig,
    core::events::EngineEvent,
    log::log_sink::LogSink,
    media::{audio_codec::AudioCodec, video_codec::VideoCodec, video_frame::VideoFrame},
    signaling::{
        call_state::{CallState, CallStateCell},
        channel::SignalingChannel,
        message::SignalingMessage,
    },
    sink_debug, sink_error, sink_info, sink_warn,
    video_transport::{
        VideoReceiver, VideoSender, VideoStats, VideoStatsSnapshot, udp,
    },
};

/// Why a call ended. A remote hang-up or a closed connection is a normal
/// ending, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    LocalHangUp,
    RemoteHangUp,
    PeerClosed,
    ConnectionError(String),
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalHangUp => f.write_str("hung up"),
            Self::RemoteHangUp => f.write_str("peer hung up"),
            Self::PeerClosed => f.write_str("peer closed the connection"),
            Self::ConnectionError(e) => write!(f, "connection error: {e}"),
        }
    }
}

/// What every session of an engine shares.
#[derive(Clone)]
pub struct SessionContext {
    pub config: CallConfig,
    pub devices: MediaDevices,
    pub video_codec: Arc<dyn VideoCodec>,
    pub audio_codec: Arc<dyn AudioCodec>,
    pub events: Sender<EngineEvent>,
    pub logger: Arc<dyn LogSink>,
}

type TerminatedHook = Box<dyn FnOnce(&Arc<CallSession>) + Send>;

enum HookSlot {
    Empty,
    Set(TerminatedHook),
    Finished,
}

/// One live call: the signaling channel plus the four media loops, started
/// and stopped as a unit.
pub struct CallSession {
    peer: IpAddr,
    channel: Arc<SignalingChannel>,
    state: CallStateCell,
    workers: WorkerSet,
    terminated: AtomicBool,
    /// Set once the winning `stop` has finished tearing down.
    torn_down: Mutex<bool>,
    torn_down_cv: Condvar,
    end_reason: Mutex<Option<EndReason>>,
    hook: Mutex<HookSlot>,
    events: Sender<EngineEvent>,
    video_stats: Arc<VideoStats>,
    audio_sent: Arc<AtomicU64>,
    audio_played: Arc<AtomicU64>,
    started_at: Instant,
    logger: Arc<dyn LogSink>,
}

impl fmt::Debug for CallSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSession")
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CallSession {
    /// Brings a call up on an accepted `channel`.
    ///
    /// Ports and devices are acquired first; any failure there is returned
    /// as [`CallError::Setup`] with the channel closed and nothing running.
    /// Then `signaling-rx`, `video-tx`, `video-rx`, `audio-tx` and
    /// `audio-rx` are started.
    pub fn start(channel: SignalingChannel, ctx: &SessionContext) -> Result<Arc<Self>> {
        match Self::try_start(&channel, ctx) {
            Ok(parts) => Ok(Self::launch(channel, parts, ctx)),
            Err(e) => {
                sink_error!(ctx.logger, "[call {}] setup failed: {e}", channel.peer());
                channel.close();
                Err(e)
            }
        }
    }

    /// Callee side of [`start`](Self::start): `call_accepted` goes out only
    /// once ports and devices are held. A setup failure is answered with an
    /// `error` message instead, so the caller never sees the call go ACTIVE.
    pub fn answer(channel: SignalingChannel, ctx: &SessionContext) -> Result<Arc<Self>> {
        let peer = channel.peer();
        let parts = match Self::try_start(&channel, ctx) {
            Ok(parts) => parts,
            Err(e) => {
                sink_error!(ctx.logger, "[call {peer}] setup failed: {e}");
                let _ = channel.send(&SignalingMessage::Error {
                    message: e.to_string(),
                });
                channel.close();
                return Err(e);
            }
        };

        let from_ip = channel
            .local_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_default();
        if let Err(e) = channel.send(&SignalingMessage::CallAccepted { from_ip }) {
            sink_warn!(ctx.logger, "[call {peer}] accept not delivered: {e}");
            drop(parts);
            channel.close();
            return Err(e.into());
        }
        Ok(Self::launch(channel, parts, ctx))
    }

    fn try_start(channel: &SignalingChannel, ctx: &SessionContext) -> Result<MediaParts> {
        let cfg = &ctx.config;
        let net = &cfg.network;
        let peer_ip = channel.peer().ip();
        let setup = |what: &str, e: &dyn fmt::Display| CallError::Setup(format!("{what}: {e}"));

        let video_rx = udp::bind_receiver(net.video_port, net.recv_timeout)
            .map_err(|e| setup("video port", &e))?;
        let audio_rx = udp::bind_receiver(net.audio_port, net.recv_timeout)
            .map_err(|e| setup("audio port", &e))?;
        let video_tx = udp::bind_sender().map_err(|e| setup("video socket", &e))?;
        let audio_tx = udp::bind_sender().map_err(|e| setup("audio socket", &e))?;

        let devices = &ctx.devices;
        let camera = devices
            .open_frame_source(&cfg.video)
            .map_err(|e| setup("camera", &e))?;
        let microphone = devices
            .open_audio_input(&cfg.audio)
            .map_err(|e| setup("microphone", &e))?;
        let speaker = devices
            .open_audio_output(&cfg.audio)
            .map_err(|e| setup("speaker", &e))?;

        let reader = channel.try_clone().map_err(|e| setup("signaling", &e))?;
        let video_stats = Arc::new(VideoStats::default());

        let events = ctx.events.clone();
        let video_receiver = VideoReceiver::new(
            video_rx,
            Arc::clone(&ctx.video_codec),
            &cfg.video,
            Box::new(move |src: SocketAddr, frame: VideoFrame| {
                let _ = events.send(EngineEvent::RemoteFrame {
                    peer: src.ip(),
                    frame,
                });
            }),
            Arc::clone(&video_stats),
            Arc::clone(&ctx.logger),
        );
        let video_sender = VideoSender::new(
            video_tx,
            SocketAddr::new(peer_ip, net.remote_video_port),
            camera,
            Arc::clone(&ctx.video_codec),
            cfg.video.clone(),
            Arc::clone(&video_stats),
            Arc::clone(&ctx.logger),
        );
        let audio_sender = AudioSender::new(
            audio_tx,
            SocketAddr::new(peer_ip, net.remote_audio_port),
            microphone,
            Arc::clone(&ctx.audio_codec),
            cfg.audio.pacing,
            Arc::clone(&ctx.logger),
        );
        let audio_receiver = AudioReceiver::new(
            audio_rx,
            speaker,
            Arc::clone(&ctx.audio_codec),
            cfg.audio.chunk_bytes(),
            Arc::clone(&ctx.logger),
        );

        Ok(MediaParts {
            reader,
            video_stats,
            video_sender,
            video_receiver,
            audio_sender,
            audio_receiver,
        })
    }

    fn launch(channel: SignalingChannel, parts: MediaParts, ctx: &SessionContext) -> Arc<Self> {
        let peer = channel.peer().ip();
        let session = Arc::new(Self {
            peer,
            channel: Arc::new(channel),
            state: CallStateCell::new(CallState::Active, peer.to_string(), Arc::clone(&ctx.logger)),
            workers: WorkerSet::new(),
            terminated: AtomicBool::new(false),
            torn_down: Mutex::new(false),
            torn_down_cv: Condvar::new(),
            end_reason: Mutex::new(None),
            hook: Mutex::new(HookSlot::Empty),
            events: ctx.events.clone(),
            video_stats: parts.video_stats,
            audio_sent: parts.audio_sender.sent_counter(),
            audio_played: parts.audio_receiver.played_counter(),
            started_at: Instant::now(),
            logger: Arc::clone(&ctx.logger),
        });

        let MediaParts {
            reader,
            video_sender,
            video_receiver,
            audio_sender,
            audio_receiver,
            ..
        } = parts;

        let rx_session = Arc::clone(&session);
        let spawned = [
            session
                .workers
                .spawn("signaling-rx", move |_| rx_session.signaling_loop(&reader)),
            session
                .workers
                .spawn("video-tx", move |running| video_sender.run(&running)),
            session
                .workers
                .spawn("video-rx", move |running| video_receiver.run(&running)),
            session
                .workers
                .spawn("audio-tx", move |running| audio_sender.run(&running)),
            session
                .workers
                .spawn("audio-rx", move |running| audio_receiver.run(&running)),
        ];

        if let Some(Err(e)) = spawned.into_iter().find(std::result::Result::is_err) {
            sink_error!(session.logger, "[call {peer}] worker spawn failed: {e}");
            session.stop(EndReason::ConnectionError(format!("worker spawn: {e}")));
        } else {
            sink_info!(session.logger, "[call {peer}] active");
        }
        session
    }

    fn signaling_loop(self: &Arc<Self>, reader: &SignalingChannel) {
        let reason = loop {
            match reader.recv() {
                Ok(Some(SignalingMessage::ChatMessage { content })) => {
                    let _ = self.events.send(EngineEvent::ChatReceived {
                        peer: self.peer,
                        content,
                    });
                }
                Ok(Some(SignalingMessage::HangUp)) => break EndReason::RemoteHangUp,
                Ok(Some(other)) => {
                    sink_debug!(self.logger, "[call {}] ignored {}", self.peer, other.kind());
                }
                Ok(None) => break EndReason::PeerClosed,
                Err(e) => break EndReason::ConnectionError(e.to_string()),
            }
        };
        // No-op when a local hang-up already closed the channel under us.
        self.stop(reason);
    }

    #[must_use]
    pub const fn peer(&self) -> IpAddr {
        self.peer
    }

    #[must_use]
    pub fn state(&self) -> CallState {
        self.state.get()
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason.lock().ok().and_then(|r| r.clone())
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    #[must_use]
    pub fn video_stats(&self) -> VideoStatsSnapshot {
        self.video_stats.snapshot()
    }

    /// Audio datagrams sent and played so far.
    #[must_use]
    pub fn audio_counts(&self) -> (u64, u64) {
        (
            self.audio_sent.load(Ordering::Relaxed),
            self.audio_played.load(Ordering::Relaxed),
        )
    }

    /// Sends a chat line. A write failure ends the call.
    pub fn send_chat(self: &Arc<Self>, text: &str) -> Result<()> {
        if self.state() != CallState::Active {
            return Err(CallError::NotActive);
        }
        match self.channel.send(&SignalingMessage::chat(text)) {
            Ok(()) => Ok(()),
            Err(e) => {
                sink_warn!(self.logger, "[call {}] chat send failed: {e}", self.peer);
                self.stop(EndReason::ConnectionError(e.to_string()));
                Err(e.into())
            }
        }
    }

    pub fn hang_up(self: &Arc<Self>) {
        self.stop(EndReason::LocalHangUp);
    }

    /// Ends the call. Only the first caller tears down; it notifies the peer
    /// unless the peer hung up, closes the channel, joins the workers and
    /// runs the terminated hook. Returns whether this call did the teardown.
    ///
    /// Every other caller returns only after that teardown has finished,
    /// except the session's own workers, which the tearing-down thread joins.
    pub fn stop(self: &Arc<Self>, reason: EndReason) -> bool {
        if self
            .terminated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            if !self.workers.is_current_worker() {
                self.wait_torn_down();
            }
            return false;
        }

        sink_info!(self.logger, "[call {}] ending: {reason}", self.peer);
        self.state.transition(CallState::Terminated);
        if let Ok(mut r) = self.end_reason.lock() {
            *r = Some(reason.clone());
        }

        if reason != EndReason::RemoteHangUp {
            // Best effort; the peer may already be gone.
            let _ = self.channel.send(&SignalingMessage::HangUp);
        }
        self.channel.close();

        let panicked = self.workers.stop_and_join();
        if !panicked.is_empty() {
            sink_error!(self.logger, "[call {}] workers panicked: {panicked:?}", self.peer);
        }

        let hook = self
            .hook
            .lock()
            .map(|mut slot| std::mem::replace(&mut *slot, HookSlot::Finished))
            .unwrap_or(HookSlot::Finished);
        if let HookSlot::Set(f) = hook {
            f(self);
        }

        let _ = self.events.send(EngineEvent::CallEnded {
            peer: self.peer,
            reason,
        });
        sink_info!(self.logger, "[call {}] terminated", self.peer);
        self.mark_torn_down();
        true
    }

    fn mark_torn_down(&self) {
        if let Ok(mut done) = self.torn_down.lock() {
            *done = true;
        }
        self.torn_down_cv.notify_all();
    }

    fn wait_torn_down(&self) {
        if let Ok(done) = self.torn_down.lock() {
            drop(self.torn_down_cv.wait_while(done, |done| !*done));
        }
    }

    /// Registers what to run once teardown finished. Runs right away when the
    /// session already ended.
    pub fn set_on_terminated<F>(self: &Arc<Self>, f: F)
    where
        F: FnOnce(&Arc<Self>) + Send + 'static,
    {
        let run_now = match self.hook.lock() {
            Ok(mut slot) => match *slot {
                HookSlot::Finished => true,
                _ => {
                    *slot = HookSlot::Set(Box::new(f));
                    return;
                }
            },
            Err(_) => true,
        };
        if run_now {
            f(self);
        }
    }
}

struct MediaParts {
    reader: SignalingChannel,
    video_stats: Arc<VideoStats>,
    video_sender: VideoSender,
    video_receiver: VideoReceiver,
    audio_sender: AudioSender,
    audio_receiver: AudioReceiver,
}

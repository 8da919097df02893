#![allow(clippy::unwrap_used, clippy::expect_used)]

use lanchat::{
    call::{CallError, EndReason},
    capture::MediaDevices,
    config::CallConfig,
    core::{Engine, EngineEvent},
    log::NoopLogSink,
    signaling::CallState,
    video_transport::udp,
};
use std::{
    io::{Read, Write},
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream, UdpSocket},
    sync::{Arc, Barrier},
    thread,
    time::{Duration, Instant},
};

const WAIT: Duration = Duration::from_secs(5);
const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn free_udp_port() -> u16 {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

struct Ports {
    video: u16,
    audio: u16,
}

impl Ports {
    fn free() -> Self {
        Self {
            video: free_udp_port(),
            audio: free_udp_port(),
        }
    }
}

fn node_config(local: &Ports, remote: &Ports) -> CallConfig {
    let mut cfg = CallConfig::default();
    cfg.network.signaling_port = 0;
    cfg.network.discovery_port = 0;
    cfg.network.video_port = local.video;
    cfg.network.audio_port = local.audio;
    cfg.network.remote_video_port = remote.video;
    cfg.network.remote_audio_port = remote.audio;
    cfg.network.recv_timeout = Duration::from_millis(50);
    cfg.network.response_timeout = WAIT;
    cfg.video.width = 64;
    cfg.video.height = 48;
    cfg.video.max_datagram = 1200;
    cfg.audio.chunk_frames = 256;
    cfg.identity.display_name = "node".into();
    cfg
}

/// Two engines on loopback wired to each other's media ports.
fn pair() -> (Engine, Engine, Ports) {
    let a_ports = Ports::free();
    let b_ports = Ports::free();
    let a = Engine::start(
        node_config(&a_ports, &b_ports),
        MediaDevices::synthetic(),
        Arc::new(NoopLogSink),
    )
    .unwrap();
    let b = Engine::start(
        node_config(&b_ports, &a_ports),
        MediaDevices::synthetic(),
        Arc::new(NoopLogSink),
    )
    .unwrap();
    (a, b, b_ports)
}

fn signaling_of(engine: &Engine) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, engine.signaling_addr().unwrap().port()))
}

/// Waits for the first event `pick` maps to `Some`, skipping the rest.
fn wait_for<T>(engine: &Engine, mut pick: impl FnMut(EngineEvent) -> Option<T>) -> T {
    let deadline = Instant::now() + WAIT;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        if let Ok(ev) = engine.events().recv_timeout(left) {
            if let Some(found) = pick(ev) {
                return found;
            }
        }
    }
    panic!("event did not arrive within {WAIT:?}");
}

fn connect(a: &Engine, b: &Engine) {
    a.call_addr(signaling_of(b)).unwrap();
    let from = wait_for(b, |ev| match ev {
        EngineEvent::IncomingCall {
            peer,
            from_hostname,
        } => Some((peer, from_hostname)),
        _ => None,
    });
    assert_eq!(from, (LOOPBACK, "node".to_owned()));
    assert_eq!(b.call_state(LOOPBACK), CallState::Ringing);

    b.accept_call(LOOPBACK).unwrap();
    wait_for(a, |ev| match ev {
        EngineEvent::CallStarted { peer } => Some(peer),
        EngineEvent::CallFailed { reason, .. } => panic!("call failed: {reason}"),
        _ => None,
    });
}

#[test]
fn chat_then_hang_up_ends_both_sides() {
    let (a, b, b_ports) = pair();
    connect(&a, &b);
    assert_eq!(a.call_state(LOOPBACK), CallState::Active);
    assert_eq!(b.call_state(LOOPBACK), CallState::Active);

    a.send_chat(LOOPBACK, "hi").unwrap();
    let chat = wait_for(&b, |ev| match ev {
        EngineEvent::ChatReceived { peer, content } => Some((peer, content)),
        _ => None,
    });
    assert_eq!(chat, (LOOPBACK, "hi".to_owned()));

    let b_session = b.session(LOOPBACK).unwrap();
    a.hang_up(LOOPBACK).unwrap();
    assert!(a.active_calls().is_empty());

    let reason = wait_for(&b, |ev| match ev {
        EngineEvent::CallEnded { reason, .. } => Some(reason),
        _ => None,
    });
    assert_eq!(reason, EndReason::RemoteHangUp);
    assert_eq!(b_session.state(), CallState::Terminated);
    assert!(b.active_calls().is_empty());
    assert_eq!(b.call_state(LOOPBACK), CallState::Idle);

    // Every loop has exited, so the media ports are free again.
    udp::bind_receiver(b_ports.video, Duration::from_millis(50)).unwrap();
    udp::bind_receiver(b_ports.audio, Duration::from_millis(50)).unwrap();
}

#[test]
fn declined_call_creates_no_session() {
    let (a, b, _) = pair();
    a.call_addr(signaling_of(&b)).unwrap();
    wait_for(&b, |ev| matches!(ev, EngineEvent::IncomingCall { .. }).then_some(()));

    b.decline_call(LOOPBACK).unwrap();
    let reason = wait_for(&a, |ev| match ev {
        EngineEvent::CallFailed { reason, .. } => Some(reason),
        _ => None,
    });
    assert!(reason.contains("declined"), "{reason}");
    assert!(a.active_calls().is_empty());
    assert!(b.active_calls().is_empty());
    assert_eq!(a.call_state(LOOPBACK), CallState::Idle);
    assert!(matches!(
        b.decline_call(LOOPBACK),
        Err(CallError::NoPendingCall(_))
    ));
}

#[test]
fn second_call_from_same_host_is_refused() {
    let (a, b, _) = pair();
    connect(&a, &b);

    let mut intruder = TcpStream::connect(signaling_of(&b)).unwrap();
    intruder
        .write_all(br#"{"type":"call_request","from_ip":"127.0.0.1","from_hostname":"again"}"#)
        .unwrap();
    wait_for(&b, |ev| match ev {
        EngineEvent::IncomingCall { from_hostname, .. } if from_hostname == "again" => Some(()),
        _ => None,
    });

    assert!(matches!(
        b.accept_call(LOOPBACK),
        Err(CallError::AlreadyInCall(_))
    ));

    intruder.set_read_timeout(Some(WAIT)).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(intruder.read(&mut buf).unwrap_or(0), 0);

    // The original call still carries chat.
    assert_eq!(b.call_state(LOOPBACK), CallState::Active);
    a.send_chat(LOOPBACK, "still here").unwrap();
    let content = wait_for(&b, |ev| match ev {
        EngineEvent::ChatReceived { content, .. } => Some(content),
        _ => None,
    });
    assert_eq!(content, "still here");
}

#[test]
fn stopping_twice_is_harmless() {
    let (a, b, b_ports) = pair();
    connect(&a, &b);

    let session = b.session(LOOPBACK).unwrap();
    assert!(session.stop(EndReason::LocalHangUp));
    assert!(!session.stop(EndReason::LocalHangUp));
    assert_eq!(session.end_reason(), Some(EndReason::LocalHangUp));
    assert!(matches!(
        session.send_chat("late"),
        Err(CallError::NotActive)
    ));

    let ended = b
        .poll()
        .into_iter()
        .filter(|ev| matches!(ev, EngineEvent::CallEnded { .. }))
        .count();
    assert_eq!(ended, 1);

    udp::bind_receiver(b_ports.video, Duration::from_millis(50)).unwrap();
    udp::bind_receiver(b_ports.audio, Duration::from_millis(50)).unwrap();

    let reason = wait_for(&a, |ev| match ev {
        EngineEvent::CallEnded { reason, .. } => Some(reason),
        _ => None,
    });
    assert_eq!(reason, EndReason::RemoteHangUp);
}

#[test]
fn racing_stops_return_after_teardown() {
    let (a, b, b_ports) = pair();
    connect(&a, &b);

    let session = b.session(LOOPBACK).unwrap();
    let start = Arc::new(Barrier::new(2));
    let other = {
        let session = Arc::clone(&session);
        let start = Arc::clone(&start);
        thread::spawn(move || {
            start.wait();
            session.stop(EndReason::LocalHangUp)
        })
    };
    start.wait();
    let mine = session.stop(EndReason::LocalHangUp);

    // Whichever call lost, its return means the media loops are gone.
    udp::bind_receiver(b_ports.video, Duration::from_millis(50)).unwrap();
    udp::bind_receiver(b_ports.audio, Duration::from_millis(50)).unwrap();

    let theirs = other.join().unwrap();
    assert!(mine ^ theirs, "exactly one stop tears down");
    assert_eq!(session.state(), CallState::Terminated);
}

#[test]
fn caller_reads_connecting_until_answered() {
    let (a, b, _) = pair();
    assert_eq!(a.call_state(LOOPBACK), CallState::Idle);

    a.call_addr(signaling_of(&b)).unwrap();
    wait_for(&b, |ev| matches!(ev, EngineEvent::IncomingCall { .. }).then_some(()));
    assert_eq!(a.call_state(LOOPBACK), CallState::Connecting);
    assert!(matches!(
        a.call_addr(signaling_of(&b)),
        Err(CallError::AlreadyInCall(_))
    ));

    b.decline_call(LOOPBACK).unwrap();
    wait_for(&a, |ev| matches!(ev, EngineEvent::CallFailed { .. }).then_some(()));
    assert_eq!(a.call_state(LOOPBACK), CallState::Idle);
    assert!(b.pending_calls().is_empty());
}

#[test]
fn busy_media_port_fails_setup() {
    let (a, b, b_ports) = pair();
    let _squatter = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, b_ports.video)).unwrap();

    a.call_addr(signaling_of(&b)).unwrap();
    wait_for(&b, |ev| matches!(ev, EngineEvent::IncomingCall { .. }).then_some(()));

    assert!(matches!(
        b.accept_call(LOOPBACK),
        Err(CallError::Setup(_))
    ));
    assert!(b.active_calls().is_empty());

    // The caller is told why and never goes ACTIVE.
    let reason = wait_for(&a, |ev| match ev {
        EngineEvent::CallStarted { .. } => panic!("caller went active"),
        EngineEvent::CallFailed { reason, .. } => Some(reason),
        _ => None,
    });
    assert!(reason.contains("could not take the call"), "{reason}");
    assert!(reason.contains("video port"), "{reason}");
    assert!(a.active_calls().is_empty());
    assert_eq!(a.call_state(LOOPBACK), CallState::Idle);
}

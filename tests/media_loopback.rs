#![allow(clippy::unwrap_used, clippy::expect_used)]

use lanchat::{
    audio_transport::{AudioReceiver, AudioSender},
    capture::{ChannelOutput, FixedChunkInput, SyntheticSource},
    config::{VideoConfig, WireFormat},
    log::NoopLogSink,
    media::{JpegCodec, PassthroughAudioCodec, VideoFrame},
    video_transport::{VideoReceiver, VideoSender, VideoStats, udp},
};
use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    time::{Duration, Instant},
};

const WAIT: Duration = Duration::from_secs(5);

fn video_config(wire_format: WireFormat) -> VideoConfig {
    VideoConfig {
        max_datagram: 512,
        jpeg_quality: 70,
        width: 160,
        height: 120,
        frame_pacing: Duration::from_millis(5),
        wire_format,
    }
}

fn stream_video(wire_format: WireFormat) -> (Vec<VideoFrame>, Arc<VideoStats>) {
    let cfg = video_config(wire_format);
    let codec = Arc::new(JpegCodec::new(cfg.jpeg_quality));
    let stats = Arc::new(VideoStats::default());
    let running = Arc::new(AtomicBool::new(true));

    let rx_socket = udp::bind_receiver(0, Duration::from_millis(50)).unwrap();
    let port = rx_socket.local_addr().unwrap().port();
    let (frame_tx, frame_rx) = mpsc::channel();
    let receiver = VideoReceiver::new(
        rx_socket,
        codec.clone(),
        &cfg,
        Box::new(move |_src: SocketAddr, frame: VideoFrame| {
            let _ = frame_tx.send(frame);
        }),
        Arc::clone(&stats),
        Arc::new(NoopLogSink),
    );
    let sender = VideoSender::new(
        udp::bind_sender().unwrap(),
        SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
        Box::new(SyntheticSource::new(cfg.width, cfg.height, 60)),
        codec,
        cfg,
        Arc::clone(&stats),
        Arc::new(NoopLogSink),
    );

    let rx = receiver.spawn(Arc::clone(&running)).unwrap();
    let tx = sender.spawn(Arc::clone(&running)).unwrap();

    let mut frames = Vec::new();
    let deadline = Instant::now() + WAIT;
    while frames.len() < 3 && Instant::now() < deadline {
        if let Ok(f) = frame_rx.recv_timeout(Duration::from_millis(100)) {
            frames.push(f);
        }
    }

    running.store(false, Ordering::SeqCst);
    let stopped = Instant::now();
    tx.join().unwrap();
    rx.join().unwrap();
    assert!(stopped.elapsed() < Duration::from_secs(2));
    (frames, stats)
}

#[test]
fn legacy_video_frames_arrive_whole() {
    let (frames, stats) = stream_video(WireFormat::Legacy);
    assert!(frames.len() >= 3, "only {} frames", frames.len());
    for f in &frames {
        assert_eq!((f.width, f.height), (160, 120));
        assert!(f.is_well_formed());
    }
    let s = stats.snapshot();
    assert!(s.frames_sent >= 3);
    assert!(s.chunks_sent > s.frames_sent);
}

#[test]
fn sequenced_video_frames_arrive_whole() {
    let (frames, stats) = stream_video(WireFormat::Sequenced);
    assert!(frames.len() >= 3, "only {} frames", frames.len());
    for f in &frames {
        assert_eq!((f.width, f.height), (160, 120));
    }
    assert_eq!(stats.snapshot().decode_failures, 0);
}

#[test]
fn audio_chunks_pass_through_unchanged() {
    let chunk: Vec<u8> = (0..512u32).map(|i| (i % 251) as u8).collect();
    let running = Arc::new(AtomicBool::new(true));

    let rx_socket = udp::bind_receiver(0, Duration::from_millis(50)).unwrap();
    let port = rx_socket.local_addr().unwrap().port();
    let (played_tx, played_rx) = mpsc::channel();
    let receiver = AudioReceiver::new(
        rx_socket,
        Box::new(ChannelOutput::new(played_tx)),
        Arc::new(PassthroughAudioCodec),
        chunk.len(),
        Arc::new(NoopLogSink),
    );
    let sender = AudioSender::new(
        udp::bind_sender().unwrap(),
        SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
        Box::new(FixedChunkInput::new(chunk.clone(), Duration::from_millis(5))),
        Arc::new(PassthroughAudioCodec),
        Duration::from_millis(1),
        Arc::new(NoopLogSink),
    );
    let sent = sender.sent_counter();
    let played = receiver.played_counter();

    let rx = receiver.spawn(Arc::clone(&running)).unwrap();
    let tx = sender.spawn(Arc::clone(&running)).unwrap();

    for _ in 0..3 {
        assert_eq!(played_rx.recv_timeout(WAIT).unwrap(), chunk);
    }

    running.store(false, Ordering::SeqCst);
    tx.join().unwrap();
    rx.join().unwrap();
    assert!(sent.load(Ordering::Relaxed) >= 3);
    assert!(played.load(Ordering::Relaxed) >= 3);
}

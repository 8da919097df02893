//! lanchat: peer-to-peer video, audio and text calls between hosts on one
//! local network.
//!
//! A call is negotiated over a TCP signaling connection that then carries
//! chat and hang-up; video (JPEG frames cut into datagrams) and raw audio
//! chunks travel over UDP. The `lanchat` binary is a terminal front end over
//! [`core::engine::Engine`].

/// Audio sender and receiver loops.
pub mod audio_transport;
/// Call sessions, their worker supervisor and the active-call directory.
pub mod call;
/// Cameras, microphones and speakers, real or synthetic.
pub mod capture;
/// Handles configuration loading and management.
pub mod config;
/// The engine facade and its event queue.
pub mod core;
/// Liveness responder and subnet scan.
pub mod discovery;
/// Logging utilities for the application.
pub mod log;
/// Frame and chunk types and the codec boundary.
pub mod media;
/// Signaling messages, connections, and call setup.
pub mod signaling;
/// Video chunking, reassembly and the send/receive loops.
pub mod video_transport;

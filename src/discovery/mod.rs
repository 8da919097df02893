//! Finding other nodes on the local /24: a TCP port that accepts and closes,
//! and a scan that probes every host for it.
pub mod responder;
pub mod scan;

pub use responder::DiscoveryResponder;
pub use scan::{Peer, local_ip, probe, scan_subnet};

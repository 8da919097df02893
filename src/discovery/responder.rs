use std::{
    io,
    net::{Ipv4Addr, SocketAddr, TcpListener},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{log::log_sink::LogSink, sink_debug, sink_info, sink_warn};

const ACCEPT_POLL: Duration = Duration::from_millis(25);

/// Liveness target for [`scan_subnet`](super::scan::scan_subnet): accepts
/// every connection and closes it straight away.
pub struct DiscoveryResponder {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DiscoveryResponder {
    pub fn start(port: u16, logger: Arc<dyn LogSink>) -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("discovery".into())
            .spawn(move || {
                sink_info!(logger, "[discovery] answering probes on {local_addr}");
                while flag.load(Ordering::SeqCst) {
                    match listener.accept() {
                        // Dropping the stream closes it.
                        Ok((_stream, peer)) => sink_debug!(logger, "[discovery] probe from {peer}"),
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                            thread::sleep(ACCEPT_POLL);
                        }
                        Err(e) => {
                            sink_warn!(logger, "[discovery] accept failed: {e}");
                            thread::sleep(ACCEPT_POLL);
                        }
                    }
                }
                sink_info!(logger, "[discovery] stopped");
            })?;

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

impl Drop for DiscoveryResponder {
    fn drop(&mut self) {
        self.stop();
    }
}

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream, UdpSocket},
    thread,
    time::Duration,
};

/// A host that answered a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Peer {
    pub ip: IpAddr,
}

/// Address of the interface that routes off-host. Nothing is sent; the
/// target only has to be routable. Falls back to loopback.
#[must_use]
pub fn local_ip() -> IpAddr {
    let routed = || -> std::io::Result<IpAddr> {
        let s = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        s.connect((Ipv4Addr::new(10, 254, 254, 254), 1))?;
        Ok(s.local_addr()?.ip())
    };
    routed()
        .ok()
        .filter(|ip| !ip.is_unspecified())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Whether something accepts TCP connections at `addr` within `timeout`.
#[must_use]
pub fn probe(addr: SocketAddr, timeout: Duration) -> bool {
    TcpStream::connect_timeout(&addr, timeout).is_ok()
}

/// Probes `.1` to `.254` of `local`'s /24 on `port`, one scoped thread per
/// host, and returns the hosts that answered sorted by address. `local`
/// itself is skipped.
#[must_use]
pub fn scan_subnet(local: Ipv4Addr, port: u16, timeout: Duration) -> Vec<Peer> {
    let [a, b, c, _] = local.octets();
    let mut found: Vec<Peer> = thread::scope(|s| {
        let probes: Vec<_> = (1..=254u8)
            .map(|host| Ipv4Addr::new(a, b, c, host))
            .filter(|ip| *ip != local)
            .filter_map(|ip| {
                thread::Builder::new()
                    .spawn_scoped(s, move || {
                        probe(SocketAddr::from((ip, port)), timeout).then_some(Peer {
                            ip: IpAddr::V4(ip),
                        })
                    })
                    .ok()
            })
            .collect();

        probes
            .into_iter()
            .filter_map(|h| h.join().ok().flatten())
            .collect()
    });
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::{discovery::responder::DiscoveryResponder, log::NoopLogSink};
    use std::{net::TcpListener, sync::Arc};

    #[test]
    fn probe_sees_responder_and_not_closed_port() {
        let responder = DiscoveryResponder::start(0, Arc::new(NoopLogSink)).unwrap();
        let port = responder.local_addr().port();
        assert!(probe(
            SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            Duration::from_millis(500)
        ));

        let closed = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let closed_port = closed.local_addr().unwrap().port();
        drop(closed);
        assert!(!probe(
            SocketAddr::from((Ipv4Addr::LOCALHOST, closed_port)),
            Duration::from_millis(200)
        ));
    }

    #[test]
    fn scan_excludes_self_and_sorts() {
        let responder = DiscoveryResponder::start(0, Arc::new(NoopLogSink)).unwrap();
        let port = responder.local_addr().port();
        let me = Ipv4Addr::new(127, 0, 0, 9);

        let peers = scan_subnet(me, port, Duration::from_millis(300));
        let ips: Vec<IpAddr> = peers.iter().map(|p| p.ip).collect();

        assert!(ips.contains(&IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert!(!ips.contains(&IpAddr::V4(me)));
        assert!(ips.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn local_ip_is_never_unspecified() {
        assert!(!local_ip().is_unspecified());
    }
}

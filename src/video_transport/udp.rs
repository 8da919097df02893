use std::{
    net::{Ipv4Addr, SocketAddr, UdpSocket},
    time::Duration,
};

use crate::video_transport::transport_error::{Result, TransportError};

/// Binds `0.0.0.0:port` with a read timeout, so a blocked receive wakes up
/// often enough to see the stop flag.
pub fn bind_receiver(port: u16, recv_timeout: Duration) -> Result<UdpSocket> {
    let sock = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .map_err(|source| TransportError::Bind { port, source })?;
    sock.set_read_timeout(Some(recv_timeout))?;
    Ok(sock)
}

/// Ephemeral socket for outbound datagrams.
pub fn bind_sender() -> Result<UdpSocket> {
    UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
        .map_err(|source| TransportError::Bind { port: 0, source })
}

use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::signaling::{
    decoder::MessageDecoder,
    message::SignalingMessage,
    signaling_error::{Result, SignalingError},
};

const READ_CHUNK: usize = 4096;

/// The one reliable, ordered connection of a call.
///
/// All methods take `&self`: the session's receive thread blocks in
/// [`recv`](Self::recv) while other threads send chat or close the channel.
/// Writes are serialized so two messages never interleave on the wire.
#[derive(Debug)]
pub struct SignalingChannel {
    stream: TcpStream,
    peer: SocketAddr,
    decoder: Mutex<MessageDecoder>,
    write_lock: Arc<Mutex<()>>,
    closed: Arc<AtomicBool>,
}

impl SignalingChannel {
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        let _ = stream.set_nodelay(true);
        Ok(Self {
            stream,
            peer,
            decoder: Mutex::new(MessageDecoder::new()),
            write_lock: Arc::new(Mutex::new(())),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.local_addr()?)
    }

    /// Writes one message as a single JSON value, no delimiter.
    pub fn send(&self, msg: &SignalingMessage) -> Result<()> {
        if self.is_closed() {
            return Err(SignalingError::Closed);
        }
        let bytes = msg.to_bytes()?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| SignalingError::Io(io::Error::other("write lock poisoned")))?;
        (&self.stream).write_all(&bytes)?;
        Ok(())
    }

    /// Blocks for the next message. `Ok(None)` means the peer closed the
    /// connection.
    pub fn recv(&self) -> Result<Option<SignalingMessage>> {
        self.recv_until(None)
    }

    /// [`recv`](Self::recv) bounded by `timeout`; reports
    /// [`SignalingError::Timeout`] when nothing complete arrives in time.
    /// The bound covers the whole message, however many reads it takes.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<SignalingMessage>> {
        let res = self.recv_until(Some(Instant::now() + timeout));
        let _ = self.stream.set_read_timeout(None);
        match res {
            Err(SignalingError::Io(e))
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Err(SignalingError::Timeout(timeout))
            }
            Err(SignalingError::Timeout(_)) => Err(SignalingError::Timeout(timeout)),
            other => other,
        }
    }

    fn recv_until(&self, deadline: Option<Instant>) -> Result<Option<SignalingMessage>> {
        let mut decoder = self
            .decoder
            .lock()
            .map_err(|_| SignalingError::Io(io::Error::other("decoder lock poisoned")))?;
        let mut buf = [0u8; READ_CHUNK];
        loop {
            if let Some(msg) = decoder.next_message()? {
                return Ok(Some(msg));
            }
            if let Some(deadline) = deadline {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Err(SignalingError::Timeout(Duration::ZERO));
                }
                self.stream
                    .set_read_timeout(Some(left.max(Duration::from_millis(1))))?;
            }
            match (&self.stream).read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => decoder.feed(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Second handle on the same connection. Closing either closes both;
    /// bytes already buffered for decoding are carried over.
    pub fn try_clone(&self) -> Result<Self> {
        let decoder = self
            .decoder
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default();
        Ok(Self {
            stream: self.stream.try_clone()?,
            peer: self.peer,
            decoder: Mutex::new(decoder),
            write_lock: Arc::clone(&self.write_lock),
            closed: Arc::clone(&self.closed),
        })
    }

    /// Shuts the connection down both ways, which also wakes a thread
    /// blocked in `recv`. Only the first call does anything.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::{net::TcpListener, thread};

    fn pair() -> (SignalingChannel, SignalingChannel) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server, _) = listener.accept().unwrap();
        let client = client.join().unwrap();
        (
            SignalingChannel::new(client).unwrap(),
            SignalingChannel::new(server).unwrap(),
        )
    }

    #[test]
    fn messages_arrive_in_order() {
        let (a, b) = pair();
        a.send(&SignalingMessage::chat("one")).unwrap();
        a.send(&SignalingMessage::chat("two")).unwrap();
        a.send(&SignalingMessage::HangUp).unwrap();

        assert_eq!(b.recv().unwrap(), Some(SignalingMessage::chat("one")));
        assert_eq!(b.recv().unwrap(), Some(SignalingMessage::chat("two")));
        assert_eq!(b.recv().unwrap(), Some(SignalingMessage::HangUp));
    }

    #[test]
    fn peer_close_reads_as_none() {
        let (a, b) = pair();
        a.close();
        assert_eq!(b.recv().unwrap(), None);
    }

    #[test]
    fn recv_timeout_reports_timeout() {
        let (_a, b) = pair();
        let started = Instant::now();
        assert!(matches!(
            b.recv_timeout(Duration::from_millis(50)),
            Err(SignalingError::Timeout(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn trickled_partial_message_still_times_out() {
        let (a, b) = pair();
        let writer = a.try_clone().unwrap();
        let trickle = thread::spawn(move || {
            let mut stream = &writer.stream;
            stream.write_all(br#"{"type":"chat_message","content":""#).unwrap();
            for _ in 0..40 {
                thread::sleep(Duration::from_millis(20));
                if stream.write_all(b"x").is_err() {
                    break;
                }
            }
        });

        let started = Instant::now();
        assert!(matches!(
            b.recv_timeout(Duration::from_millis(150)),
            Err(SignalingError::Timeout(_))
        ));
        assert!(started.elapsed() < Duration::from_millis(500));
        trickle.join().unwrap();
        drop(a);
    }

    #[test]
    fn close_is_idempotent_and_wakes_reader() {
        let (a, b) = pair();
        let reader = b.try_clone().unwrap();
        let handle = thread::spawn(move || reader.recv());

        thread::sleep(Duration::from_millis(50));
        b.close();
        b.close();
        assert!(b.is_closed());
        assert!(matches!(b.send(&SignalingMessage::HangUp), Err(SignalingError::Closed)));

        let res = handle.join().unwrap();
        assert!(matches!(res, Ok(None) | Err(_)));
        drop(a);
    }
}

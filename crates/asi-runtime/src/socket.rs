//! Non-blocking client sockets toward the two peers.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use asi_protocol::{FRAME_LEN, Peer, ids};
use tracing::{debug, warn};

/// Connect deadline.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Health probe send deadline.
pub const PROBE_DEADLINE: Duration = Duration::from_millis(100);

/// Health probe latency budget; slower probes are reported.
pub const PROBE_LATENCY_BUDGET: Duration = Duration::from_millis(500);

/// One non-blocking receive attempt.
#[derive(Debug)]
pub enum RecvOutcome {
    /// A full 26-byte record arrived.
    Data([u8; FRAME_LEN]),
    /// Fewer than 26 bytes were available; the read is discarded.
    Short(usize),
    /// Nothing available.
    WouldBlock,
    /// Orderly close by the peer (0-byte read).
    Closed,
    /// Transport error.
    Error(io::Error),
}

/// Outcome of a health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Probe sent within its deadline and latency budget.
    Healthy,
    /// Probe sent, but slower than the latency budget.
    Degraded,
    /// Probe failed; the link is dead.
    Failed,
}

/// Shared handle to a peer socket.
///
/// RX receives, TX sends, Diagnostics reconnects and probes; each takes
/// the cell for the duration of one bounded operation and never while
/// holding a region monitor.
pub type SharedSocket = std::sync::Arc<parking_lot::Mutex<PeerSocket>>;

/// Client-side stream socket to one peer.
///
/// The socket is owned by the RX/TX pair through a shared cell;
/// Diagnostics reconnects and probes it. Never blocks outside
/// [`PeerSocket::connect`], which is bounded by [`CONNECT_TIMEOUT`].
#[derive(Debug)]
pub struct PeerSocket {
    peer: Peer,
    addr: SocketAddr,
    stream: Option<TcpStream>,
}

impl PeerSocket {
    /// Create an unconnected socket for `peer` at `addr`.
    pub fn new(peer: Peer, addr: SocketAddr) -> Self {
        Self {
            peer,
            addr,
            stream: None,
        }
    }

    /// The peer this socket talks to.
    pub fn peer(&self) -> Peer {
        self.peer
    }

    /// True when a stream is established.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Establish the stream, bounded by [`CONNECT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Propagates the connect failure; the socket stays unconnected.
    pub fn connect(&mut self) -> io::Result<()> {
        let stream = TcpStream::connect_timeout(&self.addr, CONNECT_TIMEOUT)?;
        stream.set_nonblocking(true)?;
        debug!(peer = %self.peer, addr = %self.addr, "peer connected");
        self.stream = Some(stream);
        Ok(())
    }

    /// Drop the stream.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(peer = %self.peer, "peer socket closed");
        }
    }

    /// Attempt to receive exactly one 26-byte record without blocking.
    pub fn try_recv_record(&mut self) -> RecvOutcome {
        let Some(stream) = self.stream.as_mut() else {
            return RecvOutcome::WouldBlock;
        };

        let mut buf = [0u8; FRAME_LEN];
        match stream.read(&mut buf) {
            Ok(0) => {
                self.close();
                RecvOutcome::Closed
            }
            Ok(n) if n == FRAME_LEN => RecvOutcome::Data(buf),
            Ok(n) => RecvOutcome::Short(n),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => RecvOutcome::WouldBlock,
            Err(err) => {
                self.close();
                RecvOutcome::Error(err)
            }
        }
    }

    /// Send one buffer, suppressing SIGPIPE.
    ///
    /// # Errors
    ///
    /// Propagates the transport failure; the caller decides whether to
    /// close.
    pub fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no stream"));
        };

        send_all(stream, bytes)
    }

    /// Send the 4-byte `PING` probe and classify the link health.
    pub fn probe(&mut self) -> ProbeOutcome {
        let started = Instant::now();
        match self.send(ids::HEALTH_PROBE) {
            Ok(()) => {
                let latency = started.elapsed();
                if latency > PROBE_LATENCY_BUDGET {
                    warn!(peer = %self.peer, ?latency, "health probe over latency budget");
                    ProbeOutcome::Degraded
                } else if latency > PROBE_DEADLINE {
                    warn!(peer = %self.peer, ?latency, "health probe over send deadline");
                    ProbeOutcome::Degraded
                } else {
                    ProbeOutcome::Healthy
                }
            }
            Err(err) => {
                warn!(peer = %self.peer, %err, "health probe failed");
                ProbeOutcome::Failed
            }
        }
    }
}

#[cfg(unix)]
fn send_all(stream: &mut TcpStream, bytes: &[u8]) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();
    let mut sent = 0usize;
    while sent < bytes.len() {
        // SAFETY: fd is a live socket owned by `stream`; the buffer
        // pointer and length describe the unsent tail of `bytes`.
        let rc = unsafe {
            libc::send(
                fd,
                bytes[sent..].as_ptr().cast(),
                bytes.len() - sent,
                libc::MSG_NOSIGNAL,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        sent += rc as usize;
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_all(stream: &mut TcpStream, bytes: &[u8]) -> io::Result<()> {
    use std::io::Write;
    stream.write_all(bytes)
}

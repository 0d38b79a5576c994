use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::socket::Socket;

const ACCEPT_POLL_STEP: Duration = Duration::from_millis(10);

/// Listening TCP socket that hands out connected [`Socket`]s.
pub struct TcpAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpAcceptor {
    /// Bind and listen on the given address.
    ///
    /// Binding to port 0 picks an ephemeral port; read it back through
    /// [`TcpAcceptor::local_addr`].
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let label = format!("{addr:?}");
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: label.clone(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: label,
            source: e,
        })?;

        info!(%local_addr, "listening on tcp socket");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<Socket> {
        self.listener
            .set_nonblocking(false)
            .map_err(TransportError::Accept)?;
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok(stream.into())
    }

    /// Accept a connection if one arrives within `wait`.
    ///
    /// Returns `Ok(None)` when the wait runs out, so callers can check a stop
    /// flag between attempts.
    pub fn accept_timeout(&self, wait: Duration) -> Result<Option<Socket>> {
        self.listener
            .set_nonblocking(true)
            .map_err(TransportError::Accept)?;
        let deadline = Instant::now() + wait;

        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false).map_err(TransportError::Accept)?;
                    debug!(%peer, "accepted connection");
                    return Ok(Some(stream.into()));
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(ACCEPT_POLL_STEP.min(deadline - now));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(TransportError::Accept(err)),
            }
        }
    }

    /// The address this acceptor is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

/// Connect to a listening TCP socket (blocking).
pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Socket> {
    let label = format!("{addr:?}");
    let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
        addr: label.clone(),
        source: e,
    })?;
    debug!(addr = %label, "connected to tcp socket");
    Ok(stream.into())
}

/// Connect with an upper bound on the time spent establishing the connection.
///
/// Every resolved address is tried in order; the last failure is returned.
pub fn connect_timeout(
    addr: impl ToSocketAddrs + std::fmt::Debug,
    timeout: Duration,
) -> Result<Socket> {
    let label = format!("{addr:?}");
    let candidates = addr
        .to_socket_addrs()
        .map_err(|e| TransportError::Connect {
            addr: label.clone(),
            source: e,
        })?;

    let mut last_err = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => {
                debug!(addr = %candidate, "connected to tcp socket");
                return Ok(stream.into());
            }
            Err(err) => last_err = Some(err),
        }
    }

    match last_err {
        Some(source) => Err(TransportError::Connect {
            addr: label,
            source,
        }),
        None => Err(TransportError::Resolve(label)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_accept_connect() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        let addr = acceptor.local_addr();

        let handle = std::thread::spawn(move || {
            let mut client = connect(addr).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = acceptor.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_timeout_roundtrip() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        let addr = acceptor.local_addr();

        let handle = std::thread::spawn(move || acceptor.accept().unwrap());
        let client = connect_timeout(addr, Duration::from_secs(2)).unwrap();
        let server = handle.join().unwrap();

        assert!(client.ensure_connected().is_ok());
        assert!(server.ensure_connected().is_ok());
        assert!(client.peer_label().starts_with("tcp:127.0.0.1:"));
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to obtain a port with no listener.
        let addr = TcpAcceptor::bind("127.0.0.1:0").unwrap().local_addr();
        let result = connect(addr);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_accept_timeout_gives_up_then_accepts() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();

        let started = Instant::now();
        assert!(acceptor.accept_timeout(Duration::from_millis(40)).unwrap().is_none());
        assert!(started.elapsed() >= Duration::from_millis(40));

        let addr = acceptor.local_addr();
        let handle = std::thread::spawn(move || {
            let mut client = connect(addr).unwrap();
            client.write_all(b"late").unwrap();
        });

        let mut server = acceptor
            .accept_timeout(Duration::from_secs(2))
            .unwrap()
            .expect("connection within the wait");
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"late");

        handle.join().unwrap();
    }

    #[test]
    fn test_bind_twice_fails() {
        let first = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        let result = TcpAcceptor::bind(first.local_addr());
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }
}

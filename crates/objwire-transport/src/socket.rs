use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::{Result, TransportError};

/// A connected stream socket. Implements `Read` and `Write`.
///
/// This is the transport handle a channel takes ownership of. Every clone made
/// through [`Socket::try_clone`] refers to the same underlying connection, so
/// a [`Socket::shutdown`] on any of them is observed by all.
pub struct Socket {
    inner: SocketInner,
}

enum SocketInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SocketInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            SocketInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SocketInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            SocketInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            SocketInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            SocketInner::Unix(stream) => stream.flush(),
        }
    }
}

impl From<TcpStream> for Socket {
    fn from(stream: TcpStream) -> Self {
        Self {
            inner: SocketInner::Tcp(stream),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for Socket {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: SocketInner::Unix(stream),
        }
    }
}

impl Socket {
    /// Create a pair of connected, unnamed Unix sockets.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((left.into(), right.into()))
    }

    /// Verify the handle still refers to a connected peer.
    ///
    /// Returns [`TransportError::NotConnected`] when the OS reports no peer.
    pub fn ensure_connected(&self) -> Result<()> {
        let outcome = match &self.inner {
            SocketInner::Tcp(stream) => stream.peer_addr().map(|_| ()),
            #[cfg(unix)]
            SocketInner::Unix(stream) => stream.peer_addr().map(|_| ()),
        };
        outcome.map_err(TransportError::NotConnected)
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            SocketInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            SocketInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            SocketInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            SocketInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Disable Nagle's algorithm. A no-op for Unix sockets.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        match &self.inner {
            SocketInner::Tcp(stream) => stream.set_nodelay(nodelay).map_err(Into::into),
            #[cfg(unix)]
            SocketInner::Unix(_) => {
                let _ = nodelay;
                Ok(())
            }
        }
    }

    /// Try to clone this socket (creates a new descriptor for the same connection).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            SocketInner::Tcp(stream) => Ok(stream.try_clone()?.into()),
            #[cfg(unix)]
            SocketInner::Unix(stream) => Ok(stream.try_clone()?.into()),
        }
    }

    /// Shut down the read half, the write half, or both.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        match &self.inner {
            SocketInner::Tcp(stream) => stream.shutdown(how).map_err(Into::into),
            #[cfg(unix)]
            SocketInner::Unix(stream) => stream.shutdown(how).map_err(Into::into),
        }
    }

    /// Human-readable peer description for diagnostics.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            SocketInner::Tcp(stream) => match stream.peer_addr() {
                Ok(addr) => format!("tcp:{addr}"),
                Err(_) => "tcp:<disconnected>".to_string(),
            },
            #[cfg(unix)]
            SocketInner::Unix(stream) => match stream.peer_addr() {
                Ok(addr) => match addr.as_pathname() {
                    Some(path) => format!("unix:{}", path.display()),
                    None => "unix:<unnamed>".to_string(),
                },
                Err(_) => "unix:<disconnected>".to_string(),
            },
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            SocketInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            SocketInner::Unix(_) => "unix-domain-socket",
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("type", &self.transport_name())
            .field("peer", &self.peer_label())
            .finish()
    }
}

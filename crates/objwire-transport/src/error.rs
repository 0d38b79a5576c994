use std::io;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot listen on {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    /// Every resolved address for `addr` refused or timed out; `source` is
    /// the last failure.
    #[error("cannot reach {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("accept failed: {0}")]
    Accept(io::Error),

    #[error("{0} resolved to no socket address")]
    Resolve(String),

    /// The socket has no peer, so it cannot carry a channel.
    #[error("socket has no connected peer: {0}")]
    NotConnected(io::Error),

    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

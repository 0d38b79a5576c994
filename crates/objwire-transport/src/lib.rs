//! Connected stream socket handle.
//!
//! The lowest layer of objwire. A [`Socket`] is a connected, bidirectional
//! byte stream (TCP everywhere, Unix domain sockets on Unix). Channels never
//! initiate connections themselves; the helpers in [`tcp`] exist for callers
//! and tests that need one.

pub mod error;
pub mod socket;
pub mod tcp;

pub use error::{Result, TransportError};
pub use socket::Socket;
pub use tcp::{connect, connect_timeout, TcpAcceptor};

//! Typed object channel over a connected socket.
//!
//! A [`Channel`] sends and receives serde values, not bytes. Each value is
//! encoded as a type-tagged JSON envelope, optionally encrypted with a
//! shared [`Password`], and written as one length-prefixed frame.
//!
//! ```no_run
//! use objwire_channel::{connect, Password};
//!
//! let channel = connect("127.0.0.1:7070")?;
//! channel.write(&[1, 2, 3]);
//! let reply: String = channel.read();
//!
//! let password = Password::new("s3cret")?;
//! channel.write_one_with(&password, "for your eyes only");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Failures are silent by default
//!
//! **`read` returns `T::default()` and `write` does nothing when anything
//! goes wrong**: a malformed frame, a type mismatch, a wrong password, a
//! closed connection. A default value from `read` is indistinguishable
//! from a peer that really sent the default. Tests and integrations that
//! need to tell the two apart must use the `try_*` methods or install
//! [`ChannelConfig::on_error`].
//!
//! # Command handler
//!
//! A channel may carry one background worker, bound with
//! [`ChannelBuilder::handler`] and started with [`Channel::start_handler`].
//! Stopping (or disposing) cancels the worker's [`HandlerContext`] token and
//! waits for the thread to end.

pub mod channel;
pub mod config;
pub mod connector;
pub mod endpoint;
pub mod error;
pub mod handler;

pub use channel::{Channel, ChannelBuilder};
pub use config::{ChannelConfig, ErrorHook, Ownership, DEFAULT_POLL_INTERVAL};
pub use connector::{connect, connect_timeout, connect_with_config, ChannelListener};
pub use endpoint::{Batch, Endpoint};
pub use error::{ChannelError, Result};
pub use handler::{HandlerContext, HandlerSlot};

pub use objwire_codec::{CodecConfig, TypeIdentity, TypeRegistry};
pub use objwire_crypto::Password;
pub use objwire_transport::Socket;
pub use tokio_util::sync::CancellationToken;

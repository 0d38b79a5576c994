//! Typed, optionally encrypted object channels over connected sockets.
//!
//! objwire sends serde values between two peers: each value becomes a
//! type-tagged JSON envelope, optionally sealed with a shared password, and
//! travels as one length-prefixed frame.
//!
//! # Crate Structure
//!
//! - [`transport`]: connected socket handle, TCP helpers
//! - [`frame`]: length-prefixed text framing
//! - [`codec`]: type-tagged JSON envelope, type registry, value adapters
//! - [`crypto`]: password-based payload encryption
//! - [`channel`]: the typed channel, its lifecycle and command handler
//!
//! The most used channel types are re-exported at the root.
//!
//! **Reads and writes swallow errors by default.** A failed `read` returns
//! `T::default()`; see [`Channel`] for the details and the `try_*`
//! alternatives.

/// Re-export transport types.
pub mod transport {
    pub use objwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use objwire_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use objwire_codec::*;
}

/// Re-export crypto types.
pub mod crypto {
    pub use objwire_crypto::*;
}

/// Re-export channel types.
pub mod channel {
    pub use objwire_channel::*;
}

pub use objwire_channel::{
    connect, connect_with_config, Channel, ChannelBuilder, ChannelConfig, ChannelError,
    ChannelListener, Endpoint, HandlerContext, Ownership,
};
pub use objwire_codec::{CodecConfig, TypeIdentity, TypeRegistry};
pub use objwire_crypto::Password;
pub use objwire_transport::Socket;

//! Type-tagged JSON value codec.
//!
//! Values are encoded as a compact JSON envelope that records the value's
//! type tag next to its data:
//!
//! ```text
//! {"$type":"Ping","$value":{"seq":7}}
//! ```
//!
//! The tag lets a [`TypeRegistry`] rebuild the concrete type behind a trait
//! object, and lets [`ValueAdapter`]s rewrite values that do not serialize
//! well through default rules (network addresses, see [`NetAddressAdapter`]).
//!
//! Both peers must use the same [`CodecConfig`]; mismatched settings make
//! polymorphic and adapted values fail to decode.

pub mod adapter;
pub mod codec;
pub mod config;
pub mod error;
pub mod net;
pub mod registry;
pub mod tag;

pub use adapter::ValueAdapter;
pub use codec::{Codec, Envelope, TYPE_KEY, VALUE_KEY};
pub use config::{CodecConfig, TypeIdentity};
pub use error::{CodecError, Result};
pub use net::{AddressFamily, NetAddress, NetAddressAdapter};
pub use registry::TypeRegistry;
pub use tag::{simplify_type_name, type_tag};

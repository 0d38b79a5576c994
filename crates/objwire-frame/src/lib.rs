//! Length-prefixed text framing.
//!
//! Every encoded value travels as one frame:
//! - A 2-byte magic number ("OW") for stream synchronization
//! - A 4-byte little-endian payload length
//! - The payload, which must be valid UTF-8
//!
//! A reader never needs to know value boundaries in advance.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAGIC};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

use serde_json::Value;

use crate::error::Result;

/// Rewrites the JSON form of values whose default serde representation is
/// unsuitable for the wire.
///
/// Adapters are looked up by type tag on both sides: `to_wire` runs after a
/// value is serialized, `from_wire` runs before it is deserialized.
pub trait ValueAdapter: Send + Sync {
    /// Adapter name for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this adapter handles values carrying `tag`.
    fn handles(&self, tag: &str) -> bool;

    /// Convert the serde representation into the wire representation.
    fn to_wire(&self, tag: &str, value: Value) -> Result<Value>;

    /// Convert the wire representation back into the serde representation.
    fn from_wire(&self, tag: &str, value: Value) -> Result<Value>;
}

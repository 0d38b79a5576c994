use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::adapter::ValueAdapter;
use crate::net::NetAddressAdapter;
use crate::tag::{rust_type_name, type_tag};

/// How much of a type's path is recorded in its type tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TypeIdentity {
    /// Module paths stripped: `my_app::cmd::Ping` becomes `Ping`.
    #[default]
    Simple,
    /// The full Rust type path.
    Full,
}

/// Codec settings, fixed when a channel is built.
///
/// Both peers must use identical settings.
#[derive(Clone)]
pub struct CodecConfig {
    /// Emit compact JSON (no pretty-printing). Default: true.
    pub compact: bool,
    /// Wrap every value in a type-tagged envelope. Default: true.
    pub preserve_types: bool,
    /// Form of the type tag. Default: [`TypeIdentity::Simple`].
    pub type_identity: TypeIdentity,
    /// Extra adapters consulted by tag. Default: [`NetAddressAdapter`].
    pub adapters: Vec<Arc<dyn ValueAdapter>>,
    /// Explicit tags keyed by Rust type name; see [`CodecConfig::with_tag`].
    pub tags: BTreeMap<String, String>,
}

impl CodecConfig {
    /// Append an adapter. Earlier adapters win when several handle one tag.
    pub fn with_adapter(mut self, adapter: impl ValueAdapter + 'static) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    /// Record `T` under a fixed tag instead of its derived type name.
    ///
    /// Fixed tags survive renames and module moves. The reading side needs
    /// the same mapping, and registries must use
    /// [`TypeRegistry::register_as`](crate::TypeRegistry::register_as) with
    /// the same tag. Adapters see the fixed tag.
    pub fn with_tag<T: ?Sized>(mut self, tag: impl Into<String>) -> Self {
        self.tags
            .insert(rust_type_name::<T>().to_string(), tag.into());
        self
    }

    /// The tag `T` is written under.
    pub fn tag_for<T: ?Sized>(&self) -> String {
        match self.tags.get(rust_type_name::<T>()) {
            Some(tag) => tag.clone(),
            None => type_tag::<T>(self.type_identity),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compact: true,
            preserve_types: true,
            type_identity: TypeIdentity::Simple,
            adapters: vec![Arc::new(NetAddressAdapter)],
            tags: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for CodecConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let adapters: Vec<&str> = self.adapters.iter().map(|a| a.name()).collect();
        f.debug_struct("CodecConfig")
            .field("compact", &self.compact)
            .field("preserve_types", &self.preserve_types)
            .field("type_identity", &self.type_identity)
            .field("adapters", &adapters)
            .field("tags", &self.tags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Heartbeat;

    #[test]
    fn fixed_tag_overrides_derived_name() {
        let config = CodecConfig::default().with_tag::<Heartbeat>("hb.v1");
        assert_eq!(config.tag_for::<Heartbeat>(), "hb.v1");
        assert_eq!(config.tag_for::<&Heartbeat>(), "hb.v1");
        assert_eq!(config.tag_for::<u8>(), "u8");
    }

    #[test]
    fn debug_lists_adapters_and_tags() {
        let config = CodecConfig::default().with_tag::<Heartbeat>("hb.v1");
        let debug = format!("{config:?}");
        assert!(debug.contains("net-address"));
        assert!(debug.contains("hb.v1"));
    }
}

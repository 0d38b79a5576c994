use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::adapter::ValueAdapter;
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::registry::TypeRegistry;

/// Envelope key holding the type tag.
pub const TYPE_KEY: &str = "$type";
/// Envelope key holding the value.
pub const VALUE_KEY: &str = "$value";

/// A decoded envelope: type tag plus the value in its wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "$type")]
    pub type_tag: String,
    #[serde(rename = "$value")]
    pub value: Value,
}

/// Encodes values to text and back according to a [`CodecConfig`].
#[derive(Debug, Clone, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Serialize `value` to envelope text.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let tag = self.config.tag_for::<T>();
        let mut json = serde_json::to_value(value)?;

        if let Some(adapter) = self.adapter_for(&tag) {
            trace!(adapter = adapter.name(), tag = %tag, "adapting value for wire");
            json = adapter.to_wire(&tag, json)?;
        }

        let out = if self.config.preserve_types {
            Value::Object(
                [
                    (TYPE_KEY.to_string(), Value::String(tag)),
                    (VALUE_KEY.to_string(), json),
                ]
                .into_iter()
                .collect(),
            )
        } else {
            json
        };

        let text = if self.config.compact {
            serde_json::to_string(&out)?
        } else {
            serde_json::to_string_pretty(&out)?
        };
        Ok(text)
    }

    /// Deserialize text produced by [`Codec::encode`] as `T`.
    ///
    /// The envelope tag selects the adapter but is not compared with `T`;
    /// a value of the wrong shape fails in serde instead.
    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        let (tag, json) = if self.config.preserve_types {
            let envelope = self.decode_envelope(text)?;
            (envelope.type_tag, envelope.value)
        } else {
            (self.config.tag_for::<T>(), serde_json::from_str(text)?)
        };

        let json = self.from_wire(&tag, json)?;
        Ok(serde_json::from_value(json)?)
    }

    /// Rebuild whichever registered concrete type the envelope names.
    pub fn decode_polymorphic<B: ?Sized + 'static>(
        &self,
        text: &str,
        registry: &TypeRegistry<B>,
    ) -> Result<Box<B>> {
        if !self.config.preserve_types {
            return Err(CodecError::TagsDisabled);
        }

        let envelope = self.decode_envelope(text)?;
        let json = self.from_wire(&envelope.type_tag, envelope.value)?;
        registry.construct(&envelope.type_tag, json)
    }

    /// Split envelope text into its tag and still-adapted value.
    pub fn decode_envelope(&self, text: &str) -> Result<Envelope> {
        let mut json: Value = serde_json::from_str(text)?;
        let object = json
            .as_object_mut()
            .ok_or(CodecError::MissingField(TYPE_KEY))?;

        let type_tag = match object.remove(TYPE_KEY) {
            Some(Value::String(tag)) => tag,
            _ => return Err(CodecError::MissingField(TYPE_KEY)),
        };
        let value = object
            .remove(VALUE_KEY)
            .ok_or(CodecError::MissingField(VALUE_KEY))?;

        Ok(Envelope { type_tag, value })
    }

    fn from_wire(&self, tag: &str, json: Value) -> Result<Value> {
        match self.adapter_for(tag) {
            Some(adapter) => adapter.from_wire(tag, json),
            None => Ok(json),
        }
    }

    fn adapter_for(&self, tag: &str) -> Option<&dyn ValueAdapter> {
        self.config
            .adapters
            .iter()
            .find(|adapter| adapter.handles(tag))
            .map(|adapter| adapter.as_ref())
    }
}

/// Errors that can occur while encoding or decoding values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The text is valid JSON but not a typed envelope.
    #[error("missing envelope field '{0}'")]
    MissingField(&'static str),

    /// No registry entry matches the envelope's type tag.
    #[error("no type registered for tag '{0}'")]
    UnknownType(String),

    /// Polymorphic decoding needs type tags on the wire.
    #[error("type tags are disabled in the codec configuration")]
    TagsDisabled,

    /// A value adapter rejected the value.
    #[error("adapter '{adapter}' failed for '{tag}': {message}")]
    Adapter {
        adapter: &'static str,
        tag: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, CodecError>;

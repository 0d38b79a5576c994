/// Errors that can occur in channel operations.
///
/// The default-returning `read`/`write` methods never surface these; they
/// are visible through the `try_*` methods and the diagnostics hook.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The socket handed to the constructor is not usable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] objwire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] objwire_frame::FrameError),

    /// Value encoding or decoding error.
    #[error("codec error: {0}")]
    Codec(#[from] objwire_codec::CodecError),

    /// Encryption or decryption error.
    #[error("crypto error: {0}")]
    Crypto(#[from] objwire_crypto::CryptoError),

    /// The channel was disposed.
    #[error("channel disposed")]
    Disposed,

    /// The channel was disconnected or the peer closed the connection.
    #[error("channel disconnected")]
    Disconnected,

    /// The operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    /// `start` was called on a slot with no bound worker.
    #[error("no command handler bound to this channel")]
    NoHandler,

    /// The bound worker was already started once.
    #[error("command handler already started; it cannot be restarted")]
    HandlerConsumed,

    /// The worker panicked; the panic was contained at join.
    #[error("command handler panicked: {0}")]
    HandlerPanicked(String),

    /// The OS refused to spawn the worker thread.
    #[error("failed to spawn command handler thread: {0}")]
    HandlerSpawn(#[source] std::io::Error),

    /// A multi-value write failed after some values were flushed.
    #[error("write failed after {delivered} value(s) were delivered: {source}")]
    Partial {
        delivered: usize,
        #[source]
        source: Box<ChannelError>,
    },
}

impl ChannelError {
    /// Number of values flushed before a write failed.
    pub fn delivered(&self) -> usize {
        match self {
            Self::Partial { delivered, .. } => *delivered,
            _ => 0,
        }
    }

    /// Whether the error means the connection is gone for good.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Disposed | Self::Disconnected => true,
            Self::Frame(objwire_frame::FrameError::ConnectionClosed) => true,
            Self::Partial { source, .. } => source.is_disconnect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;

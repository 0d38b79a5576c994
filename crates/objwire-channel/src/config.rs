use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use objwire_codec::CodecConfig;
use objwire_frame::DEFAULT_MAX_PAYLOAD;

use crate::error::ChannelError;

/// Default interval at which blocked reads re-check for cancellation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Observer for errors the data path swallows.
pub type ErrorHook = Arc<dyn Fn(&ChannelError) + Send + Sync>;

/// Whether the channel owns the connection it was given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ownership {
    /// Closing the channel shuts the connection down for every handle.
    #[default]
    Owned,
    /// Closing the channel only releases its own handles; the caller's
    /// clones of the socket stay usable.
    Shared,
}

/// Channel behavior configuration.
#[derive(Clone)]
pub struct ChannelConfig {
    /// How often a blocked read wakes to check for cancellation. Must be
    /// non-zero. Default: 50 ms.
    pub poll_interval: Duration,
    /// Upper bound on a single blocked socket write. Default: none.
    pub write_timeout: Option<Duration>,
    /// Largest frame payload accepted or sent. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Codec settings; both peers must agree.
    pub codec: CodecConfig,
    /// Called with every error that `read`/`write` swallow.
    pub on_error: Option<ErrorHook>,
}

impl ChannelConfig {
    /// Install a diagnostics hook for swallowed errors.
    pub fn with_error_hook(mut self, hook: impl Fn(&ChannelError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            write_timeout: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            codec: CodecConfig::default(),
            on_error: None,
        }
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("poll_interval", &self.poll_interval)
            .field("write_timeout", &self.write_timeout)
            .field("max_payload_size", &self.max_payload_size)
            .field("codec", &self.codec)
            .field("on_error", &self.on_error.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

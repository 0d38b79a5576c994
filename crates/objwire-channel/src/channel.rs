use std::sync::Mutex;
use std::time::Duration;

use objwire_codec::{Codec, CodecConfig, TypeRegistry};
use objwire_crypto::Password;
use objwire_frame::{FrameConfig, FrameReader, FrameWriter};
use objwire_transport::Socket;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ChannelConfig, Ownership};
use crate::endpoint::{lock, Batch, Endpoint, EndpointParts};
use crate::error::{ChannelError, Result};
use crate::handler::{HandlerContext, HandlerSlot};

/// Typed object channel over one connected socket.
///
/// Every value travels as one length-prefixed text frame holding its
/// type-tagged JSON encoding, optionally encrypted with a [`Password`].
///
/// # Silent failures
///
/// `read*` and `write*` never report errors. A read that fails for any
/// reason (decode error, wrong password, closed connection, disposal)
/// returns `T::default()`, which looks exactly like the peer sending the
/// default value. Use the `try_*` methods or
/// [`ChannelConfig::on_error`] when the difference matters.
///
/// # Lifecycle
///
/// [`Channel::dispose`] is terminal and idempotent; dropping the channel
/// disposes it. [`Channel::disconnect`] releases the connection without
/// marking the channel disposed.
pub struct Channel {
    endpoint: Endpoint,
    handler: Mutex<HandlerSlot>,
}

impl Channel {
    /// Wrap a connected socket with default configuration and no handler.
    pub fn new(socket: Socket, ownership: Ownership) -> Result<Self> {
        Self::with_config(socket, ownership, ChannelConfig::default())
    }

    pub fn with_config(socket: Socket, ownership: Ownership, config: ChannelConfig) -> Result<Self> {
        Self::assemble(socket, ownership, config, HandlerSlot::empty())
    }

    /// Configure a channel step by step, optionally binding a handler.
    pub fn builder(socket: Socket) -> ChannelBuilder {
        ChannelBuilder {
            socket,
            ownership: Ownership::default(),
            config: ChannelConfig::default(),
            handler: HandlerSlot::empty(),
        }
    }

    fn assemble(
        socket: Socket,
        ownership: Ownership,
        config: ChannelConfig,
        handler: HandlerSlot,
    ) -> Result<Self> {
        if config.poll_interval.is_zero() {
            return Err(ChannelError::InvalidArgument(
                "poll interval must be non-zero".to_string(),
            ));
        }
        socket
            .ensure_connected()
            .map_err(|err| ChannelError::InvalidArgument(format!("socket is not connected: {err}")))?;

        let frame_config = FrameConfig {
            max_payload_size: config.max_payload_size,
            read_timeout: Some(config.poll_interval),
            write_timeout: config.write_timeout,
        };
        let reader = socket
            .try_clone()
            .map_err(ChannelError::from)
            .and_then(|s| Ok(FrameReader::with_config_socket(s, frame_config.clone())?))
            .map_err(|err| ChannelError::InvalidArgument(format!("input stream unavailable: {err}")))?;
        let writer = socket
            .try_clone()
            .map_err(ChannelError::from)
            .and_then(|s| Ok(FrameWriter::with_config_socket(s, frame_config)?))
            .map_err(|err| ChannelError::InvalidArgument(format!("output stream unavailable: {err}")))?;

        let endpoint = Endpoint::from_parts(EndpointParts {
            reader,
            writer,
            control: socket,
            codec: Codec::new(config.codec),
            ownership,
            on_error: config.on_error,
        });
        debug!(peer = %endpoint.peer(), ?ownership, "channel opened");

        Ok(Self {
            endpoint,
            handler: Mutex::new(handler),
        })
    }

    /// Shared view for code that reads or writes from other threads.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn peer(&self) -> &str {
        self.endpoint.peer()
    }

    pub fn is_connected(&self) -> bool {
        self.endpoint.is_connected()
    }

    pub fn is_disposed(&self) -> bool {
        self.endpoint.is_disposed()
    }

    /// Read one value, or `T::default()` on any failure (see type docs).
    pub fn read<T: DeserializeOwned + Default>(&self) -> T {
        self.endpoint.read()
    }

    /// Read and decrypt one value, or `T::default()` on any failure.
    pub fn read_with<T: DeserializeOwned + Default>(&self, password: &Password) -> T {
        self.endpoint.read_with(password)
    }

    pub fn try_read<T: DeserializeOwned>(&self) -> Result<T> {
        self.endpoint.try_read()
    }

    pub fn try_read_with<T: DeserializeOwned>(&self, password: &Password) -> Result<T> {
        self.endpoint.try_read_with(password)
    }

    /// Read one value back as the concrete type named by its tag.
    pub fn read_polymorphic<B: ?Sized + 'static>(&self, registry: &TypeRegistry<B>) -> Option<Box<B>> {
        self.endpoint.read_polymorphic(registry)
    }

    pub fn read_polymorphic_with<B: ?Sized + 'static>(
        &self,
        registry: &TypeRegistry<B>,
        password: &Password,
    ) -> Option<Box<B>> {
        self.endpoint.read_polymorphic_with(registry, password)
    }

    pub fn try_read_polymorphic<B: ?Sized + 'static>(
        &self,
        registry: &TypeRegistry<B>,
    ) -> Result<Box<B>> {
        self.endpoint.try_read_polymorphic(registry)
    }

    /// Write values in order, one flushed frame each. Errors are swallowed.
    pub fn write<T: Serialize>(&self, values: &[T]) {
        self.endpoint.write(values)
    }

    pub fn write_with<T: Serialize>(&self, password: &Password, values: &[T]) {
        self.endpoint.write_with(password, values)
    }

    pub fn write_one<T: Serialize + ?Sized>(&self, value: &T) {
        self.endpoint.write_one(value)
    }

    pub fn write_one_with<T: Serialize + ?Sized>(&self, password: &Password, value: &T) {
        self.endpoint.write_one_with(password, value)
    }

    pub fn try_write<T: Serialize>(&self, values: &[T]) -> Result<usize> {
        self.endpoint.try_write(values)
    }

    pub fn try_write_with<T: Serialize>(&self, password: &Password, values: &[T]) -> Result<usize> {
        self.endpoint.try_write_with(password, values)
    }

    pub fn batch(&self) -> Batch<'_> {
        self.endpoint.batch()
    }

    pub fn batch_with<'a>(&'a self, password: &'a Password) -> Batch<'a> {
        self.endpoint.batch_with(password)
    }

    /// Start the handler bound at construction.
    pub fn start_handler(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ChannelError::Disposed);
        }
        lock(&self.handler).start(self.endpoint.clone())
    }

    /// Cancel the handler and wait for it to end. A no-op when not running.
    pub fn stop_handler(&self) -> Result<()> {
        lock(&self.handler).stop()
    }

    pub fn handler_running(&self) -> bool {
        lock(&self.handler).is_running()
    }

    /// Stop the handler and release the connection, leaving the channel
    /// undisposed. Later reads return defaults and writes do nothing.
    pub fn disconnect(&self) {
        self.teardown("disconnect");
    }

    /// Stop the handler and release every resource. Idempotent.
    pub fn dispose(&self) {
        if self.endpoint.mark_disposed() {
            self.teardown("dispose");
        }
    }

    fn teardown(&self, reason: &'static str) {
        if let Err(err) = self.stop_handler() {
            warn!(peer = %self.endpoint.peer(), reason, error = %err, "command handler ended badly");
        }
        self.endpoint.close();
        debug!(peer = %self.endpoint.peer(), reason, "channel closed");
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("endpoint", &self.endpoint)
            .field("handler", &*lock(&self.handler))
            .finish()
    }
}

/// Builder for [`Channel`].
pub struct ChannelBuilder {
    socket: Socket,
    ownership: Ownership,
    config: ChannelConfig,
    handler: HandlerSlot,
}

impl ChannelBuilder {
    pub fn ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn codec(mut self, codec: CodecConfig) -> Self {
        self.config.codec = codec;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config.poll_interval = poll_interval;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = Some(timeout);
        self
    }

    pub fn max_payload_size(mut self, max: usize) -> Self {
        self.config.max_payload_size = max;
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&ChannelError) + Send + Sync + 'static) -> Self {
        self.config = self.config.with_error_hook(hook);
        self
    }

    /// Bind the command handler. It stays dormant until
    /// [`Channel::start_handler`].
    pub fn handler(mut self, worker: impl FnOnce(HandlerContext) + Send + 'static) -> Self {
        self.handler = HandlerSlot::bound(worker);
        self
    }

    pub fn build(self) -> Result<Channel> {
        Channel::assemble(self.socket, self.ownership, self.config, self.handler)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn zero_poll_interval_rejected() {
        let (left, _right) = Socket::pair().unwrap();
        let err = Channel::builder(left)
            .poll_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidArgument(_)));
    }

    #[test]
    fn debug_shows_state() {
        let (left, _right) = Socket::pair().unwrap();
        let channel = Channel::builder(left).handler(|_ctx| {}).build().unwrap();
        let debug = format!("{channel:?}");
        assert!(debug.contains("bound"));
        assert!(debug.contains("unix:"));
    }

    #[test]
    fn dispose_marks_and_closes() {
        let (left, _right) = Socket::pair().unwrap();
        let channel = Channel::new(left, Ownership::Owned).unwrap();
        channel.dispose();
        assert!(channel.is_disposed());
        assert!(!channel.is_connected());
        assert!(matches!(channel.start_handler(), Err(ChannelError::Disposed)));
    }
}

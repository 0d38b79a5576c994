use std::io::ErrorKind;
use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use objwire_codec::{Codec, TypeRegistry};
use objwire_crypto::Password;
use objwire_frame::{FrameError, FrameReader, FrameWriter};
use objwire_transport::Socket;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::{ErrorHook, Ownership};
use crate::error::{ChannelError, Result};

/// Shared read/write view of one connection.
///
/// Cloning is cheap; every clone talks to the same socket. Each direction has
/// its own lock, so one reader and one writer never wait on each other,
/// while concurrent readers (or writers) take turns one frame (or one
/// multi-value write) at a time.
///
/// Like the [`Channel`](crate::Channel) methods, `read*` and `write*` swallow
/// errors: a failed read returns `T::default()` and a failed write does
/// nothing. Use the `try_*` methods to see the error.
#[derive(Clone)]
pub struct Endpoint {
    shared: Arc<Shared>,
    // Extra stop signal for reads made through this clone only.
    scope: Option<CancellationToken>,
}

struct Shared {
    reader: Mutex<Option<FrameReader<Socket>>>,
    writer: Mutex<Option<FrameWriter<Socket>>>,
    control: Mutex<Option<Socket>>,
    codec: Codec,
    ownership: Ownership,
    closed: CancellationToken,
    disposed: AtomicBool,
    connected: AtomicBool,
    on_error: Option<ErrorHook>,
    peer: String,
}

pub(crate) struct EndpointParts {
    pub(crate) reader: FrameReader<Socket>,
    pub(crate) writer: FrameWriter<Socket>,
    pub(crate) control: Socket,
    pub(crate) codec: Codec,
    pub(crate) ownership: Ownership,
    pub(crate) on_error: Option<ErrorHook>,
}

impl Endpoint {
    pub(crate) fn from_parts(parts: EndpointParts) -> Self {
        let peer = parts.control.peer_label();
        Self {
            shared: Arc::new(Shared {
                reader: Mutex::new(Some(parts.reader)),
                writer: Mutex::new(Some(parts.writer)),
                control: Mutex::new(Some(parts.control)),
                codec: parts.codec,
                ownership: parts.ownership,
                closed: CancellationToken::new(),
                disposed: AtomicBool::new(false),
                connected: AtomicBool::new(true),
                on_error: parts.on_error,
                peer,
            }),
            scope: None,
        }
    }

    /// A clone whose reads also end with [`ChannelError::Cancelled`] once
    /// `token` is cancelled.
    pub(crate) fn scoped(&self, token: CancellationToken) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            scope: Some(token),
        }
    }

    /// Read one value, or `T::default()` on any failure.
    ///
    /// A default result is indistinguishable from a peer that sent the
    /// default value.
    pub fn read<T: DeserializeOwned + Default>(&self) -> T {
        self.try_read()
            .unwrap_or_else(|err| self.swallow("read", err))
    }

    /// Read and decrypt one value, or `T::default()` on any failure,
    /// including a wrong password.
    pub fn read_with<T: DeserializeOwned + Default>(&self, password: &Password) -> T {
        self.try_read_with(password)
            .unwrap_or_else(|err| self.swallow("read", err))
    }

    pub fn try_read<T: DeserializeOwned>(&self) -> Result<T> {
        self.receive(None, None)
    }

    pub fn try_read_with<T: DeserializeOwned>(&self, password: &Password) -> Result<T> {
        self.receive(Some(password), None)
    }

    /// Read one value as whichever registered concrete type its tag names.
    pub fn read_polymorphic<B: ?Sized + 'static>(&self, registry: &TypeRegistry<B>) -> Option<Box<B>> {
        self.try_read_polymorphic(registry)
            .map_err(|err| self.swallow::<()>("read", err))
            .ok()
    }

    pub fn read_polymorphic_with<B: ?Sized + 'static>(
        &self,
        registry: &TypeRegistry<B>,
        password: &Password,
    ) -> Option<Box<B>> {
        self.try_read_polymorphic_with(registry, password)
            .map_err(|err| self.swallow::<()>("read", err))
            .ok()
    }

    pub fn try_read_polymorphic<B: ?Sized + 'static>(
        &self,
        registry: &TypeRegistry<B>,
    ) -> Result<Box<B>> {
        self.receive_polymorphic(registry, None, None)
    }

    pub fn try_read_polymorphic_with<B: ?Sized + 'static>(
        &self,
        registry: &TypeRegistry<B>,
        password: &Password,
    ) -> Result<Box<B>> {
        self.receive_polymorphic(registry, Some(password), None)
    }

    /// Write each value as its own frame, in order, flushing after each.
    ///
    /// Errors are swallowed. Values written before a failure stay delivered.
    pub fn write<T: Serialize>(&self, values: &[T]) {
        if let Err(err) = self.try_write(values) {
            self.swallow::<()>("write", err);
        }
    }

    /// Like [`Endpoint::write`], encrypting each value first.
    pub fn write_with<T: Serialize>(&self, password: &Password, values: &[T]) {
        if let Err(err) = self.try_write_with(password, values) {
            self.swallow::<()>("write", err);
        }
    }

    pub fn write_one<T: Serialize + ?Sized>(&self, value: &T) {
        self.batch().push(value).send();
    }

    pub fn write_one_with<T: Serialize + ?Sized>(&self, password: &Password, value: &T) {
        self.batch_with(password).push(value).send();
    }

    /// Write values and report how many were flushed.
    ///
    /// If some values were delivered before the failure, the error is
    /// [`ChannelError::Partial`].
    pub fn try_write<T: Serialize>(&self, values: &[T]) -> Result<usize> {
        self.send_encoded(values.iter().map(|value| self.encode(value, None)))
    }

    pub fn try_write_with<T: Serialize>(&self, password: &Password, values: &[T]) -> Result<usize> {
        self.send_encoded(values.iter().map(|value| self.encode(value, Some(password))))
    }

    /// Start an ordered write of values of different types.
    ///
    /// ```no_run
    /// # fn demo(endpoint: &objwire_channel::Endpoint) {
    /// endpoint.batch().push(&1u32).push("two").push(&3.0f64).send();
    /// # }
    /// ```
    pub fn batch(&self) -> Batch<'_> {
        Batch {
            endpoint: self,
            password: None,
            frames: Vec::new(),
        }
    }

    /// Start an ordered, encrypted write of values of different types.
    pub fn batch_with<'a>(&'a self, password: &'a Password) -> Batch<'a> {
        Batch {
            endpoint: self,
            password: Some(password),
            frames: Vec::new(),
        }
    }

    /// Whether the connection is believed to be open.
    ///
    /// Turns false after a disconnect, disposal, or when the peer closes.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire) && !self.shared.closed.is_cancelled()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// Peer description for diagnostics, captured at construction.
    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    pub fn codec(&self) -> &Codec {
        &self.shared.codec
    }

    pub(crate) fn closed_token(&self) -> &CancellationToken {
        &self.shared.closed
    }

    /// Mark disposed. Returns false if it already was.
    pub(crate) fn mark_disposed(&self) -> bool {
        !self.shared.disposed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn receive<T: DeserializeOwned>(
        &self,
        password: Option<&Password>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T> {
        let text = self.receive_text(password, cancel)?;
        Ok(self.shared.codec.decode(&text)?)
    }

    pub(crate) fn receive_polymorphic<B: ?Sized + 'static>(
        &self,
        registry: &TypeRegistry<B>,
        password: Option<&Password>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Box<B>> {
        let text = self.receive_text(password, cancel)?;
        Ok(self.shared.codec.decode_polymorphic(&text, registry)?)
    }

    fn receive_text(
        &self,
        password: Option<&Password>,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let text = self.recv_frame(cancel)?;
        match password {
            Some(password) => Ok(objwire_crypto::decrypt(&text, password)?),
            None => Ok(text),
        }
    }

    fn recv_frame(&self, cancel: Option<&CancellationToken>) -> Result<String> {
        self.ensure_live()?;
        let mut guard = lock(&self.shared.reader);

        loop {
            if self.shared.closed.is_cancelled() {
                return Err(self.closed_error());
            }
            if cancel
                .into_iter()
                .chain(self.scope.as_ref())
                .any(CancellationToken::is_cancelled)
            {
                return Err(ChannelError::Cancelled);
            }

            let reader = guard.as_mut().ok_or(ChannelError::Disconnected)?;
            match reader.read_frame() {
                Ok(frame) => {
                    trace!(peer = %self.shared.peer, len = frame.wire_size(), "frame received");
                    return Ok(frame.into_text());
                }
                Err(FrameError::Io(err))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(FrameError::InvalidUtf8(err)) => {
                    return Err(FrameError::InvalidUtf8(err).into());
                }
                Err(FrameError::ConnectionClosed) => {
                    debug!(peer = %self.shared.peer, "peer closed the connection");
                    self.shared.connected.store(false, Ordering::Release);
                    *guard = None;
                    return Err(ChannelError::Disconnected);
                }
                Err(err) => {
                    // Framing is lost; later reads could only misparse.
                    debug!(peer = %self.shared.peer, error = %err, "input stream unusable");
                    self.shared.connected.store(false, Ordering::Release);
                    *guard = None;
                    return Err(err.into());
                }
            }
        }
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T, password: Option<&Password>) -> Result<String> {
        let text = self.shared.codec.encode(value)?;
        match password {
            Some(password) => Ok(objwire_crypto::encrypt(&text, password)?),
            None => Ok(text),
        }
    }

    fn send_encoded(&self, frames: impl IntoIterator<Item = Result<String>>) -> Result<usize> {
        self.ensure_live()?;
        let mut guard = lock(&self.shared.writer);
        let writer = guard.as_mut().ok_or(ChannelError::Disconnected)?;

        let mut delivered = 0usize;
        for frame in frames {
            let outcome = frame.and_then(|text| writer.send(&text).map_err(ChannelError::from));
            if let Err(err) = outcome {
                if matches!(err, ChannelError::Frame(FrameError::Io(_) | FrameError::ConnectionClosed)) {
                    // Part of the frame may be on the wire; anything written
                    // after it would be misread by the peer.
                    debug!(peer = %self.shared.peer, error = %err, "output stream unusable");
                    self.shared.connected.store(false, Ordering::Release);
                    *guard = None;
                }
                return Err(with_delivered(delivered, err));
            }
            delivered += 1;
        }

        trace!(peer = %self.shared.peer, delivered, "frames written");
        Ok(delivered)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ChannelError::Disposed);
        }
        if self.shared.closed.is_cancelled() {
            return Err(ChannelError::Disconnected);
        }
        Ok(())
    }

    fn closed_error(&self) -> ChannelError {
        if self.is_disposed() {
            ChannelError::Disposed
        } else {
            ChannelError::Disconnected
        }
    }

    /// Log a swallowed error, hand it to the hook, and yield the default.
    pub(crate) fn swallow<T: Default>(&self, operation: &'static str, err: ChannelError) -> T {
        debug!(peer = %self.shared.peer, operation, error = %err, "channel error swallowed");
        if let Some(hook) = &self.shared.on_error {
            hook(&err);
        }
        T::default()
    }

    /// Release the socket and both stream views.
    ///
    /// Blocked reads wake within one poll interval; with
    /// [`Ownership::Owned`] the shutdown also unblocks them (and blocked
    /// writes) immediately.
    pub(crate) fn close(&self) {
        self.shared.closed.cancel();
        self.shared.connected.store(false, Ordering::Release);

        let control = lock(&self.shared.control).take();
        if let (Some(socket), Ownership::Owned) = (&control, self.shared.ownership) {
            if let Err(err) = socket.shutdown(Shutdown::Both) {
                trace!(peer = %self.shared.peer, error = %err, "shutdown after close");
            }
        }

        drop(lock(&self.shared.reader).take());
        drop(lock(&self.shared.writer).take());
        drop(control);
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("peer", &self.shared.peer)
            .field("ownership", &self.shared.ownership)
            .field("connected", &self.is_connected())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Ordered write of values that need not share a type.
///
/// Values are encoded as they are pushed and written under one lock when
/// the batch is sent, so no other writer can interleave with them.
#[must_use = "a batch writes nothing until it is sent"]
pub struct Batch<'a> {
    endpoint: &'a Endpoint,
    password: Option<&'a Password>,
    frames: Vec<Result<String>>,
}

impl Batch<'_> {
    pub fn push<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        let frame = self.endpoint.encode(value, self.password);
        self.frames.push(frame);
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Write the batch, swallowing errors.
    pub fn send(self) {
        let endpoint = self.endpoint;
        if let Err(err) = self.try_send() {
            endpoint.swallow::<()>("write", err);
        }
    }

    /// Write the batch; stops at the first value that fails to encode or send.
    pub fn try_send(self) -> Result<usize> {
        self.endpoint.send_encoded(self.frames)
    }
}

fn with_delivered(delivered: usize, err: ChannelError) -> ChannelError {
    if delivered == 0 {
        err
    } else {
        ChannelError::Partial {
            delivered,
            source: Box::new(err),
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

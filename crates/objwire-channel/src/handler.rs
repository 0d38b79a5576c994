use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use objwire_codec::TypeRegistry;
use objwire_crypto::Password;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::{ChannelError, Result};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

type Worker = Box<dyn FnOnce(HandlerContext) + Send + 'static>;

/// What a command handler sees while it runs.
///
/// Reads made through the context return as soon as the handler is asked to
/// stop, so a loop like the one below always ends promptly:
///
/// ```no_run
/// # use objwire_channel::HandlerContext;
/// fn serve(ctx: HandlerContext) {
///     while ctx.should_continue() {
///         let command: String = ctx.read();
///         if !command.is_empty() {
///             ctx.endpoint().write_one(&command.to_uppercase());
///         }
///     }
/// }
/// ```
pub struct HandlerContext {
    endpoint: Endpoint,
    token: CancellationToken,
}

impl HandlerContext {
    /// The channel's endpoint, scoped to this handler: its reads also end
    /// with [`ChannelError::Cancelled`] once the handler is stopped.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Cancelled when the handler is stopped or the channel closes.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Not cancelled and still connected.
    pub fn should_continue(&self) -> bool {
        !self.is_cancelled() && self.endpoint.is_connected()
    }

    /// Read one value, or `T::default()` on failure or cancellation.
    pub fn read<T: DeserializeOwned + Default>(&self) -> T {
        self.try_read()
            .unwrap_or_else(|err| self.endpoint.swallow("read", err))
    }

    pub fn read_with<T: DeserializeOwned + Default>(&self, password: &Password) -> T {
        self.try_read_with(password)
            .unwrap_or_else(|err| self.endpoint.swallow("read", err))
    }

    /// Read one value; [`ChannelError::Cancelled`] once the handler is stopped.
    pub fn try_read<T: DeserializeOwned>(&self) -> Result<T> {
        self.endpoint.receive(None, Some(&self.token))
    }

    pub fn try_read_with<T: DeserializeOwned>(&self, password: &Password) -> Result<T> {
        self.endpoint.receive(Some(password), Some(&self.token))
    }

    pub fn read_polymorphic<B: ?Sized + 'static>(&self, registry: &TypeRegistry<B>) -> Option<Box<B>> {
        self.endpoint
            .receive_polymorphic(registry, None, Some(&self.token))
            .map_err(|err| self.endpoint.swallow::<()>("read", err))
            .ok()
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("endpoint", &self.endpoint)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

enum SlotState {
    Empty,
    Bound(Worker),
    Running {
        token: CancellationToken,
        join: JoinHandle<()>,
    },
    Finished,
}

/// Optional background worker bound to a channel.
///
/// Dormant until started; runs on its own thread until the worker returns
/// or [`HandlerSlot::stop`] cancels it and waits. A worker runs at most once.
pub struct HandlerSlot {
    state: SlotState,
}

impl HandlerSlot {
    /// A slot with no worker; `start` fails with [`ChannelError::NoHandler`].
    pub fn empty() -> Self {
        Self {
            state: SlotState::Empty,
        }
    }

    pub fn bound(worker: impl FnOnce(HandlerContext) + Send + 'static) -> Self {
        Self {
            state: SlotState::Bound(Box::new(worker)),
        }
    }

    /// A worker is bound and has not been started yet.
    pub fn is_bound(&self) -> bool {
        matches!(self.state, SlotState::Bound(_))
    }

    /// The worker thread has been started and has not ended.
    pub fn is_running(&self) -> bool {
        match &self.state {
            SlotState::Running { join, .. } => !join.is_finished(),
            _ => false,
        }
    }

    /// Run the bound worker on a new thread.
    ///
    /// The worker's token is a child of the endpoint's close token, so closing
    /// the channel also cancels the worker.
    pub fn start(&mut self, endpoint: Endpoint) -> Result<()> {
        let worker = match std::mem::replace(&mut self.state, SlotState::Finished) {
            SlotState::Bound(worker) => worker,
            SlotState::Empty => {
                self.state = SlotState::Empty;
                return Err(ChannelError::NoHandler);
            }
            other => {
                self.state = other;
                return Err(ChannelError::HandlerConsumed);
            }
        };

        let token = endpoint.closed_token().child_token();
        let id = NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed);
        let peer = endpoint.peer().to_string();
        let ctx = HandlerContext {
            endpoint: endpoint.scoped(token.clone()),
            token: token.clone(),
        };

        let join = thread::Builder::new()
            .name(format!("objwire-handler-{id}"))
            .spawn(move || {
                debug!(handler = id, %peer, "command handler started");
                worker(ctx);
                debug!(handler = id, %peer, "command handler finished");
            })
            .map_err(ChannelError::HandlerSpawn)?;

        self.state = SlotState::Running { token, join };
        Ok(())
    }

    /// Cancel the worker and wait for it to end. A no-op when not running.
    ///
    /// Returns [`ChannelError::HandlerPanicked`] if the worker panicked.
    pub fn stop(&mut self) -> Result<()> {
        let (token, join) = match std::mem::replace(&mut self.state, SlotState::Finished) {
            SlotState::Running { token, join } => (token, join),
            other => {
                self.state = other;
                return Ok(());
            }
        };

        token.cancel();

        // A worker stopping its own slot cannot wait for itself.
        if join.thread().id() == thread::current().id() {
            return Ok(());
        }

        join.join().map_err(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(panic = %message, "command handler panicked");
            ChannelError::HandlerPanicked(message)
        })
    }
}

impl Default for HandlerSlot {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            SlotState::Empty => "empty",
            SlotState::Bound(_) => "bound",
            SlotState::Running { .. } if self.is_running() => "running",
            SlotState::Running { .. } => "returned",
            SlotState::Finished => "finished",
        };
        f.debug_struct("HandlerSlot").field("state", &state).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use objwire_transport::Socket;

    use super::*;
    use crate::channel::Channel;
    use crate::config::Ownership;

    fn channels() -> (Channel, Channel) {
        let (left, right) = Socket::pair().unwrap();
        (
            Channel::new(left, Ownership::Owned).unwrap(),
            Channel::new(right, Ownership::Owned).unwrap(),
        )
    }

    #[test]
    fn empty_slot_cannot_start() {
        let (near, _far) = channels();
        let endpoint = near.endpoint().clone();
        let mut slot = HandlerSlot::empty();
        assert!(matches!(slot.start(endpoint), Err(ChannelError::NoHandler)));
        assert!(slot.stop().is_ok());
    }

    #[test]
    fn stop_on_never_started_slot_is_immediate() {
        let mut slot = HandlerSlot::bound(|_ctx| {});
        let started = Instant::now();
        slot.stop().unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert!(slot.is_bound());
    }

    #[test]
    fn stop_joins_worker_blocked_in_read() {
        let (near, _far) = channels();
        let endpoint = near.endpoint().clone();
        let (tx, rx) = mpsc::channel();
        let mut slot = HandlerSlot::bound(move |ctx| {
            let outcome = ctx.try_read::<i32>();
            tx.send(matches!(outcome, Err(ChannelError::Cancelled))).unwrap();
        });

        slot.start(endpoint).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!(slot.is_running());

        slot.stop().unwrap();
        assert!(!slot.is_running());
        assert!(rx.try_recv().unwrap());
    }

    #[test]
    fn worker_runs_once() {
        let (near, _far) = channels();
        let endpoint = near.endpoint().clone();
        let mut slot = HandlerSlot::bound(|_ctx| {});
        slot.start(endpoint.clone()).unwrap();
        slot.stop().unwrap();

        assert!(matches!(slot.start(endpoint), Err(ChannelError::HandlerConsumed)));
    }

    #[test]
    fn panic_is_contained() {
        let (near, _far) = channels();
        let endpoint = near.endpoint().clone();
        let mut slot = HandlerSlot::bound(|_ctx| panic!("boom"));
        slot.start(endpoint).unwrap();

        let err = slot.stop().unwrap_err();
        assert!(matches!(err, ChannelError::HandlerPanicked(message) if message == "boom"));
    }

    #[test]
    fn panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "non-string panic payload");
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use objwire_channel::{ChannelError, ChannelListener, HandlerContext};
use objwire_crypto::Password;
use serde_json::Value;

use crate::cmd::ListenArgs;
use crate::exit::{channel_error, CliError, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

const SIGNAL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let password = args.password.resolve()?;
    let listener =
        ChannelListener::bind(args.addr.as_str()).map_err(|err| channel_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let (tx, rx) = mpsc::channel();
        let handler_password = password.clone();
        let accepted = listener
            .accept_with_handler_timeout(SIGNAL_CHECK_INTERVAL, move |ctx| {
                forward_values(ctx, handler_password, tx)
            })
            .map_err(|err| channel_error("accept failed", err))?;
        // No peer yet; look at the stop flag before waiting again.
        let Some(channel) = accepted else {
            continue;
        };
        tracing::info!(peer = %channel.peer(), "peer connected");

        while running.load(Ordering::SeqCst) {
            let value = match rx.recv_timeout(SIGNAL_CHECK_INTERVAL) {
                Ok(value) => value,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            print_value(&value, channel.peer(), password.is_some(), format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    channel.dispose();
                    return Ok(SUCCESS);
                }
            }
        }

        tracing::info!(peer = %channel.peer(), "peer session ended");
        channel.dispose();
    }

    Ok(SUCCESS)
}

/// Handler body: push every decoded value to the printing loop.
///
/// Values that fail to decode are logged and skipped rather than printed as
/// defaults.
fn forward_values(ctx: HandlerContext, password: Option<Password>, tx: mpsc::Sender<Value>) {
    while ctx.should_continue() {
        let received = match &password {
            Some(password) => ctx.try_read_with::<Value>(password),
            None => ctx.try_read::<Value>(),
        };
        match received {
            Ok(value) => {
                if tx.send(value).is_err() {
                    break;
                }
            }
            Err(err) if err.is_disconnect() || matches!(err, ChannelError::Cancelled) => break,
            Err(err) => tracing::warn!(error = %err, "dropping undecodable value"),
        }
    }
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use objwire_channel::{ChannelError, ChannelListener, HandlerContext};
use objwire_crypto::Password;
use serde_json::Value;

use crate::cmd::listen::install_ctrlc_handler;
use crate::cmd::EchoArgs;
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{value_kind, OutputFormat};

const SIGNAL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

enum RecvDisposition {
    Stop,
    Skip,
}

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let password = args.password.resolve()?;
    let listener =
        ChannelListener::bind(args.addr.as_str()).map_err(|err| channel_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut served = 0usize;

    while running.load(Ordering::SeqCst) {
        let handler_password = password.clone();
        let accepted = listener
            .accept_with_handler_timeout(SIGNAL_CHECK_INTERVAL, move |ctx| {
                echo_values(ctx, handler_password)
            })
            .map_err(|err| channel_error("accept failed", err))?;
        let Some(channel) = accepted else {
            continue;
        };
        tracing::info!(peer = %channel.peer(), "peer connected");

        while running.load(Ordering::SeqCst) && channel.handler_running() {
            std::thread::sleep(SIGNAL_CHECK_INTERVAL);
        }

        channel.dispose();
        served = served.saturating_add(1);
        if args.sessions.is_some_and(|limit| served >= limit) {
            break;
        }
    }

    Ok(SUCCESS)
}

fn echo_values(ctx: HandlerContext, password: Option<Password>) {
    while ctx.should_continue() {
        let received = match &password {
            Some(password) => ctx.try_read_with::<Value>(password),
            None => ctx.try_read::<Value>(),
        };
        let value = match received {
            Ok(value) => value,
            Err(err) => match classify_recv_error(&err) {
                RecvDisposition::Stop => break,
                RecvDisposition::Skip => {
                    tracing::warn!(error = %err, "skipping undecodable value");
                    continue;
                }
            },
        };

        tracing::info!(kind = value_kind(&value), "echoing value");
        let sent = match &password {
            Some(password) => ctx.endpoint().try_write_with(password, &[&value]),
            None => ctx.endpoint().try_write(&[&value]),
        };
        if let Err(err) = sent {
            tracing::warn!(error = %err, "echo send failed");
            break;
        }
    }
}

fn classify_recv_error(err: &ChannelError) -> RecvDisposition {
    if err.is_disconnect() || matches!(err, ChannelError::Cancelled) {
        RecvDisposition::Stop
    } else {
        RecvDisposition::Skip
    }
}

#[cfg(test)]
mod tests {
    use objwire_crypto::CryptoError;

    use super::*;

    #[test]
    fn disconnected_error_stops_loop() {
        assert!(matches!(
            classify_recv_error(&ChannelError::Disconnected),
            RecvDisposition::Stop
        ));
        assert!(matches!(
            classify_recv_error(&ChannelError::Cancelled),
            RecvDisposition::Stop
        ));
    }

    #[test]
    fn decode_error_is_skipped() {
        assert!(matches!(
            classify_recv_error(&ChannelError::Crypto(CryptoError::Authentication)),
            RecvDisposition::Skip
        ));
    }
}

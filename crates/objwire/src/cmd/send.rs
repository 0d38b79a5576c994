use std::fs;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use objwire_channel::{Channel, ChannelConfig, ChannelError, HandlerContext, Ownership};
use objwire_crypto::Password;
use serde_json::Value;

use crate::cmd::SendArgs;
use crate::exit::{channel_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_value, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let password = args.password.resolve()?;
    let value = resolve_value(&args)?;

    let socket = objwire_transport::connect_timeout(args.addr.as_str(), connect_timeout)
        .map_err(|err| transport_error("connect failed", err))?;

    let (tx, rx) = mpsc::channel();
    let mut builder = Channel::builder(socket)
        .ownership(Ownership::Owned)
        .config(ChannelConfig::default());
    if args.wait {
        let reply_password = password.clone();
        builder = builder.handler(move |ctx| {
            let _ = tx.send(read_reply(&ctx, reply_password.as_ref()));
        });
    }
    let channel = builder
        .build()
        .map_err(|err| channel_error("connect failed", err))?;
    if args.wait {
        channel
            .start_handler()
            .map_err(|err| channel_error("reply handler failed", err))?;
    }

    let sent = match &password {
        Some(password) => channel.try_write_with(password, &[&value]),
        None => channel.try_write(&[&value]),
    };
    sent.map_err(|err| channel_error("send failed", err))?;
    tracing::debug!(peer = %channel.peer(), encrypted = password.is_some(), "value sent");

    if args.wait {
        let reply = match rx.recv_timeout(wait_timeout) {
            Ok(reply) => reply.map_err(|err| channel_error("receive failed", err))?,
            Err(RecvTimeoutError::Timeout) => {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("no reply within {}", args.wait_timeout),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(channel_error("receive failed", ChannelError::Disconnected))
            }
        };
        print_value(&reply, channel.peer(), password.is_some(), format);
    }

    channel.dispose();
    Ok(SUCCESS)
}

fn read_reply(ctx: &HandlerContext, password: Option<&Password>) -> Result<Value, ChannelError> {
    match password {
        Some(password) => ctx.try_read_with(password),
        None => ctx.try_read(),
    }
}

fn resolve_value(args: &SendArgs) -> CliResult<Value> {
    if let Some(json) = &args.json {
        return serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")));
    }
    if let Some(data) = &args.data {
        return Ok(Value::String(data.clone()));
    }
    if let Some(path) = &args.file {
        let text = fs::read_to_string(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        })?;
        return serde_json::from_str(&text).map_err(|err| {
            CliError::new(
                crate::exit::DATA_INVALID,
                format!("{} is not valid JSON: {err}", path.display()),
            )
        });
    }
    Ok(Value::Null)
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

use std::fmt;
use std::io;

use objwire_channel::ChannelError;
use objwire_codec::CodecError;
use objwire_crypto::CryptoError;
use objwire_frame::FrameError;
use objwire_transport::TransportError;

// Exit codes follow the sysexits/timeout(1) conventions.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::InvalidUtf8(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Transport(err) => transport_error(context, err),
        ChannelError::Frame(err) => frame_error(context, err),
        ChannelError::Codec(err) => codec_error(context, err),
        ChannelError::Crypto(err) => crypto_error(context, err),
        ChannelError::InvalidArgument(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ChannelError::Disconnected | ChannelError::Disposed | ChannelError::Cancelled => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        ChannelError::Partial { source, .. } => channel_error(context, *source),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

fn codec_error(context: &str, err: CodecError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

fn crypto_error(context: &str, err: CryptoError) -> CliError {
    match err {
        CryptoError::EmptyPassword => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connection_is_transport_error() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                addr: "127.0.0.1:1".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn wrong_password_is_invalid_data() {
        let err = channel_error("receive failed", ChannelError::Crypto(CryptoError::Authentication));
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn partial_write_maps_by_cause() {
        let err = channel_error(
            "send failed",
            ChannelError::Partial {
                delivered: 1,
                source: Box::new(ChannelError::Frame(FrameError::Io(io::Error::from(
                    io::ErrorKind::TimedOut,
                )))),
            },
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn disconnect_is_plain_failure() {
        assert_eq!(channel_error("x", ChannelError::Disconnected).code, FAILURE);
        assert_eq!(
            channel_error("x", ChannelError::InvalidArgument("bad".into())).code,
            USAGE
        );
    }
}

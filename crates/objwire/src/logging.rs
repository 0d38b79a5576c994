use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Overrides `--log-level` with a full filter directive, e.g.
/// `OBJWIRE_LOG=objwire_channel=trace,info`.
pub const LOG_ENV: &str = "OBJWIRE_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

fn filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::from(level).into()))
}

/// Log to stderr; stdout carries received values only.
///
/// Thread names are on so handler workers (`objwire-handler-N`) can be told
/// apart from the accept loop.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter(level))
        .with_ansi(false)
        .with_thread_names(true);

    // A second init (tests) keeps the first subscriber.
    let _ = match format {
        LogFormat::Text => subscriber.with_target(false).try_init(),
        LogFormat::Json => subscriber.json().flatten_event(true).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_one_to_one() {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn init_twice_is_harmless() {
        init_logging(LogFormat::Text, LogLevel::Warn);
        init_logging(LogFormat::Json, LogLevel::Debug);
        tracing::warn!("still logging");
    }
}

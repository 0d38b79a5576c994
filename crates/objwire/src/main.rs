mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

/// Send, receive and echo typed values over objwire channels.
#[derive(Parser, Debug)]
#[command(name = "objwire", version)]
struct Cli {
    /// How received values are printed [default: table on a terminal, json otherwise].
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Shape of log lines on stderr.
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Least severe level logged; OBJWIRE_LOG overrides it.
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let Cli {
        format,
        log_format,
        log_level,
        command,
    } = Cli::parse();
    init_logging(log_format, log_level);

    let code = cmd::run(command, format.unwrap_or_else(OutputFormat::default_for_stdout))
        .unwrap_or_else(|err| {
            eprintln!("objwire: {err}");
            err.code
        });
    std::process::exit(code);
}

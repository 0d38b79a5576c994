use std::path::PathBuf;

use clap::{Args, Subcommand};
use objwire_crypto::Password;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and send every value back.
    Echo(EchoArgs),
    /// Send one value to a listening peer.
    Send(SendArgs),
    /// Accept connections and print received values.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Shared password option.
#[derive(Args, Debug, Default)]
pub struct PasswordArgs {
    /// Encrypt/decrypt values with this password.
    #[arg(long, env = "OBJWIRE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl PasswordArgs {
    pub fn resolve(&self) -> CliResult<Option<Password>> {
        self.password
            .as_deref()
            .map(|secret| {
                Password::new(secret)
                    .map_err(|err| CliError::new(USAGE, format!("invalid --password: {err}")))
            })
            .transpose()
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to bind (e.g. 127.0.0.1:7070).
    pub addr: String,
    #[command(flatten)]
    pub password: PasswordArgs,
    /// Exit after serving N connections.
    #[arg(long)]
    pub sessions: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to.
    pub addr: String,
    /// JSON value.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// String value.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read a JSON value from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    #[command(flatten)]
    pub password: PasswordArgs,
    /// Wait for one reply value and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Maximum time to establish the connection.
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (e.g. 127.0.0.1:7070).
    pub addr: String,
    #[command(flatten)]
    pub password: PasswordArgs,
    /// Exit after receiving N values.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

//! Command-line parsing
//!
//! The bridge takes positional arguments only:
//!
//! ```text
//! ipc-bridge                       server on a generated endpoint
//! ipc-bridge <endpoint>            server on <endpoint>
//! ipc-bridge --server <endpoint>   same, explicit
//! ipc-bridge --client <endpoint>   dial <endpoint>
//! ```
//!
//! The role flags are matched case-insensitively.

use clap::Parser;
use thiserror::Error;

/// Local socket relay for a host controller speaking JSON lines
#[derive(Parser, Debug)]
#[command(name = "ipc-bridge")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// `[--client|--server] [endpoint]`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

impl Cli {
    /// Parse a full argv, program name first
    ///
    /// clap swallows a bare `--` as its escape token. Positional shape matters
    /// here, so when clap dropped anything the raw arguments are used instead.
    pub fn parse_argv<I>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = String>,
    {
        let argv: Vec<String> = argv.into_iter().collect();
        let mut cli = Self::try_parse_from(&argv)?;
        let raw = argv.get(1..).unwrap_or_default();
        if cli.args.len() != raw.len() {
            cli.args = raw.to_vec();
        }
        Ok(cli)
    }
}

/// Bad argument shape
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// An argument in a position where it is not allowed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// What the process should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Bind and relay for many peers; `None` means generate an endpoint
    Server(Option<String>),
    /// Dial one endpoint
    Client(String),
}

impl Mode {
    /// Interpret positional arguments
    pub fn from_args(args: &[String]) -> Result<Self, CliError> {
        match args {
            [] => Ok(Self::Server(None)),
            [endpoint] => Ok(Self::Server(Some(endpoint.clone()))),
            [flag, endpoint] => match flag.to_lowercase().as_str() {
                "--client" => Ok(Self::Client(endpoint.clone())),
                "--server" => Ok(Self::Server(Some(endpoint.clone()))),
                _ => Err(CliError::InvalidArgument(flag.clone())),
            },
            [_, _, extra, ..] => Err(CliError::InvalidArgument(extra.clone())),
        }
    }
}

//! Bridge Configuration
//!
//! Runtime knobs for the relay, loaded from environment variables.
//!
//! Environment variables:
//! - `IPC_BRIDGE_CHUNK_SIZE`: read chunk size in bytes (default 4096, at most 1 MiB)
//! - `IPC_BRIDGE_SOCKET_DIR`: directory for generated endpoints (default: system temp dir)
//! - `IPC_BRIDGE_SOCKET_MODE`: octal permission bits applied after bind (e.g. "600")

use std::path::PathBuf;

use thiserror::Error;

/// Default size of a single read from a peer connection
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Largest accepted chunk size
///
/// Every reader allocates a buffer of this size up front.
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Environment variable overriding the read chunk size
pub const CHUNK_SIZE_VAR: &str = "IPC_BRIDGE_CHUNK_SIZE";

/// Environment variable overriding the generated endpoint directory
pub const SOCKET_DIR_VAR: &str = "IPC_BRIDGE_SOCKET_DIR";

/// Environment variable setting socket file permissions
pub const SOCKET_MODE_VAR: &str = "IPC_BRIDGE_SOCKET_MODE";

/// Errors from loading configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to something that does not parse
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// Raw value found in the environment
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Relay configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Maximum bytes read from a connection per data frame
    pub chunk_size: usize,

    /// Directory where generated endpoints are created
    pub socket_dir: PathBuf,

    /// Permission bits applied to the socket file after bind
    ///
    /// `None` leaves the file as created by the OS.
    pub socket_mode: Option<u32>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            socket_dir: std::env::temp_dir(),
            socket_mode: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from process environment variables
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first variable that is set
    /// but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Same as [`BridgeConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(CHUNK_SIZE_VAR) {
            config.chunk_size = match raw.trim().parse::<usize>() {
                Ok(0) => return Err(invalid(CHUNK_SIZE_VAR, raw, "must be greater than zero")),
                Ok(n) if n > MAX_CHUNK_SIZE => {
                    return Err(invalid(CHUNK_SIZE_VAR, raw, "must be at most 1048576"))
                }
                Ok(n) => n,
                Err(e) => return Err(invalid(CHUNK_SIZE_VAR, raw, e)),
            };
        }

        if let Some(raw) = lookup(SOCKET_DIR_VAR) {
            if raw.trim().is_empty() {
                return Err(invalid(SOCKET_DIR_VAR, raw, "must not be empty"));
            }
            config.socket_dir = PathBuf::from(raw);
        }

        if let Some(raw) = lookup(SOCKET_MODE_VAR) {
            let digits = raw.trim().trim_start_matches("0o");
            match u32::from_str_radix(digits, 8) {
                Ok(mode) if mode <= 0o777 => config.socket_mode = Some(mode),
                Ok(_) => return Err(invalid(SOCKET_MODE_VAR, raw, "must be at most 777")),
                Err(e) => return Err(invalid(SOCKET_MODE_VAR, raw, e)),
            }
        }

        Ok(config)
    }
}

fn invalid(var: &'static str, value: String, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        var,
        value,
        reason: reason.to_string(),
    }
}

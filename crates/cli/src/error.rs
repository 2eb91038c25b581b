//! CLI errors.

use crate::config::ConfigError;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The program file declares no entry function.
    #[error("program has no entry function; set `entry = \"...\"`")]
    NoEntry,

    /// A violation under `fatal` enforcement ended the run.
    #[error("aborted: {0}")]
    Aborted(coeffects::Violation),

    /// A `check` found the call not permitted.
    #[error("call rejected")]
    Rejected,

    /// Configuration is invalid or could not be read.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred in the runtime layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// An error occurred in the coeffect layer.
    #[error(transparent)]
    Coeffects(#[from] coeffects::Error),

    /// JSON output could not be encoded.
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

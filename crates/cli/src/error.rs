//! Error types for CLI operations.

use contracts::ContractError;
use dispatcher::DispatcherError;
use ingestion::IngestionError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Every configured backend was skipped or filtered out
    #[error("no backends available ({skipped} skipped)")]
    NoBackends { skipped: usize },

    /// `--only` named backends that are not active
    #[error("unknown or inactive backend(s): {names}")]
    UnknownBackends { names: String },

    /// Input could not be loaded
    #[error("failed to load items: {0}")]
    Ingestion(#[from] IngestionError),

    /// Configuration problem or core invariant violation
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// One or more sinks failed
    #[error("failed to write results: {0}")]
    Output(#[from] DispatcherError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn unknown_backends(names: &[String]) -> Self {
        Self::UnknownBackends {
            names: names.join(", "),
        }
    }

    /// 是否为内部不变量被破坏
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::Contract(e) if e.is_defect())
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

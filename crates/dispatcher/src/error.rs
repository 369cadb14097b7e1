//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// One or more sinks failed while the rest were written
    #[error("{failed} sink(s) failed: {summary}")]
    SinkFailures { failed: usize, summary: String },

    /// A header name would appear twice in the written table
    #[error("sink '{name}': column '{column}' appears more than once in the header")]
    DuplicateColumn { name: String, column: String },

    /// Contract error (sink write, core invariant)
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),

    /// CSV encoding error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

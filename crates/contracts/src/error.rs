//! Layered error definitions
//!
//! Categorized by source: config / backend construction / core invariants / input / sink

use thiserror::Error;

/// Unified error type
///
/// 单元级别的失败 (超时、传输错误、拒绝) 不在这里：它们是 [`crate::Failure`]，
/// 作为数据记录在结果表中。这里的错误会中止运行或排除某个后端。
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Backend Construction Errors =====
    /// Required credential is absent
    #[error("backend '{backend}' is missing credential: environment variable {variable} is not set")]
    MissingCredential { backend: String, variable: String },

    /// Backend cannot be constructed from its configuration
    #[error("backend '{backend}' cannot be constructed: {message}")]
    BackendConstruction { backend: String, message: String },

    // ===== Core Invariant Violations =====
    /// Backend name registered twice
    #[error("duplicate backend '{name}'")]
    DuplicateBackend { name: String },

    /// Outcome slot written twice
    #[error("duplicate outcome for item {item_index}, backend '{backend}'")]
    DuplicateOutcome { item_index: usize, backend: String },

    /// Table finalized before every slot resolved
    #[error("incomplete result: {filled}/{expected} outcomes resolved")]
    IncompleteResult { filled: usize, expected: usize },

    /// Resolution names a backend that is not a table column
    #[error("unknown backend '{name}'")]
    UnknownBackend { name: String },

    /// Resolution points past the end of the table
    #[error("item index {item_index} out of range (table has {len} rows)")]
    ItemIndexOutOfRange { item_index: usize, len: usize },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create missing credential error
    pub fn missing_credential(backend: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::MissingCredential {
            backend: backend.into(),
            variable: variable.into(),
        }
    }

    /// Create backend construction error
    pub fn backend_construction(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendConstruction {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// 后端构造失败 (该后端应被排除，而不是中止运行)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. } | Self::BackendConstruction { .. }
        )
    }

    /// 核心不变量被破坏，总是致命的
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Self::DuplicateBackend { .. }
                | Self::DuplicateOutcome { .. }
                | Self::IncompleteResult { .. }
                | Self::UnknownBackend { .. }
                | Self::ItemIndexOutOfRange { .. }
        )
    }
}

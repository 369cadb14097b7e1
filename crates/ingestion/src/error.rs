//! Ingestion 错误类型

use std::path::PathBuf;

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 输入文件无法读取
    #[error("failed to read input '{}': {source}", path.display())]
    Io {
        /// 文件路径
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV 解析失败
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON Lines 某一行解析失败
    #[error("invalid json on line {line}: {source}")]
    Json {
        /// 行号 (从 1 开始)
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// 必需列不存在
    #[error("required column '{column}' not found")]
    MissingColumn {
        /// 列名
        column: String,
    },

    /// 必需字段为空
    #[error("row {row}: column '{column}' is empty")]
    EmptyField {
        /// 行号 (数据行，从 1 开始)
        row: usize,
        /// 列名
        column: String,
    },

    /// id 重复
    #[error("row {row}: duplicate item id '{id}'")]
    DuplicateId {
        /// 行号
        row: usize,
        /// 重复的 id
        id: String,
    },

    /// 输入没有任何数据行
    #[error("input '{}' contains no items", path.display())]
    Empty {
        /// 文件路径
        path: PathBuf,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;

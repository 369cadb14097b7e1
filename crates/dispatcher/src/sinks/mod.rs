//! Sink implementations
//!
//! Contains CsvSink, JsonSink, and LogSink, plus `emit` which writes a
//! finalized table to every configured sink.

mod delimited;
mod json;
mod log;

use std::collections::HashMap;
use std::path::PathBuf;

use contracts::{ContractError, ResultTable, SinkConfig, SinkType, TableSink};
use tracing::{error, info, instrument};

use crate::error::DispatcherError;

pub use self::delimited::{CsvSink, CsvSinkConfig};
pub use self::json::JsonSink;
pub use self::log::{tally, BackendTally, LogSink};

/// 把结果表写到所有配置的 sink
///
/// 一个 sink 失败不影响其他 sink；全部尝试后汇总失败。
/// 成功时返回写出的 sink 数量。
#[instrument(
    name = "dispatcher_emit",
    skip(table, configs),
    fields(sink_count = configs.len(), rows = table.len())
)]
pub async fn emit(table: &ResultTable, configs: &[SinkConfig]) -> Result<usize, DispatcherError> {
    let mut written = 0;
    let mut failures = Vec::new();

    for config in configs {
        match emit_one(table, config).await {
            Ok(()) => written += 1,
            Err(e) => {
                error!(sink = %config.name, error = %e, "sink failed");
                failures.push(format!("{}: {e}", config.name));
            }
        }
    }

    if failures.is_empty() {
        info!(sinks = written, "all sinks written");
        Ok(written)
    } else {
        Err(DispatcherError::SinkFailures {
            failed: failures.len(),
            summary: failures.join("; "),
        })
    }
}

#[instrument(
    name = "dispatcher_emit_one",
    skip(table, config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn emit_one(table: &ResultTable, config: &SinkConfig) -> Result<(), DispatcherError> {
    match config.sink_type {
        SinkType::Csv => {
            let sink = CsvSink::from_params(&config.name, &config.params)?;
            write_sink(sink, table).await?;
        }
        SinkType::Json => {
            let sink = JsonSink::from_params(&config.name, &config.params)?;
            write_sink(sink, table).await?;
        }
        SinkType::Log => write_sink(LogSink::new(&config.name), table).await?,
    }
    Ok(())
}

/// write + close；write 失败时仍然尝试 close
async fn write_sink<S: TableSink>(mut sink: S, table: &ResultTable) -> Result<(), ContractError> {
    let written = sink.write(table).await;
    let closed = sink.close().await;
    written.and(closed)
}

pub(crate) fn required_path(
    name: &str,
    params: &HashMap<String, String>,
) -> Result<PathBuf, DispatcherError> {
    params
        .get("path")
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| DispatcherError::sink_creation(name, "missing 'path' parameter"))
}

/// 布尔参数：true/false/1/0/yes/no
pub(crate) fn param_flag(
    name: &str,
    params: &HashMap<String, String>,
    key: &str,
) -> Result<Option<bool>, DispatcherError> {
    let Some(raw) = params.get(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(Some(true)),
        "false" | "0" | "no" => Ok(Some(false)),
        other => Err(DispatcherError::sink_creation(
            name,
            format!("'{key}' must be a boolean, got '{other}'"),
        )),
    }
}

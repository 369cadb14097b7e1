//! LogSink - logs a per-backend summary via tracing

use std::collections::BTreeMap;

use contracts::{ContractError, Outcome, ResultTable, TableSink};
use tracing::{info, instrument, warn};

/// 单个后端的汇总
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackendTally {
    pub succeeded: usize,
    pub failed: usize,
    pub by_kind: BTreeMap<&'static str, usize>,
}

/// 按列统计成功/失败
pub fn tally(table: &ResultTable) -> Vec<(String, BackendTally)> {
    table
        .columns()
        .iter()
        .map(|name| {
            let mut t = BackendTally::default();
            for outcome in table.column(name.as_str()).into_iter().flatten() {
                match outcome {
                    Outcome::Success { .. } => t.succeeded += 1,
                    Outcome::Failure(failure) => {
                        t.failed += 1;
                        *t.by_kind.entry(failure.kind.as_str()).or_default() += 1;
                    }
                }
            }
            (name.to_string(), t)
        })
        .collect()
}

/// Sink that logs table summaries
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl TableSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, table),
        fields(sink = %self.name, rows = table.len())
    )]
    async fn write(&mut self, table: &ResultTable) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            items = table.len(),
            backends = table.columns().len(),
            "result table"
        );
        for (backend, t) in tally(table) {
            if t.failed == 0 {
                info!(sink = %self.name, backend = %backend, succeeded = t.succeeded, "backend summary");
            } else {
                warn!(
                    sink = %self.name,
                    backend = %backend,
                    succeeded = t.succeeded,
                    failed = t.failed,
                    failures = ?t.by_kind,
                    "backend summary"
                );
            }
        }
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

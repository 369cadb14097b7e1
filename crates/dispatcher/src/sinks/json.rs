//! JsonSink - writes the result table as one JSON report

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use contracts::{ContractError, Outcome, ResultTable, TableSink};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::error::DispatcherError;
use crate::sinks::{param_flag, required_path};

#[derive(Serialize)]
struct Report<'a> {
    generated_at: String,
    columns: Vec<&'a str>,
    rows: Vec<ReportRow<'a>>,
}

#[derive(Serialize)]
struct ReportRow<'a> {
    id: &'a str,
    text: &'a str,
    language: Option<&'a str>,
    topic: Option<&'a str>,
    metadata: &'a BTreeMap<String, String>,
    results: BTreeMap<&'a str, ReportCell<'a>>,
}

#[derive(Serialize)]
struct ReportCell<'a> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
}

impl<'a> From<&'a Outcome> for ReportCell<'a> {
    fn from(outcome: &'a Outcome) -> Self {
        match outcome {
            Outcome::Success { text, latency } => Self {
                status: outcome.status(),
                answer: Some(text),
                error: None,
                latency_ms: Some(latency.as_millis() as u64),
            },
            Outcome::Failure(failure) => Self {
                status: outcome.status(),
                answer: None,
                error: Some(&failure.message),
                latency_ms: None,
            },
        }
    }
}

fn build_report(table: &ResultTable) -> Report<'_> {
    let rows = table
        .rows()
        .iter()
        .map(|row| ReportRow {
            id: &row.item.id,
            text: &row.item.text,
            language: row.item.language.as_deref(),
            topic: row.item.topic.as_deref(),
            metadata: &row.item.metadata,
            results: row
                .iter()
                .map(|(name, outcome)| (name.as_str(), ReportCell::from(outcome)))
                .collect(),
        })
        .collect();

    Report {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        columns: table.columns().iter().map(|c| c.as_str()).collect(),
        rows,
    }
}

/// Sink that writes a JSON report file
pub struct JsonSink {
    name: String,
    path: PathBuf,
    pretty: bool,
}

impl JsonSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            pretty: true,
        }
    }

    /// Params: `path` (required), `pretty` (default true)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        let path = required_path(&name, params)?;
        let pretty = param_flag(&name, params, "pretty")?.unwrap_or(true);
        Ok(Self { name, path, pretty })
    }

    fn write_report(&self, table: &ResultTable) -> Result<(), DispatcherError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&self.path)?);
        let report = build_report(table);
        if self.pretty {
            serde_json::to_writer_pretty(&mut out, &report)?;
        } else {
            serde_json::to_writer(&mut out, &report)?;
        }
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

impl TableSink for JsonSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "json_sink_write",
        skip(self, table),
        fields(sink = %self.name, rows = table.len())
    )]
    async fn write(&mut self, table: &ResultTable) -> Result<(), ContractError> {
        self.write_report(table).map_err(|e| {
            error!(sink = %self.name, error = %e, "json report failed");
            ContractError::sink_write(&self.name, e.to_string())
        })?;
        info!(sink = %self.name, path = %self.path.display(), "json report written");
        Ok(())
    }

    #[instrument(name = "json_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "JsonSink closed");
        Ok(())
    }
}

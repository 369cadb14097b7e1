//! CsvSink - 把结果表写成一张分隔符表格
//!
//! 列布局：`id, text, language, topic, <metadata keys...>`，
//! 然后每个后端按注册顺序依次为 `answer_<name>, status_<name>[, latency_ms_<name>]`。

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::path::PathBuf;

use contracts::{ContractError, Outcome, ResultTable, TableSink, ITEM_COLUMNS};
use tracing::{debug, error, info, instrument};

use crate::error::DispatcherError;
use crate::sinks::{param_flag, required_path};

/// CsvSink 配置
#[derive(Debug, Clone)]
pub struct CsvSinkConfig {
    pub path: PathBuf,
    pub delimiter: u8,
    /// 所有字段都加引号
    pub quote_all: bool,
    /// 追加 `latency_ms_<name>` 列
    pub include_latency: bool,
}

impl CsvSinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
            quote_all: false,
            include_latency: false,
        }
    }

    /// 从 params 构造：`path` 必填，`delimiter` 为单个 ASCII 字符 (`\t` 表示制表符)
    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Result<Self, DispatcherError> {
        let mut config = Self::new(required_path(name, params)?);

        if let Some(raw) = params.get("delimiter") {
            config.delimiter = parse_delimiter(raw).ok_or_else(|| {
                DispatcherError::sink_creation(
                    name,
                    format!("delimiter must be a single ASCII character, got '{raw}'"),
                )
            })?;
        }
        config.quote_all = param_flag(name, params, "quote_all")?.unwrap_or(false);
        config.include_latency = param_flag(name, params, "include_latency")?.unwrap_or(false);

        Ok(config)
    }
}

fn parse_delimiter(raw: &str) -> Option<u8> {
    match raw {
        "\\t" | "tab" => Some(b'\t'),
        _ => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii() => Some(c as u8),
                _ => None,
            }
        }
    }
}

/// 写出 CSV 文件的 sink
pub struct CsvSink {
    name: String,
    config: CsvSinkConfig,
    writer: Option<csv::Writer<File>>,
    rows_written: usize,
}

impl CsvSink {
    /// 创建文件 (及其父目录)
    pub fn new(name: impl Into<String>, config: CsvSinkConfig) -> Result<Self, DispatcherError> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&config.path)?;
        let writer = csv::WriterBuilder::new()
            .delimiter(config.delimiter)
            .quote_style(if config.quote_all {
                csv::QuoteStyle::Always
            } else {
                csv::QuoteStyle::Necessary
            })
            .from_writer(file);

        Ok(Self {
            name: name.into(),
            config,
            writer: Some(writer),
            rows_written: 0,
        })
    }

    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        let config = CsvSinkConfig::from_params(&name, params)?;
        Self::new(name, config)
    }

    pub fn path(&self) -> &PathBuf {
        &self.config.path
    }

    fn header(&self, table: &ResultTable, metadata_keys: &[&str]) -> Vec<String> {
        let mut header: Vec<String> = ITEM_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .collect();
        header.extend(metadata_keys.iter().map(|k| k.to_string()));
        for backend in table.columns() {
            header.push(backend.answer_column());
            header.push(backend.status_column());
            if self.config.include_latency {
                header.push(backend.latency_column());
            }
        }
        header
    }

    fn write_table(&mut self, table: &ResultTable) -> Result<(), DispatcherError> {
        let metadata_keys: Vec<&str> = table
            .rows()
            .iter()
            .flat_map(|row| row.item.metadata.keys().map(String::as_str))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let header = self.header(table, &metadata_keys);
        let mut seen = HashSet::with_capacity(header.len());
        if let Some(column) = header.iter().find(|column| !seen.insert(column.as_str())) {
            return Err(DispatcherError::DuplicateColumn {
                name: self.name.clone(),
                column: column.clone(),
            });
        }
        let include_latency = self.config.include_latency;

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| DispatcherError::sink_creation(&self.name, "sink already closed"))?;
        writer.write_record(&header)?;

        for row in table.rows() {
            let item = &row.item;
            let mut record = Vec::with_capacity(header.len());
            record.push(item.id.clone());
            record.push(item.text.clone());
            record.push(item.language.clone().unwrap_or_default());
            record.push(item.topic.clone().unwrap_or_default());
            for key in &metadata_keys {
                record.push(item.metadata.get(*key).cloned().unwrap_or_default());
            }
            for outcome in row.outcomes() {
                let (answer, status) = cells(outcome);
                record.push(answer);
                record.push(status);
                if include_latency {
                    record.push(
                        outcome
                            .latency()
                            .map(|l| l.as_millis().to_string())
                            .unwrap_or_default(),
                    );
                }
            }
            writer.write_record(&record)?;
            self.rows_written += 1;
        }

        writer.flush()?;
        Ok(())
    }
}

/// 成功：(答案, "ok")；失败：("", "<kind>: <message>")
fn cells(outcome: &Outcome) -> (String, String) {
    match outcome {
        Outcome::Success { text, .. } => (text.clone(), "ok".to_string()),
        Outcome::Failure(failure) => (String::new(), failure.to_string()),
    }
}

impl TableSink for CsvSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "csv_sink_write",
        skip(self, table),
        fields(sink = %self.name, rows = table.len())
    )]
    async fn write(&mut self, table: &ResultTable) -> Result<(), ContractError> {
        self.write_table(table).map_err(|e| {
            error!(sink = %self.name, error = %e, "csv write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })?;
        info!(
            sink = %self.name,
            path = %self.config.path.display(),
            rows = self.rows_written,
            "csv written"
        );
        Ok(())
    }

    #[instrument(name = "csv_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        debug!(sink = %self.name, "CsvSink closed");
        Ok(())
    }
}

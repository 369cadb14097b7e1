//! ItemLoader - 从分隔符表格或 JSON Lines 加载 Item

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use contracts::{InputConfig, InputFormat, Item};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::{IngestionError, Result};
use crate::topic::TopicDetector;

/// 一行原始数据：列名 → 值
type RawRow = HashMap<String, String>;

/// Item 加载器
pub struct ItemLoader {
    config: InputConfig,
    topics: TopicDetector,
}

impl ItemLoader {
    pub fn new(config: InputConfig, topics: TopicDetector) -> Self {
        Self { config, topics }
    }

    /// 从配置的路径加载
    #[instrument(name = "item_loader_load", skip(self), fields(path = %self.config.path.display()))]
    pub fn load(&self) -> Result<Vec<Item>> {
        let file = File::open(&self.config.path).map_err(|source| IngestionError::Io {
            path: self.config.path.clone(),
            source,
        })?;
        let items = self.load_from_reader(file, self.config.resolved_format())?;

        info!(
            items = items.len(),
            format = ?self.config.resolved_format(),
            "Input items loaded"
        );
        Ok(items)
    }

    /// 从任意 reader 加载
    pub fn load_from_reader<R: Read>(&self, reader: R, format: InputFormat) -> Result<Vec<Item>> {
        let rows = match format {
            InputFormat::Csv => self.read_csv(reader)?,
            InputFormat::Jsonl => read_jsonl(reader)?,
        };

        if rows.is_empty() {
            return Err(IngestionError::Empty {
                path: self.config.path.clone(),
            });
        }

        let mut seen = HashSet::with_capacity(rows.len());
        let mut items = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let item = self.build_item(idx + 1, row)?;
            if !seen.insert(item.id.clone()) {
                return Err(IngestionError::DuplicateId {
                    row: idx + 1,
                    id: item.id,
                });
            }
            items.push(item);
        }

        counter!("evalmux_items_loaded_total").increment(items.len() as u64);
        Ok(items)
    }

    fn read_csv<R: Read>(&self, reader: R) -> Result<Vec<RawRow>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter as u8)
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        // 表头层面的缺列错误即使没有数据行也能报出
        for column in self.required_columns() {
            if !headers.iter().any(|h| h == column) {
                return Err(IngestionError::MissingColumn {
                    column: column.to_string(),
                });
            }
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.clone(), v.to_string()))
                .collect();
            rows.push(row);
        }
        debug!(rows = rows.len(), columns = headers.len(), "CSV parsed");
        Ok(rows)
    }

    /// 必须存在的列
    fn required_columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.config.text_column.as_str())
            .chain(self.config.id_column.as_deref())
            .chain(self.config.language_column.as_deref())
            .chain(self.config.topic_column.as_deref())
            .chain(self.config.metadata_columns.iter().map(String::as_str))
    }

    fn build_item(&self, row_number: usize, row: &RawRow) -> Result<Item> {
        let config = &self.config;

        let id = match config.id_column {
            Some(ref column) => required_field(row_number, row, column)?,
            None => row_number.to_string(),
        };

        let text = required_field(row_number, row, &config.text_column)?;

        let language = config
            .language_column
            .as_deref()
            .and_then(|column| optional_field(row, column))
            .or_else(|| config.default_language.clone());

        let topic = config
            .topic_column
            .as_deref()
            .and_then(|column| optional_field(row, column))
            .or_else(|| self.topics.detect(&text).map(str::to_string));

        let mut metadata = BTreeMap::new();
        for column in &config.metadata_columns {
            match row.get(column) {
                Some(value) => {
                    metadata.insert(column.clone(), value.clone());
                }
                None => {
                    return Err(IngestionError::MissingColumn {
                        column: column.clone(),
                    })
                }
            }
        }

        Ok(Item {
            id,
            text,
            language,
            topic,
            metadata,
        })
    }
}

fn required_field(row_number: usize, row: &RawRow, column: &str) -> Result<String> {
    let value = row.get(column).ok_or_else(|| IngestionError::MissingColumn {
        column: column.to_string(),
    })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IngestionError::EmptyField {
            row: row_number,
            column: column.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn optional_field(row: &RawRow, column: &str) -> Option<String> {
    row.get(column)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// JSON Lines：每行一个对象，标量值转为字符串，空行跳过
fn read_jsonl<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut rows = Vec::new();
    for (idx, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.map_err(csv::Error::from)?;
        if line.trim().is_empty() {
            continue;
        }
        let object: serde_json::Map<String, Value> = serde_json::from_str(&line)
            .map_err(|source| IngestionError::Json {
                line: idx + 1,
                source,
            })?;

        let row = object
            .into_iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    Value::Null => return None,
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Some((key, value))
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TopicRule;
    use std::io::Write;

    fn loader(config: InputConfig) -> ItemLoader {
        let topics = TopicDetector::new(&[TopicRule {
            keyword: "pasiporo".into(),
            category: "Passport Services".into(),
        }]);
        ItemLoader::new(config, topics)
    }

    #[test]
    fn test_positional_ids_and_topic_detection() {
        let csv = "text,notes\nNdashaka pasiporo,a\nMuraho,b\n";
        let items = loader(InputConfig::new("q.csv"))
            .load_from_reader(csv.as_bytes(), InputFormat::Csv)
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "1");
        assert_eq!(items[1].id, "2");
        assert_eq!(items[0].topic.as_deref(), Some("Passport Services"));
        assert_eq!(items[1].topic.as_deref(), Some("Other"));
        assert!(items[0].metadata.is_empty());
    }

    #[test]
    fn test_explicit_columns() {
        let mut config = InputConfig::new("q.csv");
        config.id_column = Some("qid".into());
        config.text_column = "Question".into();
        config.language_column = Some("lang".into());
        config.default_language = Some("rw".into());
        config.topic_column = Some("Topic Category".into());
        config.metadata_columns = vec!["source".into()];

        let csv = "qid,Question,lang,Topic Category,source\n\
                   q-7,\"Hello, how are you?\",en,,web\n\
                   q-9,Amakuru?,,Greetings,sms\n";
        let items = loader(config)
            .load_from_reader(csv.as_bytes(), InputFormat::Csv)
            .unwrap();

        assert_eq!(items[0].id, "q-7");
        assert_eq!(items[0].text, "Hello, how are you?");
        assert_eq!(items[0].language.as_deref(), Some("en"));
        // 主题列为空时回退到关键词检测
        assert_eq!(items[0].topic.as_deref(), Some("Other"));
        assert_eq!(items[1].language.as_deref(), Some("rw"));
        assert_eq!(items[1].topic.as_deref(), Some("Greetings"));
        assert_eq!(items[1].metadata.get("source").map(String::as_str), Some("sms"));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let mut config = InputConfig::new("q.csv");
        config.delimiter = ';';
        let csv = "text;x\nA, B;1\n";
        let items = loader(config)
            .load_from_reader(csv.as_bytes(), InputFormat::Csv)
            .unwrap();
        assert_eq!(items[0].text, "A, B");
    }

    #[test]
    fn test_missing_text_column() {
        let csv = "question\nA\n";
        let err = loader(InputConfig::new("q.csv"))
            .load_from_reader(csv.as_bytes(), InputFormat::Csv)
            .unwrap_err();
        assert!(matches!(err, IngestionError::MissingColumn { ref column } if column == "text"));
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let csv = "text\nA\n   \n";
        let err = loader(InputConfig::new("q.csv"))
            .load_from_reader(csv.as_bytes(), InputFormat::Csv)
            .unwrap_err();
        assert!(matches!(err, IngestionError::EmptyField { row: 2, .. }), "{err}");
    }

    #[test]
    fn test_duplicate_id() {
        let mut config = InputConfig::new("q.csv");
        config.id_column = Some("id".into());
        let csv = "id,text\n1,A\n1,B\n";
        let err = loader(config)
            .load_from_reader(csv.as_bytes(), InputFormat::Csv)
            .unwrap_err();
        assert!(matches!(err, IngestionError::DuplicateId { row: 2, .. }));
    }

    #[test]
    fn test_header_only_is_empty() {
        let err = loader(InputConfig::new("q.csv"))
            .load_from_reader("text\n".as_bytes(), InputFormat::Csv)
            .unwrap_err();
        assert!(matches!(err, IngestionError::Empty { .. }));
    }

    #[test]
    fn test_jsonl() {
        let mut config = InputConfig::new("q.jsonl");
        config.id_column = Some("id".into());
        config.language_column = Some("lang".into());
        let jsonl = "{\"id\": 1, \"text\": \"Muraho\", \"lang\": \"rw\"}\n\n\
                     {\"id\": 2, \"text\": \"Hello\", \"lang\": null}\n";
        let items = loader(config)
            .load_from_reader(jsonl.as_bytes(), InputFormat::Jsonl)
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "1");
        assert_eq!(items[0].language.as_deref(), Some("rw"));
        assert_eq!(items[1].language, None);
    }

    #[test]
    fn test_jsonl_bad_line() {
        let jsonl = "{\"text\": \"ok\"}\n{not json}\n";
        let err = loader(InputConfig::new("q.jsonl"))
            .load_from_reader(jsonl.as_bytes(), InputFormat::Jsonl)
            .unwrap_err();
        assert!(matches!(err, IngestionError::Json { line: 2, .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "text").unwrap();
        writeln!(file, "Nigute nasaba pasiporo?").unwrap();
        file.flush().unwrap();

        let items = loader(InputConfig::new(file.path())).load().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].topic.as_deref(), Some("Passport Services"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = loader(InputConfig::new("/nonexistent/q.csv")).load().unwrap_err();
        assert!(matches!(err, IngestionError::Io { .. }));
    }
}

//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 → 加载 → 注册 → 分发 → 输出 的完整流程 (无网络)
//! - 引擎的超时、顺序与并发上限
//! - 失败作为数据保留在结果表中

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use backends::{BackendFactory, StaticCredentials};
    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::{DispatchEngine, EngineConfig};
    use ingestion::{ItemLoader, TopicDetector};
    use tempfile::tempdir;

    fn write_config(dir: &Path) -> String {
        let input = dir.join("questions.csv");
        fs::write(
            &input,
            "id,text,lang\n\
             q1,Malaria ivurwa ite?,rw\n\
             q2,How do I plant beans?,en\n\
             q3,Amazi meza,rw\n",
        )
        .unwrap();

        format!(
            r#"
[run]
concurrency = 4
default_timeout_ms = 2000

[input]
path = "{input}"
id_column = "id"
language_column = "lang"

[[topics]]
keyword = "malaria"
category = "Health"

[[topics]]
keyword = "beans"
category = "Agriculture"

[[backends]]
name = "echo"
provider = "echo"
params = {{ suffix = "!" }}

[[backends]]
name = "gpt"
provider = "openai"

[[backends]]
name = "round_trip"
provider = "chain"

[[backends.steps]]
name = "first"
provider = "echo"
params = {{ suffix = "-a" }}

[[backends.steps]]
name = "second"
provider = "echo"
params = {{ suffix = "-b" }}

[[sinks]]
name = "csv"
sink_type = "csv"
[sinks.params]
path = "{out}"
"#,
            input = input.display(),
            out = dir.join("out/results.csv").display(),
        )
    }

    /// config → loader → factory → engine → csv sink
    #[tokio::test]
    async fn test_e2e_config_to_csv() {
        let dir = tempdir().unwrap();
        let blueprint = ConfigLoader::load_from_str(&write_config(dir.path()), ConfigFormat::Toml)
            .expect("config should be valid");

        let items = ItemLoader::new(blueprint.input.clone(), TopicDetector::new(&blueprint.topics))
            .load()
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].topic.as_deref(), Some("Health"));
        assert_eq!(items[1].topic.as_deref(), Some("Agriculture"));

        // gpt 没有 key，跳过而不是失败
        let report = BackendFactory::new(Arc::new(StaticCredentials::new()))
            .build(&blueprint.backends)
            .unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "gpt");
        assert_eq!(report.registry.len(), 2);

        let engine = DispatchEngine::new(EngineConfig::from_run(&blueprint.run));
        let table = engine
            .run(items, report.registry.active_backends())
            .await
            .unwrap();

        assert_eq!(table.len(), 3);
        let names: Vec<&str> = table.columns().iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["echo", "round_trip"]);
        assert_eq!(
            table.rows()[2].outcome("round_trip").and_then(|o| o.text()),
            Some("Amazi meza-a-b")
        );

        let written = dispatcher::emit(&table, &blueprint.sinks).await.unwrap();
        assert_eq!(written, 1);

        let mut reader = csv::Reader::from_path(dir.path().join("out/results.csv")).unwrap();
        let headers = reader.headers().unwrap().clone();
        let answer = headers.iter().position(|h| h == "answer_echo").unwrap();
        let status = headers.iter().position(|h| h == "status_round_trip").unwrap();

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "q1");
        assert_eq!(&rows[0][answer], "Malaria ivurwa ite?!");
        assert!(rows.iter().all(|r| &r[status] == "ok"));
    }

    /// 与输出列重名的元数据列在加载阶段就被拒绝
    #[test]
    fn test_e2e_metadata_column_collision_rejected() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("questions.csv");
        fs::write(&input, "text,topic\nHello,Health\n").unwrap();

        let config = format!(
            r#"
[input]
path = "{input}"
metadata_columns = ["topic"]

[[backends]]
name = "echo"
provider = "echo"

[[sinks]]
name = "csv"
sink_type = "csv"
[sinks.params]
path = "{out}"
"#,
            input = input.display(),
            out = dir.path().join("results.csv").display(),
        );

        let err = ConfigLoader::load_from_str(&config, ConfigFormat::Toml)
            .unwrap_err()
            .to_string();
        assert!(err.contains("metadata_columns[0]"), "got: {err}");
        assert!(err.contains("'topic'"), "got: {err}");
    }

    /// 全部后端都缺少凭证时注册表为空
    #[tokio::test]
    async fn test_e2e_all_backends_skipped() {
        let dir = tempdir().unwrap();
        let mut blueprint =
            ConfigLoader::load_from_str(&write_config(dir.path()), ConfigFormat::Toml).unwrap();
        blueprint.backends.retain(|b| b.name == "gpt");

        let report = BackendFactory::new(Arc::new(StaticCredentials::new()))
            .build(&blueprint.backends)
            .unwrap();
        assert!(report.registry.is_empty());
        assert!(report.skipped[0].reason.contains("OPENAI_API_KEY"));
    }
}

#[cfg(test)]
mod engine_tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use backends::mock::{
        shared, ConcurrencyProbe, DelayedBackend, FailingBackend, FnBackend, PanickingBackend,
    };
    use contracts::{FailureKind, Item, RegisteredBackend};
    use dispatcher::{DispatchEngine, EngineConfig};

    fn items(texts: &[&str]) -> Vec<Item> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Item::new((i + 1).to_string(), *t))
            .collect()
    }

    fn engine(concurrency: usize, timeout: Duration) -> DispatchEngine {
        DispatchEngine::new(EngineConfig {
            concurrency,
            default_timeout: timeout,
            queue_capacity: 16,
        })
    }

    /// echoFast 成功，echoSlow 超时；批次不等慢后端
    #[tokio::test]
    async fn test_fast_and_slow_backends() {
        let backends = vec![
            RegisteredBackend::new(
                "echoFast",
                shared(DelayedBackend::fixed(Duration::from_millis(1), "!")),
                None,
            ),
            RegisteredBackend::new(
                "echoSlow",
                shared(DelayedBackend::fixed(Duration::from_secs(30), "?")),
                None,
            ),
        ];

        let started = Instant::now();
        let table = engine(4, Duration::from_millis(100))
            .run(items(&["A", "B"]), &backends)
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));

        for (row, expected) in table.rows().iter().zip(["A!", "B!"]) {
            assert_eq!(row.outcome("echoFast").and_then(|o| o.text()), Some(expected));
            let slow = row.outcome("echoSlow").and_then(|o| o.failure()).unwrap();
            assert_eq!(slow.kind, FailureKind::Timeout);
        }
    }

    /// 后完成的早 item 仍排在前面
    #[tokio::test]
    async fn test_rows_keep_input_order() {
        let backend = DelayedBackend::per_item(
            |item: &Item| match item.id.as_str() {
                "1" => Duration::from_millis(80),
                "2" => Duration::from_millis(40),
                _ => Duration::from_millis(1),
            },
            "",
        );
        let backends = vec![RegisteredBackend::new("echo", shared(backend), None)];

        let table = engine(3, Duration::from_secs(2))
            .run(items(&["first", "second", "third"]), &backends)
            .await
            .unwrap();

        let texts: Vec<&str> = table
            .rows()
            .iter()
            .map(|r| r.outcome("echo").and_then(|o| o.text()).unwrap())
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(20)));
        let backends = vec![RegisteredBackend::new(
            "probe",
            probe.clone() as Arc<dyn contracts::Backend>,
            None,
        )];

        let texts: Vec<String> = (0..12).map(|i| format!("item {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let table = engine(3, Duration::from_secs(2))
            .run(items(&refs), &backends)
            .await
            .unwrap();

        assert_eq!(table.len(), 12);
        assert_eq!(probe.calls(), 12);
        assert!(probe.peak() <= 3, "peak was {}", probe.peak());
        assert_eq!(probe.in_flight(), 0);
    }

    /// 失败是数据，不中断批次
    #[tokio::test]
    async fn test_failures_are_recorded() {
        let failing = Arc::new(FailingBackend::new(FailureKind::Transport, "connection reset"));
        let backends = vec![
            RegisteredBackend::new("down", failing.clone() as Arc<dyn contracts::Backend>, None),
            RegisteredBackend::new(
                "upper",
                shared(FnBackend::new(|item: &Item| Ok(item.text.to_uppercase()))),
                None,
            ),
            RegisteredBackend::new("buggy", shared(PanickingBackend), None),
        ];

        let table = engine(2, Duration::from_secs(1))
            .run(items(&["a", "b", "c"]), &backends)
            .await
            .unwrap();

        assert_eq!(failing.calls(), 3);
        for row in table.rows() {
            assert_eq!(row.success_count(), 1);
            assert_eq!(
                row.outcome("down").and_then(|o| o.failure()).map(|f| f.kind),
                Some(FailureKind::Transport)
            );
            assert_eq!(
                row.outcome("buggy").and_then(|o| o.failure()).map(|f| f.kind),
                Some(FailureKind::Internal)
            );
        }
        assert_eq!(
            table.rows()[1].outcome("upper").and_then(|o| o.text()),
            Some("B")
        );
    }

    /// 单个后端的超时覆盖全局默认值
    #[tokio::test]
    async fn test_backend_timeout_override() {
        let backends = vec![RegisteredBackend::new(
            "patient",
            shared(DelayedBackend::fixed(Duration::from_millis(150), "")),
            Some(Duration::from_secs(2)),
        )];

        let table = engine(1, Duration::from_millis(20))
            .run(items(&["x"]), &backends)
            .await
            .unwrap();
        assert!(table.rows()[0].outcome("patient").unwrap().is_success());
    }
}

//! 配置校验模块
//!
//! 校验规则：
//! - 后端名称唯一、非空、可用作列名
//! - 至少一个启用的后端
//! - 运行参数 (并发、超时、队列) > 0
//! - 重试策略合法
//! - 链式后端有步骤，非链式后端没有
//! - 翻译类后端有 target_language
//! - 自定义 prompt 只引用已知占位符
//! - 输入列与分隔符合法，元数据列不与输出表的固定列或后端列重名
//! - sink 名称唯一且必填参数齐全

use std::collections::HashSet;

use contracts::{
    BackendConfig, BackendName, BatchBlueprint, ContractError, PromptTemplate, ProviderKind,
    SinkType, TaskKind, ITEM_COLUMNS,
};

/// 校验 BatchBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &BatchBlueprint) -> Result<(), ContractError> {
    validate_run(blueprint)?;
    validate_input(blueprint)?;
    validate_topics(blueprint)?;
    validate_backend_names(blueprint)?;
    validate_enabled_backends(blueprint)?;
    for (idx, backend) in blueprint.backends.iter().enumerate() {
        validate_backend(&format!("backends[{idx}]"), backend)?;
    }
    validate_sinks(blueprint)?;
    Ok(())
}

/// 校验运行参数
fn validate_run(blueprint: &BatchBlueprint) -> Result<(), ContractError> {
    let run = &blueprint.run;
    if run.concurrency == 0 {
        return Err(ContractError::config_validation(
            "run.concurrency",
            "concurrency must be > 0",
        ));
    }
    if run.default_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "run.default_timeout_ms",
            "default_timeout_ms must be > 0",
        ));
    }
    if run.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "run.queue_capacity",
            "queue_capacity must be > 0",
        ));
    }
    Ok(())
}

/// 校验输入配置
fn validate_input(blueprint: &BatchBlueprint) -> Result<(), ContractError> {
    let input = &blueprint.input;
    if input.path.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "input.path",
            "input path cannot be empty",
        ));
    }
    if input.text_column.trim().is_empty() {
        return Err(ContractError::config_validation(
            "input.text_column",
            "text_column cannot be empty",
        ));
    }
    if !input.delimiter.is_ascii() || input.delimiter == '"' || input.delimiter == '\n' {
        return Err(ContractError::config_validation(
            "input.delimiter",
            format!("delimiter must be a single ASCII character, got {:?}", input.delimiter),
        ));
    }
    validate_metadata_columns(blueprint)
}

/// 元数据列原样成为输出表头，必须与固定列及每个后端的列组区分开
fn validate_metadata_columns(blueprint: &BatchBlueprint) -> Result<(), ContractError> {
    let backends: Vec<BackendName> = blueprint
        .backends
        .iter()
        .map(|b| BackendName::new(&b.name))
        .collect();
    let mut seen = HashSet::new();

    for (idx, column) in blueprint.input.metadata_columns.iter().enumerate() {
        let field = format!("input.metadata_columns[{idx}]");
        if column.trim().is_empty() {
            return Err(ContractError::config_validation(
                field,
                "metadata column cannot be empty",
            ));
        }
        if ITEM_COLUMNS.contains(&column.as_str()) {
            return Err(ContractError::config_validation(
                field,
                format!("metadata column '{column}' collides with a reserved output column"),
            ));
        }
        if let Some(owner) = backends.iter().find(|b| b.owns_column(column)) {
            return Err(ContractError::config_validation(
                field,
                format!("metadata column '{column}' collides with the columns of backend '{owner}'"),
            ));
        }
        if !seen.insert(column.as_str()) {
            return Err(ContractError::config_validation(
                field,
                format!("duplicate metadata column '{column}'"),
            ));
        }
    }
    Ok(())
}

/// 校验主题关键词表
fn validate_topics(blueprint: &BatchBlueprint) -> Result<(), ContractError> {
    for (idx, rule) in blueprint.topics.iter().enumerate() {
        if rule.keyword.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("topics[{idx}].keyword"),
                "topic keyword cannot be empty",
            ));
        }
        if rule.category.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("topics[{idx}].category"),
                "topic category cannot be empty",
            ));
        }
    }
    Ok(())
}

/// 校验后端名称唯一性与格式 (仅顶层；链式步骤名只用于错误消息)
fn validate_backend_names(blueprint: &BatchBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for backend in &blueprint.backends {
        if !BackendName::is_valid(&backend.name) {
            return Err(ContractError::config_validation(
                format!("backends[name={}]", backend.name),
                "backend name must be non-empty and contain only ASCII letters, digits, '_', '-' or '.'",
            ));
        }
        if !seen.insert(backend.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("backends[name={}]", backend.name),
                "duplicate backend name",
            ));
        }
    }
    Ok(())
}

fn validate_enabled_backends(blueprint: &BatchBlueprint) -> Result<(), ContractError> {
    if blueprint.enabled_backends().next().is_none() {
        return Err(ContractError::config_validation(
            "backends",
            "at least one enabled backend is required",
        ));
    }
    Ok(())
}

/// 校验单个后端 (递归校验链式步骤)
fn validate_backend(field: &str, backend: &BackendConfig) -> Result<(), ContractError> {
    if backend.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            format!("{field}.name"),
            "backend name cannot be empty",
        ));
    }

    if backend.timeout_ms == Some(0) {
        return Err(ContractError::config_validation(
            format!("{field}.timeout_ms"),
            "timeout_ms must be > 0",
        ));
    }

    if backend.max_in_flight == Some(0) {
        return Err(ContractError::config_validation(
            format!("{field}.max_in_flight"),
            "max_in_flight must be > 0",
        ));
    }

    let retry = &backend.retry;
    if retry.max_attempts == 0 {
        return Err(ContractError::config_validation(
            format!("{field}.retry.max_attempts"),
            "max_attempts must be >= 1",
        ));
    }
    if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
        return Err(ContractError::config_validation(
            format!("{field}.retry.multiplier"),
            format!("multiplier must be >= 1.0, got {}", retry.multiplier),
        ));
    }
    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return Err(ContractError::config_validation(
            format!("{field}.retry"),
            format!(
                "initial_backoff_ms ({}) must be <= max_backoff_ms ({})",
                retry.initial_backoff_ms, retry.max_backoff_ms
            ),
        ));
    }

    match backend.provider {
        ProviderKind::Chain => {
            if backend.steps.is_empty() {
                return Err(ContractError::config_validation(
                    format!("{field}.steps"),
                    "chain backend requires at least one step",
                ));
            }
        }
        _ if !backend.steps.is_empty() => {
            return Err(ContractError::config_validation(
                format!("{field}.steps"),
                format!(
                    "steps are only allowed for chain backends, not '{}'",
                    backend.provider.as_str()
                ),
            ));
        }
        _ => {}
    }

    let needs_target =
        backend.provider.is_translation_service() || backend.task == TaskKind::Translate;
    if needs_target && backend.target_language.is_none() {
        return Err(ContractError::config_validation(
            format!("{field}.target_language"),
            "target_language is required for translation backends",
        ));
    }

    if let Some(ref template) = backend.prompt {
        if let Err(e) = PromptTemplate::parse(template) {
            return Err(ContractError::config_validation(
                format!("{field}.prompt"),
                e.to_string(),
            ));
        }
    }

    if let Some(temperature) = backend.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ContractError::config_validation(
                format!("{field}.temperature"),
                format!("temperature must be within 0.0..=2.0, got {temperature}"),
            ));
        }
    }

    for (idx, step) in backend.steps.iter().enumerate() {
        validate_backend(&format!("{field}.steps[{idx}]"), step)?;
    }

    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &BatchBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        let needs_path = matches!(sink.sink_type, SinkType::Csv | SinkType::Json);
        if needs_path && !sink.params.contains_key("path") {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.path", idx),
                "file sinks require a 'path' param",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfigVersion, InputConfig, RunConfig, SinkConfig, TopicRule};

    fn minimal_blueprint() -> BatchBlueprint {
        BatchBlueprint {
            version: ConfigVersion::V1,
            run: RunConfig::default(),
            input: InputConfig::new("questions.csv"),
            topics: vec![TopicRule {
                keyword: "pasiporo".into(),
                category: "Passport Services".into(),
            }],
            backends: vec![
                BackendConfig::new("echo", ProviderKind::Echo),
                BackendConfig::new("gpt-4o", ProviderKind::Openai),
            ],
            sinks: vec![SinkConfig::new("csv", SinkType::Csv).with_param("path", "out.csv")],
        }
    }

    fn assert_invalid(bp: &BatchBlueprint, needle: &str) {
        let result = validate(bp);
        assert!(result.is_err(), "expected failure containing '{needle}'");
        let err = result.unwrap_err().to_string();
        assert!(err.contains(needle), "got: {err}");
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_duplicate_backend_name() {
        let mut bp = minimal_blueprint();
        bp.backends.push(BackendConfig::new("echo", ProviderKind::Echo));
        assert_invalid(&bp, "duplicate backend name");
    }

    #[test]
    fn test_backend_name_must_be_column_safe() {
        let mut bp = minimal_blueprint();
        bp.backends[0].name = "gpt 4o".into();
        assert_invalid(&bp, "ASCII letters");
    }

    #[test]
    fn test_all_backends_disabled() {
        let mut bp = minimal_blueprint();
        for backend in &mut bp.backends {
            backend.enabled = false;
        }
        assert_invalid(&bp, "at least one enabled backend");
    }

    #[test]
    fn test_zero_concurrency() {
        let mut bp = minimal_blueprint();
        bp.run.concurrency = 0;
        assert_invalid(&bp, "concurrency must be > 0");
    }

    #[test]
    fn test_zero_timeout_override() {
        let mut bp = minimal_blueprint();
        bp.backends[1].timeout_ms = Some(0);
        assert_invalid(&bp, "backends[1].timeout_ms");
    }

    #[test]
    fn test_invalid_retry() {
        let mut bp = minimal_blueprint();
        bp.backends[1].retry.multiplier = 0.5;
        assert_invalid(&bp, "multiplier must be >= 1.0");

        let mut bp = minimal_blueprint();
        bp.backends[1].retry.initial_backoff_ms = 10_000;
        assert_invalid(&bp, "must be <= max_backoff_ms");

        let mut bp = minimal_blueprint();
        bp.backends[1].retry.max_attempts = 0;
        assert_invalid(&bp, "max_attempts must be >= 1");
    }

    #[test]
    fn test_chain_requires_steps() {
        let mut bp = minimal_blueprint();
        bp.backends
            .push(BackendConfig::new("rw-gpt-rw", ProviderKind::Chain));
        assert_invalid(&bp, "at least one step");
    }

    #[test]
    fn test_steps_only_on_chain() {
        let mut bp = minimal_blueprint();
        bp.backends[0]
            .steps
            .push(BackendConfig::new("inner", ProviderKind::Echo));
        assert_invalid(&bp, "only allowed for chain");
    }

    #[test]
    fn test_chain_steps_are_validated() {
        let mut bp = minimal_blueprint();
        let mut chain = BackendConfig::new("rw-gpt-rw", ProviderKind::Chain);
        chain
            .steps
            .push(BackendConfig::new("to_en", ProviderKind::GoogleTranslate));
        bp.backends.push(chain);
        assert_invalid(&bp, "backends[2].steps[0].target_language");
    }

    #[test]
    fn test_translation_requires_target() {
        let mut bp = minimal_blueprint();
        bp.backends
            .push(BackendConfig::new("du", ProviderKind::DigitalUmuganda));
        assert_invalid(&bp, "target_language is required");

        let mut bp = minimal_blueprint();
        bp.backends[1].task = TaskKind::Translate;
        assert_invalid(&bp, "target_language is required");
    }

    #[test]
    fn test_unknown_prompt_placeholder() {
        let mut bp = minimal_blueprint();
        bp.backends[1].prompt = Some("Answer {question}".into());
        assert_invalid(&bp, "unknown placeholder");
    }

    #[test]
    fn test_temperature_range() {
        let mut bp = minimal_blueprint();
        bp.backends[1].temperature = Some(3.5);
        assert_invalid(&bp, "temperature must be within");
    }

    #[test]
    fn test_empty_topic_keyword() {
        let mut bp = minimal_blueprint();
        bp.topics[0].keyword = " ".into();
        assert_invalid(&bp, "topic keyword cannot be empty");
    }

    #[test]
    fn test_bad_delimiter() {
        let mut bp = minimal_blueprint();
        bp.input.delimiter = '§';
        assert_invalid(&bp, "delimiter must be a single ASCII character");
    }

    #[test]
    fn test_metadata_column_reserved_name() {
        let mut bp = minimal_blueprint();
        bp.input.metadata_columns = vec!["source".into(), "topic".into()];
        assert_invalid(&bp, "'topic' collides with a reserved output column");
    }

    #[test]
    fn test_metadata_column_backend_collision() {
        let mut bp = minimal_blueprint();
        bp.input.metadata_columns = vec!["status_gpt-4o".into()];
        assert_invalid(&bp, "collides with the columns of backend 'gpt-4o'");

        bp.input.metadata_columns = vec!["latency_ms_echo".into()];
        assert_invalid(&bp, "backend 'echo'");
    }

    #[test]
    fn test_metadata_columns_unique() {
        let mut bp = minimal_blueprint();
        bp.input.metadata_columns = vec!["source".into(), "source".into()];
        assert_invalid(&bp, "duplicate metadata column 'source'");

        bp.input.metadata_columns = vec!["source".into(), "answer_key".into()];
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].name = String::new();
        assert_invalid(&bp, "cannot be empty");
    }

    #[test]
    fn test_file_sink_requires_path() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(SinkConfig::new("report", SinkType::Json));
        assert_invalid(&bp, "require a 'path' param");
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(SinkConfig::new("csv", SinkType::Log));
        assert_invalid(&bp, "duplicate sink name");
    }
}

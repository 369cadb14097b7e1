//! `info` command implementation.

use anyhow::{Context, Result};
use backends::{credential_status, CredentialSource, CredentialStatus, EnvCredentials};
use contracts::{BackendConfig, BatchBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    run: RunInfo,
    input: InputInfo,
    backends: Vec<BackendInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    topics: Vec<TopicInfo>,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct RunInfo {
    concurrency: usize,
    default_timeout_ms: u64,
    queue_capacity: usize,
}

#[derive(Serialize)]
struct InputInfo {
    path: String,
    format: String,
    text_column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic_column: Option<String>,
}

#[derive(Serialize)]
struct BackendInfo {
    name: String,
    provider: &'static str,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential: Option<CredentialInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    steps: Vec<BackendInfo>,
}

#[derive(Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum CredentialInfo {
    NotRequired,
    Present { variable: String, masked: String },
    Missing { variable: String },
}

impl From<CredentialStatus> for CredentialInfo {
    fn from(status: CredentialStatus) -> Self {
        match status {
            CredentialStatus::NotRequired => Self::NotRequired,
            CredentialStatus::Present { variable, masked } => Self::Present { variable, masked },
            CredentialStatus::Missing { variable } => Self::Missing { variable },
        }
    }
}

impl std::fmt::Display for CredentialInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRequired => write!(f, "not required"),
            Self::Present { variable, masked } => write!(f, "{variable}={masked}"),
            Self::Missing { variable } => write!(f, "{variable} not set"),
        }
    }
}

#[derive(Serialize)]
struct TopicInfo {
    keyword: String,
    category: String,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let credentials = args.credentials.then_some(&EnvCredentials as &dyn CredentialSource);
    let info = build_config_info(&blueprint, credentials);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(
    blueprint: &BatchBlueprint,
    credentials: Option<&dyn CredentialSource>,
) -> ConfigInfo {
    let input = &blueprint.input;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        run: RunInfo {
            concurrency: blueprint.run.concurrency,
            default_timeout_ms: blueprint.run.default_timeout_ms,
            queue_capacity: blueprint.run.queue_capacity,
        },
        input: InputInfo {
            path: input.path.display().to_string(),
            format: format!("{:?}", input.resolved_format()).to_lowercase(),
            text_column: input.text_column.clone(),
            id_column: input.id_column.clone(),
            language_column: input.language_column.clone(),
            topic_column: input.topic_column.clone(),
        },
        backends: blueprint
            .backends
            .iter()
            .map(|b| backend_info(b, credentials))
            .collect(),
        topics: blueprint
            .topics
            .iter()
            .map(|t| TopicInfo {
                keyword: t.keyword.clone(),
                category: t.category.clone(),
            })
            .collect(),
        sinks: blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type).to_lowercase(),
                path: s.params.get("path").cloned(),
            })
            .collect(),
    }
}

fn backend_info(config: &BackendConfig, credentials: Option<&dyn CredentialSource>) -> BackendInfo {
    BackendInfo {
        name: config.name.clone(),
        provider: config.provider.as_str(),
        enabled: config.enabled,
        model: config.model.clone(),
        task: format!("{:?}", config.task).to_lowercase(),
        timeout_ms: config.timeout_ms,
        credential: credentials.map(|source| credential_status(source, config).into()),
        steps: config
            .steps
            .iter()
            .map(|step| backend_info(step, credentials))
            .collect(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== evalmux Configuration ===\n");

    println!("Run");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Concurrency: {}", info.run.concurrency);
    println!("   ├─ Default timeout: {} ms", info.run.default_timeout_ms);
    println!("   └─ Queue capacity: {}", info.run.queue_capacity);

    println!("\nInput");
    println!("   ├─ Path: {} ({})", info.input.path, info.input.format);
    println!("   ├─ Text column: {}", info.input.text_column);
    println!(
        "   ├─ Id column: {}",
        info.input.id_column.as_deref().unwrap_or("(row number)")
    );
    println!(
        "   ├─ Language column: {}",
        info.input.language_column.as_deref().unwrap_or("(none)")
    );
    println!(
        "   └─ Topic column: {}",
        info.input.topic_column.as_deref().unwrap_or("(keyword detection)")
    );

    println!("\nBackends ({})", info.backends.len());
    for (i, backend) in info.backends.iter().enumerate() {
        let is_last = i + 1 == info.backends.len();
        print_backend(backend, if is_last { "└─" } else { "├─" }, if is_last { "   " } else { "│  " });
    }

    if !info.topics.is_empty() {
        println!("\nTopics ({})", info.topics.len());
        for (i, topic) in info.topics.iter().enumerate() {
            let prefix = if i + 1 == info.topics.len() { "└─" } else { "├─" };
            println!("   {} '{}' → {}", prefix, topic.keyword, topic.category);
        }
    }

    println!("\nSinks ({})", info.sinks.len());
    for (i, sink) in info.sinks.iter().enumerate() {
        let prefix = if i + 1 == info.sinks.len() { "└─" } else { "├─" };
        match &sink.path {
            Some(path) => println!("   {} {} ({}) → {}", prefix, sink.name, sink.sink_type, path),
            None => println!("   {} {} ({})", prefix, sink.name, sink.sink_type),
        }
    }

    println!();
}

fn print_backend(backend: &BackendInfo, prefix: &str, child_prefix: &str) {
    let state = if backend.enabled { "" } else { " [disabled]" };
    let model = backend
        .model
        .as_deref()
        .map(|m| format!(", {m}"))
        .unwrap_or_default();
    println!(
        "   {} {} ({}{}, {}){}",
        prefix, backend.name, backend.provider, model, backend.task, state
    );
    if let Some(ref credential) = backend.credential {
        println!("   {}  └─ credential: {}", child_prefix, credential);
    }
    for (j, step) in backend.steps.iter().enumerate() {
        let step_prefix = if j + 1 == backend.steps.len() { "└─" } else { "├─" };
        println!(
            "   {}  {} step {}: {} ({})",
            child_prefix, step_prefix, j + 1, step.name, step.provider
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backends::StaticCredentials;
    use contracts::{InputConfig, ProviderKind, RunConfig, SinkConfig, SinkType, TopicRule};

    fn blueprint() -> BatchBlueprint {
        let mut chain = BackendConfig::new("rw-gpt", ProviderKind::Chain);
        chain.steps = vec![BackendConfig::new("answer", ProviderKind::Openai)];

        BatchBlueprint {
            version: Default::default(),
            run: RunConfig::default(),
            input: InputConfig::new("questions.jsonl"),
            topics: vec![TopicRule {
                keyword: "malaria".into(),
                category: "Health".into(),
            }],
            backends: vec![BackendConfig::new("gpt", ProviderKind::Openai), chain],
            sinks: vec![SinkConfig::new("csv", SinkType::Csv).with_param("path", "out.csv")],
        }
    }

    #[test]
    fn test_info_json_masks_credentials() {
        let source = StaticCredentials::new().with("OPENAI_API_KEY", "sk-abcdefghijkl");
        let info = build_config_info(&blueprint(), Some(&source));
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["input"]["format"], "jsonl");
        assert_eq!(json["backends"][0]["credential"]["state"], "present");
        assert_eq!(json["backends"][0]["credential"]["masked"], "sk-a*******ijkl");
        assert_eq!(json["backends"][1]["credential"]["state"], "not_required");
        assert_eq!(json["backends"][1]["steps"][0]["credential"]["state"], "present");
        assert_eq!(json["topics"][0]["category"], "Health");
        assert_eq!(json["sinks"][0]["path"], "out.csv");
        assert!(!json.to_string().contains("sk-abcdefghijkl"));
    }

    #[test]
    fn test_info_without_credentials_flag() {
        let info = build_config_info(&blueprint(), None);
        let json = serde_json::to_value(&info).unwrap();
        assert!(json["backends"][0].get("credential").is_none());
    }
}

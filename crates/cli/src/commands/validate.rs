//! `validate` command implementation.

use anyhow::{Context, Result};
use backends::{credential_status, CredentialSource, CredentialStatus, EnvCredentials};
use contracts::{BackendConfig, BatchBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    input: String,
    backend_count: usize,
    enabled_backend_count: usize,
    topic_count: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args, &EnvCredentials);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs, credentials: &dyn CredentialSource) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint, credentials);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    input: blueprint.input.path.display().to_string(),
                    backend_count: blueprint.backends.len(),
                    enabled_backend_count: blueprint.enabled_backends().count(),
                    topic_count: blueprint.topics.len(),
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &BatchBlueprint, credentials: &dyn CredentialSource) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - results will only be summarized".to_string());
    }

    if !blueprint.input.path.exists() {
        warnings.push(format!(
            "Input file does not exist yet: {}",
            blueprint.input.path.display()
        ));
    }

    for backend in &blueprint.backends {
        if !backend.enabled {
            warnings.push(format!("Backend '{}' is disabled", backend.name));
            continue;
        }
        missing_credentials(backend, &backend.name, credentials, &mut warnings);
    }

    warnings
}

/// 链式后端递归检查每一步
fn missing_credentials(
    config: &BackendConfig,
    label: &str,
    credentials: &dyn CredentialSource,
    warnings: &mut Vec<String>,
) {
    if let CredentialStatus::Missing { variable } = credential_status(credentials, config) {
        warnings.push(format!(
            "Backend '{label}' will be skipped: {variable} is not set"
        ));
    }
    for step in &config.steps {
        missing_credentials(step, &format!("{label}/{}", step.name), credentials, warnings);
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Input: {}", summary.input);
            println!(
                "  Backends: {} ({} enabled)",
                summary.backend_count, summary.enabled_backend_count
            );
            println!("  Topics: {}", summary.topic_count);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

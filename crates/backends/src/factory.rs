//! BackendFactory 核心实现
//!
//! 从 `BackendConfig` 列表构建注册表。配置不完整的后端被跳过而不是半启用。

use std::collections::HashSet;
use std::sync::Arc;

use contracts::{Backend, BackendConfig, ContractError, ProviderKind};
use tracing::{info, instrument, warn};

use crate::adapters::{
    AnthropicBackend, ChainBackend, ChainStep, ConcurrencyLimited, EchoBackend,
    GoogleTranslateBackend, OpenAiBackend, UmugandaBackend,
};
use crate::credentials::{resolve_api_key, CredentialSource, EnvCredentials};
use crate::registry::BackendRegistry;

/// 被跳过的后端
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBackend {
    pub name: String,
    pub provider: ProviderKind,
    pub reason: String,
}

/// 构建结果
#[derive(Debug)]
pub struct BuildReport {
    pub registry: BackendRegistry,
    pub skipped: Vec<SkippedBackend>,
}

/// Backend Factory
pub struct BackendFactory {
    credentials: Arc<dyn CredentialSource>,
}

impl BackendFactory {
    pub fn new(credentials: Arc<dyn CredentialSource>) -> Self {
        Self { credentials }
    }

    /// 从进程环境读取凭证
    pub fn from_env() -> Self {
        Self::new(Arc::new(EnvCredentials))
    }

    /// 构建所有后端
    ///
    /// 已禁用、缺少凭证或无法构造的后端记录在 `skipped` 中；
    /// 名称重复属于缺陷，直接返回错误。
    #[instrument(
        name = "backend_factory_build",
        skip(self, configs),
        fields(backend_count = configs.len())
    )]
    pub fn build(&self, configs: &[BackendConfig]) -> Result<BuildReport, ContractError> {
        let mut registry = BackendRegistry::new();
        let mut skipped = Vec::new();
        let mut seen = HashSet::new();

        for config in configs {
            if !seen.insert(config.name.as_str()) {
                return Err(ContractError::DuplicateBackend {
                    name: config.name.clone(),
                });
            }

            if !config.enabled {
                info!(backend = %config.name, "backend disabled, skipping");
                skipped.push(SkippedBackend {
                    name: config.name.clone(),
                    provider: config.provider,
                    reason: "disabled in configuration".to_string(),
                });
                continue;
            }

            match self.build_backend(config) {
                Ok(backend) => {
                    registry.register(config.name.as_str(), backend, config.timeout())?;
                }
                Err(e) if e.is_configuration() => {
                    warn!(
                        backend = %config.name,
                        provider = config.provider.as_str(),
                        error = %e,
                        "backend not available, skipping"
                    );
                    skipped.push(SkippedBackend {
                        name: config.name.clone(),
                        provider: config.provider,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            active = registry.len(),
            skipped = skipped.len(),
            "backend registry built"
        );
        Ok(BuildReport { registry, skipped })
    }

    /// 构建单个后端 (含 `max_in_flight` 包装)
    pub fn build_backend(&self, config: &BackendConfig) -> Result<Arc<dyn Backend>, ContractError> {
        let backend: Arc<dyn Backend> = match config.provider {
            ProviderKind::Openai | ProviderKind::Groq => {
                Arc::new(OpenAiBackend::new(config, self.api_key(config)?)?)
            }
            ProviderKind::Anthropic => Arc::new(AnthropicBackend::new(config, self.api_key(config)?)?),
            ProviderKind::GoogleTranslate => {
                Arc::new(GoogleTranslateBackend::new(config, self.api_key(config)?)?)
            }
            ProviderKind::DigitalUmuganda => {
                Arc::new(UmugandaBackend::new(config, self.api_key(config)?)?)
            }
            ProviderKind::Chain => Arc::new(self.build_chain(config)?),
            ProviderKind::Echo => Arc::new(EchoBackend::from_config(config)?),
        };

        Ok(match config.max_in_flight {
            Some(limit) => Arc::new(ConcurrencyLimited::new(backend, limit)),
            None => backend,
        })
    }

    fn api_key(&self, config: &BackendConfig) -> Result<String, ContractError> {
        resolve_api_key(self.credentials.as_ref(), config)?.ok_or_else(|| {
            ContractError::backend_construction(&config.name, "provider requires an api key")
        })
    }

    /// 任一步骤无法构建时整个链被跳过
    fn build_chain(&self, config: &BackendConfig) -> Result<ChainBackend, ContractError> {
        if config.steps.is_empty() {
            return Err(ContractError::backend_construction(
                &config.name,
                "chain has no steps",
            ));
        }

        let steps = config
            .steps
            .iter()
            .map(|step| {
                let backend = self.build_backend(step).map_err(|e| {
                    if e.is_configuration() {
                        ContractError::backend_construction(
                            &config.name,
                            format!("step '{}': {e}", step.name),
                        )
                    } else {
                        e
                    }
                })?;
                Ok(ChainStep {
                    name: step.name.clone(),
                    backend,
                    output_language: step.target_language.clone(),
                })
            })
            .collect::<Result<Vec<_>, ContractError>>()?;

        Ok(ChainBackend::new(steps))
    }
}

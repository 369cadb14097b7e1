//! 本地回显后端，用于 dry run 与测试

use std::time::Duration;

use async_trait::async_trait;
use contracts::{Backend, BackendConfig, ContractError, Deadline, Failure, Item};

/// 在可选延迟后返回 `text + suffix`
#[derive(Debug, Clone, Default)]
pub struct EchoBackend {
    suffix: String,
    delay: Duration,
}

impl EchoBackend {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// params: `suffix` (默认为空)、`delay_ms` (默认 0)
    pub fn from_config(config: &BackendConfig) -> Result<Self, ContractError> {
        let suffix = config.params.get("suffix").cloned().unwrap_or_default();
        let delay_ms = match config.params.get("delay_ms") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ContractError::backend_construction(
                    &config.name,
                    format!("delay_ms must be a non-negative integer, got '{raw}'"),
                )
            })?,
            None => 0,
        };
        Ok(Self::new(suffix).with_delay(Duration::from_millis(delay_ms)))
    }
}

#[async_trait]
impl Backend for EchoBackend {
    fn provider(&self) -> &str {
        "echo"
    }

    async fn query(&self, item: &Item, _deadline: Deadline) -> Result<String, Failure> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(format!("{}{}", item.text, self.suffix))
    }
}

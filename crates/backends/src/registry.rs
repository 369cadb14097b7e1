//! BackendRegistry - 本次运行的后端集合
//!
//! 注册顺序即输出列顺序。缺少配置的后端不会出现在这里。

use std::sync::Arc;
use std::time::Duration;

use contracts::{Backend, BackendName, ContractError, RegisteredBackend};
use tracing::{debug, info};

/// 已启用后端的有序集合
#[derive(Debug, Default, Clone)]
pub struct BackendRegistry {
    backends: Vec<RegisteredBackend>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册后端，名称重复时返回 `DuplicateBackend`
    pub fn register(
        &mut self,
        name: impl Into<BackendName>,
        backend: Arc<dyn Backend>,
        timeout: Option<Duration>,
    ) -> Result<(), ContractError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(ContractError::DuplicateBackend {
                name: name.to_string(),
            });
        }

        debug!(backend = %name, provider = backend.provider(), ?timeout, "backend registered");
        self.backends
            .push(RegisteredBackend::new(name, backend, timeout));
        Ok(())
    }

    /// 按注册顺序返回
    pub fn active_backends(&self) -> &[RegisteredBackend] {
        &self.backends
    }

    pub fn names(&self) -> Vec<BackendName> {
        self.backends.iter().map(|b| b.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredBackend> {
        self.backends.iter().find(|b| b.name == name)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// 只保留给定名称的后端 (保持注册顺序)
    ///
    /// 返回不存在于注册表中的名称，由调用方决定如何报告。
    pub fn retain<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let unknown = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|n| self.get(n).is_none())
            .map(str::to_string)
            .collect();

        let before = self.backends.len();
        self.backends
            .retain(|b| names.iter().any(|n| b.name == n.as_ref()));
        info!(
            kept = self.backends.len(),
            dropped = before - self.backends.len(),
            "backend filter applied"
        );
        unknown
    }
}

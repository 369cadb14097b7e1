//! 凭证查找

use std::collections::HashMap;

use contracts::{BackendConfig, ContractError};

/// 凭证来源
pub trait CredentialSource: Send + Sync {
    /// 读取变量，不存在时返回 `None`
    fn get(&self, variable: &str) -> Option<String>;

    /// 读取变量，空白值视为缺失
    fn lookup(&self, variable: &str) -> Option<String> {
        self.get(variable)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// 进程环境变量 (`.env` 在启动时已由 dotenvy 载入)
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn get(&self, variable: &str) -> Option<String> {
        std::env::var(variable).ok()
    }
}

/// 固定映射，测试与嵌入场景使用
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, variable: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(variable.into(), value.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn get(&self, variable: &str) -> Option<String> {
        self.values.get(variable).cloned()
    }
}

/// 后端凭证状态 (info 命令使用)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStatus {
    /// 提供方不需要凭证
    NotRequired,
    Present { variable: String, masked: String },
    Missing { variable: String },
}

/// 解析后端的 API key
///
/// 返回 `Ok(None)` 表示该提供方无需凭证。
pub fn resolve_api_key(
    source: &dyn CredentialSource,
    config: &BackendConfig,
) -> Result<Option<String>, ContractError> {
    let Some(variable) = config.key_env() else {
        return Ok(None);
    };
    source
        .lookup(variable)
        .map(Some)
        .ok_or_else(|| ContractError::missing_credential(&config.name, variable))
}

/// 不泄露内容地检查凭证
pub fn credential_status(source: &dyn CredentialSource, config: &BackendConfig) -> CredentialStatus {
    match config.key_env() {
        None => CredentialStatus::NotRequired,
        Some(variable) => match source.lookup(variable) {
            Some(value) => CredentialStatus::Present {
                variable: variable.to_string(),
                masked: mask_secret(&value),
            },
            None => CredentialStatus::Missing {
                variable: variable.to_string(),
            },
        },
    }
}

/// 遮盖密钥：保留首尾各 4 个字符，8 个字符及以下全部遮盖
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}

//! Outcome / Failure - 单个 (Item, Backend) 查询的结果

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// 失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 超过调用截止时间
    Timeout,
    /// 网络/连接错误或 5xx
    Transport,
    /// 429 或提供方限流
    RateLimited,
    /// 提供方拒绝 (4xx、内容过滤、不支持的语言对)
    ProviderRejected,
    /// 响应无法解析或不含答案
    MalformedResponse,
    /// 适配器 panic 或任务异常结束
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::RateLimited => "rate_limited",
            Self::ProviderRejected => "provider_rejected",
            Self::MalformedResponse => "malformed_response",
            Self::Internal => "internal",
        }
    }

    /// 适配器内部是否值得重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport | Self::RateLimited)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 带类型的失败
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("no response within {}ms", after.as_millis()),
        )
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimited, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ProviderRejected, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedResponse, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }

    /// 在消息前加上上下文，保持 kind 不变
    pub fn context(self, prefix: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{prefix}: {}", self.message),
        }
    }
}

/// 一次 (Item, Backend) 查询的结果
///
/// 恰好一个变体成立，不存在部分填充的状态。
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { text: String, latency: Duration },
    Failure(Failure),
}

impl Outcome {
    pub fn success(text: impl Into<String>, latency: Duration) -> Self {
        Self::Success {
            text: text.into(),
            latency,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success { text, .. } => Some(text),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    pub fn latency(&self) -> Option<Duration> {
        match self {
            Self::Success { latency, .. } => Some(*latency),
            Self::Failure(_) => None,
        }
    }

    /// 状态标签：成功为 "ok"，失败为其 kind
    pub fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "ok",
            Self::Failure(failure) => failure.kind.as_str(),
        }
    }
}

impl From<Failure> for Outcome {
    fn from(failure: Failure) -> Self {
        Self::Failure(failure)
    }
}

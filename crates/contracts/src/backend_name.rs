//! BackendName - 后端名称
//!
//! 后端名称同时是结果表的列组标识 (`answer_<name>` / `status_<name>`)，
//! 注册后在每个 Resolution 中被克隆，因此内部使用 `Arc<str>`。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// 后端名称，克隆为 O(1)
///
/// ```
/// use contracts::BackendName;
///
/// let name: BackendName = "gpt-4o".into();
/// assert_eq!(name.answer_column(), "answer_gpt-4o");
/// assert!(BackendName::is_valid("claude_3.5"));
/// assert!(!BackendName::is_valid("has space"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendName(Arc<str>);

impl BackendName {
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 名称是否可以安全地用作输出列名
    ///
    /// 只允许 ASCII 字母数字以及 `_` `-` `.`，且非空。
    pub fn is_valid(name: &str) -> bool {
        !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
    }

    /// 答案列名
    pub fn answer_column(&self) -> String {
        format!("answer_{}", self.0)
    }

    /// 状态列名
    pub fn status_column(&self) -> String {
        format!("status_{}", self.0)
    }

    /// 延迟列名 (毫秒)
    pub fn latency_column(&self) -> String {
        format!("latency_ms_{}", self.0)
    }

    /// `column` 是否是本后端列组中的一列
    pub fn owns_column(&self, column: &str) -> bool {
        ["answer_", "status_", "latency_ms_"]
            .iter()
            .any(|prefix| column.strip_prefix(prefix) == Some(self.as_str()))
    }
}

impl Deref for BackendName {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for BackendName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for BackendName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BackendName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BackendName {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl PartialEq<str> for BackendName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for BackendName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackendName({:?})", self.0)
    }
}

impl Serialize for BackendName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BackendName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

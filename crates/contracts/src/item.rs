//! Item - 输入单元

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 一个待所有后端回答/翻译的输入单元
///
/// 加载后不可变。`id` 为显式 id 列的值，或从 1 开始的行号。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// 稳定标识符
    pub id: String,

    /// 主文本
    pub text: String,

    /// 源语言标签 (e.g. "rw", "en")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// 主题分类
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// 其他元数据列 (按键排序)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Item {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            language: None,
            topic: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 以新文本派生一个 Item，保留 id 与元数据
    ///
    /// 链式后端把上一步的输出作为下一步的输入时使用。
    pub fn derive_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let item = Item::new("7", "Ndashaka pasiporo")
            .with_language("rw")
            .with_topic("Passport Services")
            .with_metadata("source", "survey");
        assert_eq!(item.language.as_deref(), Some("rw"));
        assert_eq!(item.metadata.get("source").map(String::as_str), Some("survey"));
    }

    #[test]
    fn test_derive_text_keeps_identity() {
        let item = Item::new("1", "Muraho").with_language("rw");
        let derived = item.derive_text("Hello");
        assert_eq!(derived.id, "1");
        assert_eq!(derived.text, "Hello");
        assert_eq!(derived.language, item.language);
    }
}

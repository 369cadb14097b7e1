//! 关键词主题检测

use contracts::TopicRule;

/// 未命中任何关键词时的分类
pub const DEFAULT_TOPIC: &str = "Other";

/// 按关键词表检测主题
///
/// 大小写不敏感的子串匹配，按配置顺序第一个命中的关键词决定分类。
#[derive(Debug, Clone, Default)]
pub struct TopicDetector {
    /// (小写关键词, 分类)
    rules: Vec<(String, String)>,
}

impl TopicDetector {
    pub fn new(rules: &[TopicRule]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|r| (r.keyword.to_lowercase(), r.category.clone()))
                .collect(),
        }
    }

    /// 没有配置关键词
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 检测文本主题
    ///
    /// 关键词表为空时返回 `None` (不做检测)，否则总是返回一个分类。
    pub fn detect(&self, text: &str) -> Option<&str> {
        if self.rules.is_empty() {
            return None;
        }
        let lowered = text.to_lowercase();
        let category = self
            .rules
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword.as_str()))
            .map(|(_, category)| category.as_str())
            .unwrap_or(DEFAULT_TOPIC);
        Some(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(keyword: &str, category: &str) -> TopicRule {
        TopicRule {
            keyword: keyword.into(),
            category: category.into(),
        }
    }

    #[test]
    fn test_first_match_wins() {
        let detector = TopicDetector::new(&[
            rule("icyemezo", "Certificates"),
            rule("amavuko", "Birth Certificate"),
        ]);
        assert_eq!(
            detector.detect("Nakura he icyemezo cy'amavuko?"),
            Some("Certificates")
        );
    }

    #[test]
    fn test_case_insensitive() {
        let detector = TopicDetector::new(&[rule("Traffic fine", "Traffic Fines")]);
        assert_eq!(
            detector.detect("How do I pay a TRAFFIC FINE online?"),
            Some("Traffic Fines")
        );
    }

    #[test]
    fn test_default_category() {
        let detector = TopicDetector::new(&[rule("pasiporo", "Passport Services")]);
        assert_eq!(detector.detect("Muraho neza"), Some(DEFAULT_TOPIC));
    }

    #[test]
    fn test_empty_table_detects_nothing() {
        let detector = TopicDetector::default();
        assert!(detector.is_empty());
        assert_eq!(detector.detect("anything"), None);
    }
}

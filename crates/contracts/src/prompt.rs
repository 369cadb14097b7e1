//! PromptTemplate - 后端 prompt 模板
//!
//! 占位符：`{text}` `{id}` `{language}` `{target_language}` `{topic}`，
//! `{{` / `}}` 为转义。模板在构造时解析一次，渲染时单次扫描，
//! 因此 Item 文本中出现的 `{language}` 不会被二次替换。

use thiserror::Error;

use crate::{Item, TaskKind};

/// 模板错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("unclosed '{{' at byte {0}")]
    Unclosed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Text,
    Id,
    Language,
    TargetLanguage,
    Topic,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "text" => Some(Self::Text),
            "id" => Some(Self::Id),
            "language" => Some(Self::Language),
            "target_language" => Some(Self::TargetLanguage),
            "topic" => Some(Self::Topic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Placeholder),
}

const ANSWER_TEMPLATE: &str = "You are a helpful assistant who speaks fluent {language}.\n\n\
Respond to the following question in {language}. Keep your answer professional, \
helpful, and concise (1-3 sentences maximum).\n\n\
Question: {text}\n\n\
Answer in {language}:";

const FLUENCY_TEMPLATE: &str = "You are a fluency evaluator for {language}.\n\n\
Please evaluate the fluency of the following text on a scale of 1-10, \
where 1 is completely unnatural and 10 is perfectly natural, fluent {language}.\n\n\
Only respond with a single number between 1 and 10, with no additional explanations.\n\n\
Text: {text}";

const TRANSLATE_TEMPLATE: &str = "Translate the following text from {language} to {target_language}. \
Respond with the translation only.\n\n{text}";

const PASSTHROUGH_TEMPLATE: &str = "{text}";

/// 已解析的 prompt 模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// 解析模板，未知占位符视为错误
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") || tail.starts_with("}}") {
                literal.push_str(&tail[..1]);
                rest = &tail[2..];
                offset += pos + 2;
                continue;
            }

            if tail.starts_with('}') {
                // 单独的 '}' 按字面处理
                literal.push('}');
                rest = &tail[1..];
                offset += pos + 1;
                continue;
            }

            let close = tail.find('}').ok_or(TemplateError::Unclosed(offset + pos))?;
            let name = &tail[1..close];
            let slot = Placeholder::parse(name)
                .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Slot(slot));

            rest = &tail[close + 1..];
            offset += pos + close + 1;
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// 任务的内置模板
    pub fn for_task(task: TaskKind) -> Self {
        let source = match task {
            TaskKind::Answer => ANSWER_TEMPLATE,
            TaskKind::Fluency => FLUENCY_TEMPLATE,
            TaskKind::Translate => TRANSLATE_TEMPLATE,
            TaskKind::Passthrough => PASSTHROUGH_TEMPLATE,
        };
        // 内置模板只使用已知占位符，解析不会失败
        Self::parse(source).unwrap_or_else(|_| Self {
            segments: vec![Segment::Slot(Placeholder::Text)],
        })
    }

    /// 渲染
    pub fn render(&self, item: &Item, target_language: Option<&str>) -> String {
        let mut out = String::with_capacity(item.text.len() + 256);
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Slot(Placeholder::Text) => out.push_str(&item.text),
                Segment::Slot(Placeholder::Id) => out.push_str(&item.id),
                Segment::Slot(Placeholder::Language) => {
                    let name = item
                        .language
                        .as_deref()
                        .map(language_name)
                        .unwrap_or("the language of the question");
                    out.push_str(name);
                }
                Segment::Slot(Placeholder::TargetLanguage) => {
                    let name = target_language
                        .map(language_name)
                        .unwrap_or("the target language");
                    out.push_str(name);
                }
                Segment::Slot(Placeholder::Topic) => {
                    out.push_str(item.topic.as_deref().unwrap_or("Other"));
                }
            }
        }
        out
    }
}

/// 语言标签 → 语言名称，未知标签原样返回
pub fn language_name(tag: &str) -> &str {
    match tag.to_ascii_lowercase().as_str() {
        "rw" | "kin" => "Kinyarwanda",
        "en" | "eng" => "English",
        "fr" | "fra" => "French",
        "sw" | "swa" => "Swahili",
        _ => tag,
    }
}

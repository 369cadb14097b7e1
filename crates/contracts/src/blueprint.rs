//! BatchBlueprint - Config Loader 输出
//!
//! 描述一次批量评测的完整配置：运行参数、输入、主题表、后端、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的批量评测配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 运行参数
    #[serde(default)]
    pub run: RunConfig,

    /// 输入文件
    pub input: InputConfig,

    /// 关键词 → 主题分类表 (按顺序匹配)
    #[serde(default)]
    pub topics: Vec<TopicRule>,

    /// 后端定义列表 (顺序 = 输出列顺序)
    pub backends: Vec<BackendConfig>,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

impl BatchBlueprint {
    /// 已启用的后端
    pub fn enabled_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter().filter(|b| b.enabled)
    }
}

/// 运行参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// 最大同时进行的调用数
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// 全局默认单次调用超时 (毫秒)
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// 工作队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 每多少个结果输出一次进度日志 (0 = 不输出)
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

impl RunConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            default_timeout_ms: default_timeout_ms(),
            queue_capacity: default_queue_capacity(),
            progress_every: default_progress_every(),
        }
    }
}

/// 调用主要在等待网络，并发数取 CPU 数的两倍
fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(4)
        .max(1)
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_queue_capacity() -> usize {
    256
}

fn default_progress_every() -> usize {
    10
}

/// 输入文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    Csv,
    Jsonl,
}

/// 输入配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// 输入文件路径
    pub path: PathBuf,

    /// 文件格式 (None = 按扩展名推断)
    #[serde(default)]
    pub format: Option<InputFormat>,

    /// CSV 分隔符
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// 显式 id 列 (None = 使用从 1 开始的行号)
    #[serde(default)]
    pub id_column: Option<String>,

    /// 主文本列
    #[serde(default = "default_text_column")]
    pub text_column: String,

    /// 源语言列
    #[serde(default)]
    pub language_column: Option<String>,

    /// 语言列缺失时的默认语言
    #[serde(default)]
    pub default_language: Option<String>,

    /// 主题列 (None = 使用关键词检测)
    #[serde(default)]
    pub topic_column: Option<String>,

    /// 原样保留的其他列
    #[serde(default)]
    pub metadata_columns: Vec<String>,
}

impl InputConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            delimiter: default_delimiter(),
            id_column: None,
            text_column: default_text_column(),
            language_column: None,
            default_language: None,
            topic_column: None,
            metadata_columns: Vec::new(),
        }
    }

    /// 实际格式：显式配置优先，其次扩展名，默认 CSV
    pub fn resolved_format(&self) -> InputFormat {
        self.format.unwrap_or_else(|| {
            match self
                .path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .as_deref()
            {
                Some("jsonl") | Some("ndjson") => InputFormat::Jsonl,
                _ => InputFormat::Csv,
            }
        })
    }
}

fn default_delimiter() -> char {
    ','
}

fn default_text_column() -> String {
    "text".to_string()
}

/// 主题关键词规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRule {
    pub keyword: String,
    pub category: String,
}

/// 提供方类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI Chat Completions
    #[serde(alias = "open_ai")]
    Openai,
    /// Anthropic Messages
    Anthropic,
    /// Groq (OpenAI 兼容)
    Groq,
    /// Google Translate v2
    GoogleTranslate,
    /// Digital Umuganda MT (RapidAPI)
    DigitalUmuganda,
    /// 多个后端顺序串联
    Chain,
    /// 本地回显后端
    Echo,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Groq => "groq",
            Self::GoogleTranslate => "google_translate",
            Self::DigitalUmuganda => "digital_umuganda",
            Self::Chain => "chain",
            Self::Echo => "echo",
        }
    }

    /// 默认的凭证环境变量
    pub fn default_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Openai => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::GoogleTranslate => Some("GOOGLE_TRANSLATE_API_KEY"),
            Self::DigitalUmuganda => Some("RAPIDAPI_KEY"),
            Self::Chain | Self::Echo => None,
        }
    }

    /// 是否为纯翻译服务 (不使用 prompt)
    pub fn is_translation_service(&self) -> bool {
        matches!(self, Self::GoogleTranslate | Self::DigitalUmuganda)
    }
}

/// 后端任务类型，决定默认 prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// 用 Item 的语言回答问题
    #[default]
    Answer,
    /// 给出 1-10 的流利度评分
    Fluency,
    /// 翻译到 target_language
    Translate,
    /// 原样发送文本
    Passthrough,
}

/// 后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// 唯一名称 (输出列组标识)
    pub name: String,

    /// 提供方
    pub provider: ProviderKind,

    /// 模型名称 (None = 提供方默认)
    #[serde(default)]
    pub model: Option<String>,

    /// 凭证环境变量 (None = 提供方默认)
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// 端点覆盖
    #[serde(default)]
    pub endpoint: Option<String>,

    /// 任务类型
    #[serde(default)]
    pub task: TaskKind,

    /// 自定义 prompt 模板 (覆盖任务默认模板)
    #[serde(default)]
    pub prompt: Option<String>,

    /// system 消息
    #[serde(default)]
    pub system: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// 源语言 (None = 使用 Item 的语言)
    #[serde(default)]
    pub source_language: Option<String>,

    /// 目标语言 (翻译任务必填)
    #[serde(default)]
    pub target_language: Option<String>,

    /// 单次调用超时覆盖 (毫秒)
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// 是否启用
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// 适配器内部重试策略
    #[serde(default)]
    pub retry: RetryConfig,

    /// 该后端同时进行的最大调用数 (None = 不限制)
    #[serde(default)]
    pub max_in_flight: Option<usize>,

    /// 链式后端的步骤
    #[serde(default)]
    pub steps: Vec<BackendConfig>,

    /// 提供方特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl BackendConfig {
    /// 最小配置，其余字段取默认值
    pub fn new(name: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            name: name.into(),
            provider,
            model: None,
            api_key_env: None,
            endpoint: None,
            task: TaskKind::default(),
            prompt: None,
            system: None,
            temperature: None,
            max_tokens: None,
            source_language: None,
            target_language: None,
            timeout_ms: None,
            enabled: default_enabled(),
            retry: RetryConfig::default(),
            max_in_flight: None,
            steps: Vec::new(),
            params: HashMap::new(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// 实际使用的凭证环境变量
    pub fn key_env(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.provider.default_key_env())
    }
}

fn default_enabled() -> bool {
    true
}

/// 重试策略配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 最大尝试次数 (含第一次)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_multiplier() -> f64 {
    2.0
}

/// Sink 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// 唯一名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// Sink 特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SinkConfig {
    pub fn new(name: impl Into<String>, sink_type: SinkType) -> Self {
        Self {
            name: name.into(),
            sink_type,
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 分隔符表格文件
    Csv,
    /// JSON 报告
    Json,
    /// 日志摘要
    Log,
}

//! Digital Umuganda 机器翻译 (RapidAPI)
//!
//! 只支持 Kinyarwanda ↔ English，其他语言对不发起请求直接拒绝。

use async_trait::async_trait;
use contracts::{Backend, BackendConfig, ContractError, Deadline, Failure, Item};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http;
use crate::retry::RetryPolicy;

const ENDPOINT: &str = "https://du_mt_api.p.rapidapi.com/api/v1/translate";
const RAPIDAPI_HOST: &str = "du_mt_api.p.rapidapi.com";

pub struct UmugandaBackend {
    name: String,
    client: Client,
    endpoint: String,
    host: String,
    api_key: String,
    source_language: Option<String>,
    target_language: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    src: &'a str,
    tgt: &'a str,
    use_multi: &'static str,
    text: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    translation: Option<String>,
}

/// 语言对对应的多语模型
fn model_for(source: &str, target: &str) -> Option<&'static str> {
    match (source, target) {
        ("rw", "en") => Some("MULTI-rw-en"),
        ("en", "rw") => Some("MULTI-en-rw"),
        _ => None,
    }
}

impl UmugandaBackend {
    pub fn new(config: &BackendConfig, api_key: String) -> Result<Self, ContractError> {
        let target_language = config.target_language.clone().ok_or_else(|| {
            ContractError::backend_construction(&config.name, "target_language is required")
        })?;
        Ok(Self {
            name: config.name.clone(),
            client: http::build_client(&config.name)?,
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| ENDPOINT.to_string()),
            host: config
                .params
                .get("host")
                .cloned()
                .unwrap_or_else(|| RAPIDAPI_HOST.to_string()),
            api_key,
            source_language: config.source_language.clone(),
            target_language,
            retry: RetryPolicy::from(&config.retry),
        })
    }

    async fn attempt(
        &self,
        item: &Item,
        source: &str,
        use_multi: &'static str,
        deadline: Deadline,
    ) -> Result<String, Failure> {
        let body = TranslateRequest {
            src: source,
            tgt: &self.target_language,
            use_multi,
            text: &item.text,
        };
        let request = self
            .client
            .post(&self.endpoint)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.host)
            .json(&body);

        let response: TranslateResponse = http::send_json(request, deadline).await?;
        response
            .translation
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Failure::malformed("response has no translation"))
    }
}

#[async_trait]
impl Backend for UmugandaBackend {
    fn provider(&self) -> &str {
        "digital_umuganda"
    }

    async fn query(&self, item: &Item, deadline: Deadline) -> Result<String, Failure> {
        let source = self
            .source_language
            .as_deref()
            .or(item.language.as_deref())
            .unwrap_or("rw");
        let use_multi = model_for(source, &self.target_language).ok_or_else(|| {
            Failure::rejected(format!(
                "unsupported language pair {source}->{}",
                self.target_language
            ))
        })?;

        self.retry
            .run(&self.name, deadline, move |_| {
                self.attempt(item, source, use_multi, deadline)
            })
            .await
    }
}

//! HTTP 公共部分：请求发送与失败分类
//!
//! | 情况 | FailureKind |
//! |------|-------------|
//! | 429 | RateLimited |
//! | 5xx / 连接 / IO 错误 | Transport |
//! | 请求超时 | Timeout |
//! | 401 / 403 / 其他 4xx | ProviderRejected |
//! | 空或无法解析的响应体 | MalformedResponse |

use std::time::Duration;

use contracts::{ContractError, Deadline, Failure, FailureKind};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 错误消息中保留的响应体最大长度
const MAX_DETAIL_CHARS: usize = 200;

/// 构造适配器持有的 HTTP 客户端
///
/// 超时由每个请求按剩余截止时间单独设置。
pub(crate) fn build_client(backend: &str) -> Result<Client, ContractError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ContractError::backend_construction(backend, format!("http client: {e}")))
}

/// 发送请求并把 2xx 响应体解码为 `R`
pub(crate) async fn send_json<R: DeserializeOwned>(
    request: RequestBuilder,
    deadline: Deadline,
) -> Result<R, Failure> {
    let remaining = deadline.remaining();
    if remaining.is_zero() {
        return Err(Failure::new(
            FailureKind::Timeout,
            "deadline expired before the request was sent",
        ));
    }

    let response = request
        .timeout(remaining)
        .send()
        .await
        .map_err(|e| classify_error(e, remaining))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| classify_error(e, remaining))?;

    if !status.is_success() {
        return Err(classify_status(status, &body));
    }
    decode_body(&body)
}

pub(crate) fn decode_body<R: DeserializeOwned>(body: &str) -> Result<R, Failure> {
    if body.trim().is_empty() {
        return Err(Failure::malformed("empty response body"));
    }
    serde_json::from_str(body)
        .map_err(|e| Failure::malformed(format!("undecodable response body: {e}")))
}

/// 按 HTTP 状态码分类失败
pub fn classify_status(status: StatusCode, body: &str) -> Failure {
    let detail = provider_message(body).unwrap_or_else(|| truncate(body.trim()));
    match status.as_u16() {
        429 => Failure::rate_limited(format!("{status}: {detail}")),
        401 | 403 => Failure::rejected(format!("authentication failed ({status}): {detail}")),
        400..=499 => Failure::rejected(format!("{status}: {detail}")),
        _ => Failure::transport(format!("{status}: {detail}")),
    }
}

fn classify_error(err: reqwest::Error, budget: Duration) -> Failure {
    if err.is_timeout() {
        Failure::timeout(budget)
    } else if err.is_decode() {
        Failure::malformed(format!("undecodable response body: {err}"))
    } else {
        Failure::transport(err.to_string())
    }
}

/// 从错误响应体中取出提供方的错误消息
///
/// 识别 `{"error": {"message": ..}}`、`{"error": ".."}`、`{"message": ..}` 与 `{"detail": ..}`。
pub(crate) fn provider_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = match value.get("error") {
        Some(Value::Object(error)) => error.get("message").and_then(Value::as_str),
        Some(Value::String(message)) => Some(message.as_str()),
        _ => None,
    }
    .or_else(|| value.get("message").and_then(Value::as_str))
    .or_else(|| value.get("detail").and_then(Value::as_str))?;
    Some(message.to_string())
}

fn truncate(text: &str) -> String {
    if text.is_empty() {
        return "<empty body>".to_string();
    }
    match text.char_indices().nth(MAX_DETAIL_CHARS) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

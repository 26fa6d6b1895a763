use std::{fmt, str::FromStr};

use serde::Serialize;
use serde_json::Value;

use crate::config::Settings;
use crate::error::{AdapterError, ServiceError};

pub mod openai;
pub mod baidu;
pub mod alibaba;
pub mod tencent;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ProviderId {
    OpenAi = 0,
    Baidu = 1,
    Alibaba = 2,
    Tencent = 3,
}

impl ProviderId {
    /// All supported providers, in listing order.
    pub const ALL: [ProviderId; 4] = [ProviderId::OpenAi, ProviderId::Baidu, ProviderId::Alibaba, ProviderId::Tencent];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Baidu => "baidu",
            ProviderId::Alibaba => "alibaba",
            ProviderId::Tencent => "tencent",
        }
    }

    pub(crate) fn from_index(index: u8) -> Self {
        Self::ALL.get(index as usize).copied().unwrap_or(ProviderId::OpenAi)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ServiceError::UnsupportedProvider(s.to_string()))
    }
}

/// One backend's request and response format.
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Sends one generation request and returns the generated text verbatim.
    fn send(&self, prompt: &str, settings: &Settings) -> Result<String, AdapterError>;
}

pub fn adapter_for(id: ProviderId) -> &'static dyn ProviderAdapter {
    match id {
        ProviderId::OpenAi => &openai::OpenAIDriver,
        ProviderId::Baidu => &baidu::BaiduDriver,
        ProviderId::Alibaba => &alibaba::AlibabaDriver,
        ProviderId::Tencent => &tencent::TencentDriver,
    }
}

pub(crate) fn api_key(settings: &Settings, provider: ProviderId) -> Result<&str, AdapterError> {
    settings
        .service(provider)
        .api_key
        .as_deref()
        .ok_or(AdapterError::MissingCredential { provider })
}

/// Posts `body` with bearer auth and reads the text at `text_pointer` (a JSON pointer).
pub(crate) fn post_json(
    provider: ProviderId,
    endpoint: &str,
    api_key: &str,
    body: Value,
    text_pointer: &'static str,
) -> Result<String, AdapterError> {
    tracing::debug!(%provider, endpoint, "sending evaluation request");

    let res = ureq::post(endpoint)
        .set("Authorization", &format!("Bearer {}", api_key))
        .set("Content-Type", "application/json")
        .send_json(body);

    match res {
        Ok(response) => {
            let json: Value = response
                .into_json()
                .map_err(|_| AdapterError::MalformedResponse { provider, path: text_pointer })?;

            json.pointer(text_pointer)
                .and_then(Value::as_str)
                .map(|s| s.to_string())
                .ok_or(AdapterError::MalformedResponse { provider, path: text_pointer })
        },
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            Err(AdapterError::Status { status, body })
        },
        Err(e) => Err(AdapterError::Transport { message: e.to_string() }),
    }
}

use serde_json::json;

use crate::config::Settings;
use crate::error::AdapterError;
use super::{ProviderAdapter, ProviderId, api_key, post_json};

/// ERNIE Bot (wenxinworkshop) chat endpoint. The model is implied by the endpoint.
pub struct BaiduDriver;

impl ProviderAdapter for BaiduDriver {
    fn id(&self) -> ProviderId {
        ProviderId::Baidu
    }

    fn send(&self, prompt: &str, settings: &Settings) -> Result<String, AdapterError> {
        let api_key = api_key(settings, ProviderId::Baidu)?;

        let body = json!({
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": settings.temperature,
            "max_output_tokens": settings.max_tokens
        });

        post_json(ProviderId::Baidu, &settings.baidu.url, api_key, body, "/result")
    }
}

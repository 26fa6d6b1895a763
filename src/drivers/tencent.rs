use serde_json::json;

use crate::config::Settings;
use crate::error::AdapterError;
use super::{ProviderAdapter, ProviderId, api_key, post_json};

/// Hunyuan chat completions.
pub struct TencentDriver;

impl ProviderAdapter for TencentDriver {
    fn id(&self) -> ProviderId {
        ProviderId::Tencent
    }

    fn send(&self, prompt: &str, settings: &Settings) -> Result<String, AdapterError> {
        let api_key = api_key(settings, ProviderId::Tencent)?;
        let service = &settings.tencent;

        let body = json!({
            "model": service.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": settings.temperature,
            "max_tokens": settings.max_tokens
        });

        post_json(ProviderId::Tencent, &service.url, api_key, body, "/choices/0/message/content")
    }
}

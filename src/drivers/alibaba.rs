use serde_json::json;

use crate::config::Settings;
use crate::error::AdapterError;
use super::{ProviderAdapter, ProviderId, api_key, post_json};

/// DashScope text generation (Qwen).
pub struct AlibabaDriver;

impl ProviderAdapter for AlibabaDriver {
    fn id(&self) -> ProviderId {
        ProviderId::Alibaba
    }

    fn send(&self, prompt: &str, settings: &Settings) -> Result<String, AdapterError> {
        let api_key = api_key(settings, ProviderId::Alibaba)?;
        let service = &settings.alibaba;

        let body = json!({
            "model": service.model,
            "input": {
                "messages": [
                    { "role": "user", "content": prompt }
                ]
            },
            "parameters": {
                "temperature": settings.temperature,
                "max_tokens": settings.max_tokens
            }
        });

        post_json(ProviderId::Alibaba, &service.url, api_key, body, "/output/text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::tests::stub_settings;
    use mockito::Matcher;

    #[test]
    fn nests_messages_and_parameters() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/alibaba")
            .match_header("authorization", "Bearer sk-alibaba")
            .match_body(Matcher::PartialJson(json!({
                "model": "qwen-test",
                "input": { "messages": [{ "role": "user", "content": "prompt" }] },
                "parameters": { "temperature": 0.5, "max_tokens": 321 }
            })))
            .with_status(200)
            .with_body(r#"{"output":{"text":"通义评价","finish_reason":"stop"},"request_id":"r1"}"#)
            .create();

        let text = AlibabaDriver.send("prompt", &stub_settings(&server.url())).unwrap();
        assert_eq!(text, "通义评价");
        mock.assert();
    }

    #[test]
    fn chat_style_output_is_malformed() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("POST", "/alibaba")
            .with_status(200)
            .with_body(r#"{"output":{"choices":[{"message":{"content":"x"}}]}}"#)
            .create();

        let err = AlibabaDriver.send("prompt", &stub_settings(&server.url())).unwrap_err();
        assert!(matches!(err, AdapterError::MalformedResponse { path: "/output/text", .. }));
    }
}

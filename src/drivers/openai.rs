use serde_json::json;

use crate::config::Settings;
use crate::error::AdapterError;
use super::{ProviderAdapter, ProviderId, api_key, post_json};

/// OpenAI-compatible chat completions, with a configurable base URL.
pub struct OpenAIDriver;

impl ProviderAdapter for OpenAIDriver {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn send(&self, prompt: &str, settings: &Settings) -> Result<String, AdapterError> {
        let api_key = api_key(settings, ProviderId::OpenAi)?;
        let service = &settings.openai;

        let body = json!({
            "model": service.model,
            "messages": [
                { "role": "system", "content": settings.system_prompt },
                { "role": "user", "content": prompt }
            ],
            "max_tokens": settings.max_tokens,
            "temperature": settings.temperature
        });

        // Ensure URL doesn't end with slash before appending
        let base_url = service.url.trim_end_matches('/');
        let endpoint = format!("{}/chat/completions", base_url);

        post_json(ProviderId::OpenAi, &endpoint, api_key, body, "/choices/0/message/content")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::tests::stub_settings;
    use mockito::Matcher;

    #[test]
    fn sends_chat_completion_with_system_prompt() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-openai")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-test",
                "messages": [
                    { "role": "system", "content": "你是评价专家" },
                    { "role": "user", "content": "课堂|良好" }
                ],
                "max_tokens": 321,
                "temperature": 0.5
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"评价正文"}}]}"#)
            .create();

        let settings = stub_settings(&server.url());
        let text = OpenAIDriver.send("课堂|良好", &settings).unwrap();
        assert_eq!(text, "评价正文");
        mock.assert();
    }

    #[test]
    fn missing_choices_is_malformed() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create();

        let err = OpenAIDriver.send("p", &stub_settings(&server.url())).unwrap_err();
        assert!(matches!(err, AdapterError::MalformedResponse { path: "/choices/0/message/content", .. }));
    }

    #[test]
    fn error_status_carries_code_and_body() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":"bad key"}"#)
            .create();

        let err = OpenAIDriver.send("p", &stub_settings(&server.url())).unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("bad key"));
    }
}

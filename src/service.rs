use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::config::Settings;
use crate::drivers::{ProviderId, adapter_for};
use crate::error::{InputField, ServiceError};
use crate::prompt::PromptBuilder;

/// Generates evaluations through whichever provider is currently selected.
///
/// The active provider can be switched through a shared reference. Each call to
/// [`EvaluationService::generate`] reads it exactly once, so a switch racing with
/// an in-flight generation affects only calls that start after it.
pub struct EvaluationService {
    settings: Arc<Settings>,
    active: AtomicU8,
}

impl EvaluationService {
    pub fn new(settings: Arc<Settings>) -> Self {
        let active = AtomicU8::new(settings.provider as u8);
        Self { settings, active }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Builds the prompt for `content` and `rating` and sends it to the active provider.
    pub fn generate(&self, content: &str, rating: &str) -> Result<String, ServiceError> {
        if content.trim().is_empty() {
            return Err(ServiceError::InvalidInput(InputField::Content));
        }
        if rating.is_empty() {
            return Err(ServiceError::InvalidInput(InputField::Rating));
        }

        let adapter = adapter_for(self.active_provider());
        let prompt = PromptBuilder::from_settings(&self.settings).build(content, rating);

        adapter
            .send(&prompt, &self.settings)
            .map_err(|source| {
                let provider = adapter.id();
                tracing::error!(%provider, error = %source, "AI service call failed");
                ServiceError::ProviderFailure { provider, source }
            })
    }

    /// Switches the active provider. Unknown names leave the current one in place.
    pub fn set_provider(&self, name: &str) -> Result<ProviderId, ServiceError> {
        let provider: ProviderId = name.parse()?;
        self.active.store(provider as u8, Ordering::Release);
        tracing::info!(%provider, "AI provider switched");
        Ok(provider)
    }

    pub fn active_provider(&self) -> ProviderId {
        ProviderId::from_index(self.active.load(Ordering::Acquire))
    }

    pub fn supported_providers(&self) -> &'static [ProviderId] {
        &ProviderId::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::tests::stub_settings;
    use crate::error::AdapterError;
    use mockito::Matcher;
    use serde_json::json;

    fn service(url: &str) -> EvaluationService {
        EvaluationService::new(Arc::new(stub_settings(url)))
    }

    #[test]
    fn starts_with_configured_provider() {
        let mut settings = stub_settings("http://localhost");
        settings.provider = ProviderId::Alibaba;
        let svc = EvaluationService::new(Arc::new(settings));
        assert_eq!(svc.active_provider(), ProviderId::Alibaba);
    }

    #[test]
    fn set_provider_accepts_only_supported_names() {
        let svc = service("http://localhost");
        assert_eq!(svc.active_provider(), ProviderId::OpenAi);

        let err = svc.set_provider("claude").unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedProvider(ref name) if name == "claude"));
        assert_eq!(svc.active_provider(), ProviderId::OpenAi);

        assert_eq!(svc.set_provider("tencent").unwrap(), ProviderId::Tencent);
        assert_eq!(svc.active_provider(), ProviderId::Tencent);
    }

    #[test]
    fn lists_supported_providers_in_order() {
        let svc = service("http://localhost");
        let names: Vec<_> = svc.supported_providers().iter().map(|p| p.to_string()).collect();
        assert_eq!(names, ["openai", "baidu", "alibaba", "tencent"]);
    }

    #[test]
    fn empty_content_is_rejected_without_network_call() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", Matcher::Any).expect(0).create();

        let svc = service(&server.url());
        assert!(matches!(svc.generate("", "良好"), Err(ServiceError::InvalidInput(_))));
        assert!(matches!(svc.generate("   \n", "良好"), Err(ServiceError::InvalidInput(_))));
        assert!(matches!(svc.generate("内容", ""), Err(ServiceError::InvalidInput(InputField::Rating))));
        mock.assert();
    }

    #[test]
    fn blank_rating_is_passed_through_without_guidance() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Regex(r#""content":"内容\| ""#.to_string()))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"ok"}}]}"#)
            .expect(1)
            .create();

        let svc = service(&server.url());
        assert_eq!(svc.generate("内容", " ").unwrap(), "ok");
        mock.assert();
    }

    #[test]
    fn returns_generated_text_verbatim() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/v1/chat/completions")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({
                    "messages": [{ "role": "system" }, { "role": "user" }]
                })),
                Matcher::Regex(r"some content\|优秀\\n\\n特别说明".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"X"}}]}"#)
            .create();

        let svc = service(&server.url());
        assert_eq!(svc.generate("some content", "优秀").unwrap(), "X");
        mock.assert();
    }

    #[test]
    fn provider_failure_is_wrapped_and_not_retried() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("internal error")
            .expect(1)
            .create();

        let svc = service(&server.url());
        let err = svc.generate("some content", "良好").unwrap_err();
        match &err {
            ServiceError::ProviderFailure { provider, source } => {
                assert_eq!(*provider, ProviderId::OpenAi);
                assert!(matches!(source, AdapterError::Status { status: 500, .. }));
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_user_error());
        mock.assert();
    }

    #[test]
    fn switching_provider_changes_request_shape() {
        let mut server = mockito::Server::new();
        let openai = server.mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-openai")
            .match_body(Matcher::PartialJson(json!({ "model": "gpt-test", "max_tokens": 321 })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"first"}}]}"#)
            .expect(1)
            .create();
        let alibaba = server.mock("POST", "/alibaba")
            .match_header("authorization", "Bearer sk-alibaba")
            .match_body(Matcher::PartialJson(json!({
                "model": "qwen-test",
                "input": { "messages": [{ "role": "user" }] },
                "parameters": { "max_tokens": 321 }
            })))
            .with_status(200)
            .with_body(r#"{"output":{"text":"second"}}"#)
            .expect(1)
            .create();

        let svc = service(&server.url());
        assert_eq!(svc.generate("课堂", "良好").unwrap(), "first");
        svc.set_provider("alibaba").unwrap();
        assert_eq!(svc.generate("课堂", "良好").unwrap(), "second");

        openai.assert();
        alibaba.assert();
    }

    #[test]
    fn concurrent_generations_share_the_service() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/baidu")
            .with_status(200)
            .with_body(r#"{"result":"ok"}"#)
            .expect(4)
            .create();

        let svc = Arc::new(service(&server.url()));
        svc.set_provider("baidu").unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let svc = Arc::clone(&svc);
                std::thread::spawn(move || svc.generate("内容", "一般"))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), "ok");
        }
        mock.assert();
    }
}

use thiserror::Error;

use crate::drivers::ProviderId;

/// Failure of a single provider call.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{provider} API key is not configured")]
    MissingCredential { provider: ProviderId },

    #[error("Request failed: {message}")]
    Transport { message: String },

    #[error("API error: Status: {status}, Body: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response format from {provider} (missing `{path}`)")]
    MalformedResponse { provider: ProviderId, path: &'static str },
}

impl AdapterError {
    /// HTTP status of the failed call, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            AdapterError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Request field rejected by [`ServiceError::InvalidInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    Content,
    Rating,
}

impl std::fmt::Display for InputField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputField::Content => f.write_str("content"),
            InputField::Rating => f.write_str("rating"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid input: {0} must not be empty")]
    InvalidInput(InputField),

    #[error("Unsupported AI provider: {0}")]
    UnsupportedProvider(String),

    #[error("{provider} provider failed: {source}")]
    ProviderFailure {
        provider: ProviderId,
        #[source]
        source: AdapterError,
    },
}

impl ServiceError {
    /// True for errors the caller can fix by changing its request.
    pub fn is_user_error(&self) -> bool {
        matches!(self, ServiceError::InvalidInput(_) | ServiceError::UnsupportedProvider(_))
    }

    pub fn adapter_error(&self) -> Option<&AdapterError> {
        match self {
            ServiceError::ProviderFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_are_distinguishable_from_backend_failures() {
        assert!(ServiceError::InvalidInput(InputField::Content).is_user_error());
        assert!(ServiceError::UnsupportedProvider("claude".into()).is_user_error());

        let failure = ServiceError::ProviderFailure {
            provider: ProviderId::Baidu,
            source: AdapterError::Status { status: 502, body: String::new() },
        };
        assert!(!failure.is_user_error());
        assert_eq!(failure.adapter_error().and_then(AdapterError::status), Some(502));
    }

    #[test]
    fn transport_errors_have_no_status() {
        let err = AdapterError::Transport { message: "connection refused".into() };
        assert_eq!(err.status(), None);
    }
}

//! Provider error classification shared by the HTTP backends.

use intake_core::Error;

/// Coarse error classes returned by hosted model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    /// Invalid or missing API key, or the key lacks permission.
    AuthenticationError,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Provider is overloaded or returned a 5xx.
    ServerError,
    /// Model not found or not available for this key.
    ModelNotFound,
    /// Prompt plus completion exceeds the model window.
    ContextLengthExceeded,
    /// Request rejected for any other reason.
    InvalidRequest,
}

impl ProviderErrorCode {
    /// Classify from HTTP status and the provider's `error.type` string.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401 | 403, _) | (_, "authentication_error" | "permission_error") => {
                Self::AuthenticationError
            }
            (429, _) | (_, "rate_limit_error") => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found" | "not_found_error") => Self::ModelNotFound,
            (_, "overloaded_error" | "api_error") => Self::ServerError,
            (500..=599, _) => Self::ServerError,
            (400, t) if t.contains("context_length") => Self::ContextLengthExceeded,
            _ => Self::InvalidRequest,
        }
    }

    /// Whether a later attempt could succeed without changing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }

    /// Map to the crate-wide error.
    ///
    /// Anything that says "the model cannot be reached right now" becomes
    /// `ModelUnavailable`; problems with the request itself stay `Inference`.
    pub fn into_error(self, provider: &str, message: &str) -> Error {
        match self {
            Self::AuthenticationError => {
                Error::ModelUnavailable(format!("{} authentication failed: {}", provider, message))
            }
            Self::RateLimitExceeded => {
                Error::ModelUnavailable(format!("{} rate limit exceeded: {}", provider, message))
            }
            Self::ServerError => {
                Error::ModelUnavailable(format!("{} server error: {}", provider, message))
            }
            Self::ModelNotFound => {
                Error::ModelUnavailable(format!("{} model not found: {}", provider, message))
            }
            Self::ContextLengthExceeded => {
                Error::Inference(format!("{} context too long: {}", provider, message))
            }
            Self::InvalidRequest => {
                Error::Inference(format!("{} rejected request: {}", provider, message))
            }
        }
    }
}

/// Map a reqwest transport failure (connect, timeout, TLS) to `ModelUnavailable`.
pub fn transport_error(provider: &str, err: reqwest::Error) -> Error {
    Error::ModelUnavailable(format!("{} request failed: {}", provider, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_statuses() {
        assert_eq!(
            ProviderErrorCode::from_response(401, "invalid_api_key"),
            ProviderErrorCode::AuthenticationError
        );
        assert_eq!(
            ProviderErrorCode::from_response(403, "permission_error"),
            ProviderErrorCode::AuthenticationError
        );
    }

    #[test]
    fn test_rate_limit_and_overload() {
        assert_eq!(
            ProviderErrorCode::from_response(429, "rate_limit_error"),
            ProviderErrorCode::RateLimitExceeded
        );
        assert_eq!(
            ProviderErrorCode::from_response(529, "overloaded_error"),
            ProviderErrorCode::ServerError
        );
        assert_eq!(
            ProviderErrorCode::from_response(502, "bad_gateway"),
            ProviderErrorCode::ServerError
        );
    }

    #[test]
    fn test_context_length() {
        assert_eq!(
            ProviderErrorCode::from_response(400, "context_length_exceeded"),
            ProviderErrorCode::ContextLengthExceeded
        );
    }

    #[test]
    fn test_unknown_is_invalid_request() {
        assert_eq!(
            ProviderErrorCode::from_response(418, "im_a_teapot"),
            ProviderErrorCode::InvalidRequest
        );
    }

    #[test]
    fn test_retryable() {
        assert!(ProviderErrorCode::RateLimitExceeded.is_retryable());
        assert!(ProviderErrorCode::ServerError.is_retryable());
        assert!(!ProviderErrorCode::AuthenticationError.is_retryable());
    }

    #[test]
    fn test_auth_maps_to_unavailable() {
        let err = ProviderErrorCode::AuthenticationError.into_error("anthropic", "bad key");
        assert!(matches!(err, Error::ModelUnavailable(_)));
        assert!(err.to_string().contains("authentication failed"));
    }

    #[test]
    fn test_invalid_request_stays_inference() {
        let err = ProviderErrorCode::InvalidRequest.into_error("openai", "bad field");
        assert!(matches!(err, Error::Inference(_)));
    }
}

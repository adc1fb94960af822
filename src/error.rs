use serde_json::Value as JsonValue;

/// Error type returned by this crate.
///
/// Every failing call surfaces as this one record, whatever went wrong
/// underneath; `cause` keeps the underlying error.
#[derive(Debug, thiserror::Error)]
#[error("{message} ({endpoint})")]
pub struct ApiError {
    /// Human-readable description. Taken from the response body's
    /// `message`/`error` field when the server provides one.
    pub message: String,
    /// HTTP status code, when a response was received.
    pub status: Option<u16>,
    /// Response payload, when a response was received and non-empty.
    pub body: Option<JsonValue>,
    /// Endpoint URL the failing request targeted.
    pub endpoint: String,
    /// Underlying failure.
    #[source]
    pub cause: ErrorCause,
}

/// Underlying failure carried by [`ApiError::cause`].
#[derive(Debug, thiserror::Error)]
pub enum ErrorCause {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code.
    #[error("http error {status}")]
    Http { status: u16 },
    /// Response JSON did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// Request body could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
    /// Session identity required by the call is missing or invalid.
    #[error("session error: {0}")]
    Session(String),
}

impl ApiError {
    pub(crate) fn transport(endpoint: impl Into<String>, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_owned()
        } else {
            format!("network error: {err}")
        };
        Self {
            message,
            status: err.status().map(|status| status.as_u16()),
            body: None,
            endpoint: endpoint.into(),
            cause: ErrorCause::Transport(err),
        }
    }

    pub(crate) fn http(endpoint: impl Into<String>, status: u16, body: Option<JsonValue>) -> Self {
        let message = body
            .as_ref()
            .and_then(server_message)
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Self {
            message,
            status: Some(status),
            body,
            endpoint: endpoint.into(),
            cause: ErrorCause::Http { status },
        }
    }

    pub(crate) fn decode(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            message: format!("unexpected response shape: {detail}"),
            status: None,
            body: None,
            endpoint: endpoint.into(),
            cause: ErrorCause::Decode(detail),
        }
    }

    pub(crate) fn encode(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            message: format!("could not encode request body: {detail}"),
            status: None,
            body: None,
            endpoint: endpoint.into(),
            cause: ErrorCause::Encode(detail),
        }
    }

    pub(crate) fn session(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            message: detail.clone(),
            status: None,
            body: None,
            endpoint: endpoint.into(),
            cause: ErrorCause::Session(detail),
        }
    }

    /// HTTP status of the failing response, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Whether the attempt was aborted by the per-attempt timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(&self.cause, ErrorCause::Transport(err) if err.is_timeout())
    }

    /// Whether the failure is transient: timeout, connect failure, 5xx or 429.
    pub fn is_retryable(&self) -> bool {
        match &self.cause {
            ErrorCause::Transport(err) => err.is_timeout() || is_connect(err),
            ErrorCause::Http { status } => *status >= 500 || *status == 429,
            ErrorCause::Decode(_) | ErrorCause::Encode(_) | ErrorCause::Session(_) => false,
        }
    }

    /// Whether the server rejected the request with a 4xx other than 429.
    pub fn is_client_error(&self) -> bool {
        matches!(self.cause, ErrorCause::Http { status } if (400..500).contains(&status) && status != 429)
    }
}

// is_connect() is not available on wasm32 targets (no TCP). A rejected
// fetch() surfaces there as a request error, which covers the same
// "no response at all" case.
fn is_connect(err: &reqwest::Error) -> bool {
    #[cfg(not(target_arch = "wasm32"))]
    {
        err.is_connect()
    }
    #[cfg(target_arch = "wasm32")]
    {
        err.is_request() && !err.is_builder()
    }
}

fn server_message(body: &JsonValue) -> Option<String> {
    ["message", "error"].iter().find_map(|key| {
        body.get(key)
            .and_then(JsonValue::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(str::to_owned)
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ApiError, ErrorCause};

    #[test]
    fn http_error_prefers_server_message() {
        let err = ApiError::http(
            "http://api/leads",
            422,
            Some(json!({"message": "email already exists"})),
        );
        assert_eq!(err.message, "email already exists");
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.to_string(), "email already exists (http://api/leads)");
    }

    #[test]
    fn http_error_falls_back_to_generated_message() {
        let err = ApiError::http("http://api/leads", 500, Some(json!("oops")));
        assert_eq!(err.message, "request failed with status 500");
        assert!(matches!(err.cause, ErrorCause::Http { status: 500 }));
    }

    #[test]
    fn status_classification() {
        let retryable = [500, 502, 503, 504, 429];
        for status in retryable {
            let err = ApiError::http("e", status, None);
            assert!(err.is_retryable(), "{status} must be retryable");
            assert!(!err.is_client_error());
        }

        let fatal = [400, 401, 403, 404, 409, 422];
        for status in fatal {
            let err = ApiError::http("e", status, None);
            assert!(!err.is_retryable(), "{status} must not be retryable");
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn local_failures_are_not_retryable() {
        assert!(!ApiError::decode("e", "bad").is_retryable());
        assert!(!ApiError::encode("e", "bad").is_retryable());
        assert!(!ApiError::session("e", "no user").is_retryable());
    }

    #[test]
    fn request_build_failure_is_not_retryable() {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        assert!(err.is_builder());
        let err = ApiError::transport("not a url", err);
        assert!(!err.is_retryable());
        assert!(!err.is_timeout());
    }
}

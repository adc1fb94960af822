use std::fmt;
use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    clock,
    options::base_url_from_env,
    request::RetryContext,
    session::{bearer_authorization, keys},
    ApiError, ClientOptions, ConnectionMonitor, MemorySessionStore, Method, RequestOptions,
    Result, SessionStore, SessionUser, Subscription,
};

/// Query parameter carrying the cache-busting timestamp on GET requests.
pub const CACHE_BUST_PARAM: &str = "_t";

#[derive(Clone)]
/// HTTP client for the LeadDesk CRM REST API.
///
/// Every call goes through [`CrmClient::request`], which injects the session
/// bearer token, bounds each attempt by the configured timeout, retries
/// transient failures with exponential backoff and keeps the shared
/// [`ConnectionMonitor`] up to date.
pub struct CrmClient {
    http: reqwest::Client,
    base_url: String,
    options: ClientOptions,
    session: Arc<dyn SessionStore>,
    connection: Arc<ConnectionMonitor>,
}

impl fmt::Debug for CrmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrmClient")
            .field("base_url", &self.base_url)
            .field("session", &"<redacted>")
            .field("options", &self.options)
            .field("connected", &self.connection.is_connected())
            .finish()
    }
}

impl CrmClient {
    /// Creates a client for `base_url` with default options, an empty
    /// in-memory session and the process-wide connection monitor.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            options: ClientOptions::default(),
            session: Arc::new(MemorySessionStore::new()),
            connection: ConnectionMonitor::global(),
        }
    }

    /// Creates a client whose base URL comes from `LEADDESK_API_URL`,
    /// falling back to [`DEFAULT_BASE_URL`](crate::DEFAULT_BASE_URL).
    pub fn from_env() -> Self {
        Self::new(base_url_from_env())
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    /// Reads the bearer token and user identity from `store`.
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session = store;
        self
    }

    /// Tracks connectivity on `monitor` instead of the process-wide one.
    pub fn with_connection_monitor(mut self, monitor: Arc<ConnectionMonitor>) -> Self {
        self.connection = monitor;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn session(&self) -> &dyn SessionStore {
        self.session.as_ref()
    }

    /// Signed-in user recorded in the session, if any.
    pub fn current_user(&self) -> Option<SessionUser> {
        SessionUser::from_store(self.session.as_ref())
    }

    pub fn connection_monitor(&self) -> &Arc<ConnectionMonitor> {
        &self.connection
    }

    /// Current value of the connection flag.
    pub fn connection_status(&self) -> bool {
        self.connection.is_connected()
    }

    /// Registers `listener` for connection flag transitions.
    pub fn on_connection_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.connection.subscribe(listener)
    }

    pub async fn get(&self, path: &str) -> Result<JsonValue> {
        self.request(Method::Get, path, None, &RequestOptions::default())
            .await
    }

    pub async fn get_with(&self, path: &str, options: &RequestOptions) -> Result<JsonValue> {
        self.request(Method::Get, path, None, options).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<JsonValue> {
        let body = self.encode_body(path, body)?;
        self.request(Method::Post, path, Some(body), &RequestOptions::default())
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<JsonValue> {
        let body = self.encode_body(path, body)?;
        self.request(Method::Put, path, Some(body), &RequestOptions::default())
            .await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<JsonValue> {
        let body = self.encode_body(path, body)?;
        self.request(Method::Patch, path, Some(body), &RequestOptions::default())
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<JsonValue> {
        self.request(Method::Delete, path, None, &RequestOptions::default())
            .await
    }

    /// Performs one logical request against `base_url + path`.
    ///
    /// Timeouts, connect failures, 5xx and 429 are retried up to
    /// `max_retries` times with exponential backoff; when the budget runs out
    /// the connection flag drops to `false`. Any other failure is returned
    /// immediately and leaves the flag untouched. A 2xx response sets the flag
    /// back to `true` and yields the parsed JSON body (`Null` when empty).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
        options: &RequestOptions,
    ) -> Result<JsonValue> {
        let endpoint = self.endpoint(path);
        let mut ctx = RetryContext::start();
        loop {
            match self
                .send_once(method, &endpoint, body.as_ref(), options)
                .await
            {
                Ok(payload) => {
                    self.connection.set_connected(true);

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        %method,
                        %endpoint,
                        duration_ms = ctx.elapsed_ms(),
                        retries = ctx.retries,
                        "request completed"
                    );

                    return Ok(payload);
                }
                Err(err) if err.is_retryable() => {
                    if ctx.retries < self.options.max_retries {
                        ctx.retries += 1;
                        let delay = self.options.backoff_delay(ctx.retries);

                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            %method,
                            %endpoint,
                            error = %err,
                            attempt = ctx.attempt(),
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "retrying request after transient failure"
                        );

                        clock::sleep(delay).await;
                        continue;
                    }

                    self.connection.set_connected(false);

                    #[cfg(feature = "tracing")]
                    tracing::error!(
                        %method,
                        %endpoint,
                        error = %err,
                        duration_ms = ctx.elapsed_ms(),
                        retries = ctx.retries,
                        "request failed, retries exhausted"
                    );

                    return Err(err);
                }
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        %method,
                        %endpoint,
                        status = err.status(),
                        error = %err,
                        duration_ms = ctx.elapsed_ms(),
                        "request rejected"
                    );

                    return Err(err);
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&JsonValue>,
        options: &RequestOptions,
    ) -> Result<JsonValue> {
        let headers = self.build_headers(endpoint, options)?;
        let mut builder = self
            .http
            .request(method.into(), endpoint)
            .headers(headers)
            .timeout(self.options.timeout());

        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if method == Method::Get {
            builder = builder.query(&[(CACHE_BUST_PARAM, clock::now_millis().to_string())]);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ApiError::transport(endpoint, err))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ApiError::transport(endpoint, err))?;
        let payload = parse_body(&text);

        if status.is_success() {
            Ok(payload.unwrap_or(JsonValue::Null))
        } else {
            Err(ApiError::http(endpoint, status.as_u16(), payload))
        }
    }

    fn build_headers(&self, endpoint: &str, options: &RequestOptions) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = self
            .session
            .get(keys::TOKEN)
            .filter(|token| !token.trim().is_empty())
        {
            let value = HeaderValue::from_str(&bearer_authorization(&token))
                .map_err(|err| ApiError::encode(endpoint, format!("invalid session token: {err}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| ApiError::encode(endpoint, format!("invalid header name '{name}': {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| ApiError::encode(endpoint, format!("invalid value for header '{name}': {err}")))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    fn encode_body<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<JsonValue> {
        serde_json::to_value(body).map_err(|err| ApiError::encode(self.endpoint(path), err.to_string()))
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Deserializes a response body into `T`, reporting mismatches as
    /// decode errors against `endpoint`.
    pub fn decode<T: DeserializeOwned>(endpoint: &str, payload: JsonValue) -> Result<T> {
        serde_json::from_value(payload).map_err(|err| ApiError::decode(endpoint, err.to_string()))
    }
}

fn parse_body(text: &str) -> Option<JsonValue> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| JsonValue::String(text.to_owned())))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::{parse_body, CrmClient};
    use crate::{
        ConnectionMonitor, ErrorCause, MemorySessionStore, RequestOptions, SessionStore,
    };

    fn client_with_token(token: &str) -> CrmClient {
        CrmClient::new("https://crm.example.com/api/")
            .with_session_store(Arc::new(MemorySessionStore::with_token(token)))
            .with_connection_monitor(Arc::new(ConnectionMonitor::new()))
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = client_with_token("t");
        assert_eq!(client.base_url(), "https://crm.example.com/api");
        assert_eq!(client.endpoint("/leads"), "https://crm.example.com/api/leads");
        assert_eq!(client.endpoint("leads/7"), "https://crm.example.com/api/leads/7");
    }

    #[test]
    fn headers_carry_bearer_token() {
        let client = client_with_token("abc");
        let headers = client
            .build_headers("e", &RequestOptions::default())
            .expect("headers must build");
        assert_eq!(headers["authorization"], "Bearer abc");
        assert_eq!(headers["accept"], "application/json");
    }

    #[test]
    fn headers_omit_authorization_without_token() {
        let client = client_with_token("abc");
        client.session().remove(crate::session::keys::TOKEN);
        let headers = client
            .build_headers("e", &RequestOptions::default())
            .expect("headers must build");
        assert!(headers.get("authorization").is_none());
    }

    #[test]
    fn header_override_replaces_authorization() {
        let client = client_with_token("abc");
        let opts = RequestOptions::new().header("Authorization", "Basic Zm9vOmJhcg==");
        let headers = client.build_headers("e", &opts).expect("headers must build");
        let values: Vec<_> = headers.get_all("authorization").iter().collect();
        assert_eq!(values, vec!["Basic Zm9vOmJhcg=="]);
    }

    #[test]
    fn invalid_header_name_is_encode_error() {
        let client = client_with_token("abc");
        let opts = RequestOptions::new().header("bad header", "x");
        let err = client.build_headers("e", &opts).expect_err("must reject header");
        assert!(matches!(err.cause, ErrorCause::Encode(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn parse_body_handles_empty_json_and_text() {
        assert_eq!(parse_body("  "), None);
        assert_eq!(parse_body("{\"ok\":true}"), Some(json!({"ok": true})));
        assert_eq!(parse_body("Bad Gateway"), Some(json!("Bad Gateway")));
    }

    #[test]
    fn decode_reports_endpoint() {
        let err = CrmClient::decode::<Vec<u32>>("http://api/leads", json!({"a": 1}))
            .expect_err("must fail");
        assert_eq!(err.endpoint, "http://api/leads");
        assert!(matches!(err.cause, ErrorCause::Decode(_)));
    }

    #[test]
    fn debug_redacts_session() {
        let client = client_with_token("secret-token");
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }
}

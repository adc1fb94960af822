use std::fmt;

use crate::clock;

/// HTTP method accepted by [`CrmClient::request`](crate::CrmClient::request).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Per-call transport options: extra query parameters and header overrides.
///
/// Header overrides are applied after the session `Authorization` header, so
/// an explicit `Authorization` entry replaces it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Appends a header override.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Retry bookkeeping for one logical request, owned by that call only.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RetryContext {
    /// Retries performed so far (the first attempt is not a retry).
    pub retries: u32,
    /// Unix milliseconds when the logical request started.
    pub started_at_ms: u64,
}

impl RetryContext {
    pub fn start() -> Self {
        Self {
            retries: 0,
            started_at_ms: clock::now_millis(),
        }
    }

    /// 1-indexed number of the attempt currently in flight.
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    pub fn attempt(&self) -> u32 {
        self.retries + 1
    }

    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    pub fn elapsed_ms(&self) -> u64 {
        clock::now_millis().saturating_sub(self.started_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::{Method, RequestOptions, RetryContext};

    #[test]
    fn method_maps_to_reqwest() {
        assert_eq!(reqwest::Method::from(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn request_options_builder_keeps_order() {
        let opts = RequestOptions::new()
            .query("status", "new")
            .query("page", "2")
            .header("X-Trace", "abc");
        assert_eq!(
            opts.query,
            vec![
                ("status".to_owned(), "new".to_owned()),
                ("page".to_owned(), "2".to_owned())
            ]
        );
        assert_eq!(opts.headers.len(), 1);
    }

    #[test]
    fn retry_context_starts_at_first_attempt() {
        let ctx = RetryContext::start();
        assert_eq!(ctx.retries, 0);
        assert_eq!(ctx.attempt(), 1);
        assert!(ctx.started_at_ms > 0);
    }
}

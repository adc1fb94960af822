use std::time::Duration;

/// API root used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_ENV: &str = "LEADDESK_API_URL";

/// Configures HTTP timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base retry delay in milliseconds (exponential strategy).
    pub retry_delay_ms: u64,
    /// Upper bound for a single backoff delay. `None` keeps the plain
    /// exponential formula.
    pub max_retry_delay_ms: Option<u64>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            max_retry_delay_ms: None,
        }
    }
}

impl ClientOptions {
    /// Delay before retry `retry` (1-indexed): `retry_delay_ms * 2^(retry - 1)`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(32);
        let multiplier = 1u64 << exp;
        let mut delay_ms = self.retry_delay_ms.saturating_mul(multiplier);
        if let Some(cap) = self.max_retry_delay_ms {
            delay_ms = delay_ms.min(cap);
        }
        Duration::from_millis(delay_ms)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Resolves the API root from [`BASE_URL_ENV`], falling back to
/// [`DEFAULT_BASE_URL`] when the variable is unset or blank.
///
/// `wasm32` targets have no process environment and always get the default.
pub fn base_url_from_env() -> String {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                return url.trim().to_owned();
            }
        }
    }
    DEFAULT_BASE_URL.to_owned()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ClientOptions;

    #[test]
    fn defaults_match_documented_values() {
        let opts = ClientOptions::default();
        assert_eq!(opts.timeout_ms, 15_000);
        assert_eq!(opts.max_retries, 3);
        assert_eq!(opts.retry_delay_ms, 1_000);
        assert_eq!(opts.max_retry_delay_ms, None);
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let opts = ClientOptions::default();
        assert_eq!(opts.backoff_delay(1), Duration::from_millis(1_000));
        assert_eq!(opts.backoff_delay(2), Duration::from_millis(2_000));
        assert_eq!(opts.backoff_delay(3), Duration::from_millis(4_000));
    }

    #[test]
    fn backoff_respects_cap() {
        let opts = ClientOptions {
            max_retry_delay_ms: Some(3_000),
            ..ClientOptions::default()
        };
        assert_eq!(opts.backoff_delay(2), Duration::from_millis(2_000));
        assert_eq!(opts.backoff_delay(3), Duration::from_millis(3_000));
        assert_eq!(opts.backoff_delay(10), Duration::from_millis(3_000));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let opts = ClientOptions {
            retry_delay_ms: u64::MAX / 2,
            ..ClientOptions::default()
        };
        assert_eq!(opts.backoff_delay(40), Duration::from_millis(u64::MAX));
    }
}

use std::time::Duration;

use reqwest::Url;

use super::CallError;
use crate::auth::AuthMethod;

/// How every call of a run is addressed and decorated.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub base_uri: String,
    pub base_path: String,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub auth: AuthMethod,
    pub timeout: Duration,
}

impl RequestSpec {
    /// `base_uri + base_path + endpoint`, with query-string auth applied.
    pub fn url_for(&self, endpoint: &str) -> Result<Url, CallError> {
        let mut raw = self.base_uri.trim().trim_end_matches('/').to_string();

        let base_path = self.base_path.trim().trim_matches('/');
        if !base_path.is_empty() {
            raw.push('/');
            raw.push_str(base_path);
        }

        let endpoint = endpoint.trim().trim_start_matches('/');
        if !endpoint.is_empty() {
            raw.push('/');
            raw.push_str(endpoint);
        }

        let mut url = Url::parse(&raw).map_err(|e| CallError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        self.auth.apply_to_url(&mut url);
        Ok(url)
    }
}

/// Retries cover failed connections only. A request that reached the server
/// is never sent again, even when it timed out.
/// The wait doubles after every attempt, starting at `delay`, and is capped at
/// [`MAX_RETRY_DELAY`]. The default is a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

impl RetryPolicy {
    /// Wait before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.delay.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            delay: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(base_uri: &str, base_path: &str) -> RequestSpec {
        RequestSpec {
            base_uri: base_uri.to_string(),
            base_path: base_path.to_string(),
            content_type: "application/json".to_string(),
            headers: Vec::new(),
            auth: AuthMethod::None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn joins_base_uri_path_and_endpoint() {
        let url = spec("http://localhost:8080/", "/api/v1/").url_for("/login").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/v1/login");
    }

    #[test]
    fn empty_base_path_is_skipped() {
        let url = spec("http://localhost:8080", "").url_for("login").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/login");
    }

    #[test]
    fn invalid_base_uri_is_rejected() {
        let err = spec("not a url", "").url_for("/login").unwrap_err();
        assert!(matches!(err, CallError::InvalidUrl { .. }));
    }
}

use std::time::Instant;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, Url};
use serde_json::Value;
use tracing::{debug, warn};

use super::request::{RequestSpec, RetryPolicy};
use super::response::{CallResult, ExpectedStatus};
use super::CallError;

const MAX_BODY_PREVIEW: usize = 512;

/// Issues the HTTP call for a request document.
///
/// Built once per run; the client, headers and auth are shared by every case.
#[derive(Debug, Clone)]
pub struct CallExecutor {
    client: Client,
    spec: RequestSpec,
    headers: HeaderMap,
    expected: ExpectedStatus,
    retry: RetryPolicy,
}

impl CallExecutor {
    pub fn new(spec: RequestSpec, expected: ExpectedStatus, retry: RetryPolicy) -> Result<Self, CallError> {
        spec.auth.validate().map_err(CallError::InvalidAuth)?;
        let headers = build_headers(&spec)?;

        let client = Client::builder()
            .timeout(spec.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(CallError::Client)?;

        Ok(Self {
            client,
            spec,
            headers,
            expected,
            retry,
        })
    }

    /// POST `request` to `endpoint` and parse the JSON response.
    pub async fn execute(&self, endpoint: &str, request: &Value) -> Result<CallResult, CallError> {
        let url = self.spec.url_for(endpoint)?;
        let body = serde_json::to_vec(request).map_err(CallError::Serialize)?;

        let mut attempt: u32 = 0;
        loop {
            let req_builder = self
                .client
                .post(url.clone())
                .headers(self.headers.clone())
                .body(body.clone());
            let req_builder = self.spec.auth.apply(req_builder);

            debug!(url = %url, attempt, "sending request");
            let started = Instant::now();
            match req_builder.send().await {
                Ok(response) => return self.read_response(&url, response, started, attempt + 1).await,
                Err(source) if source.is_connect() && attempt < self.retry.retries => {
                    attempt += 1;
                    let wait = self.retry.backoff(attempt);
                    warn!(url = %url, attempt, ?wait, error = %source, "connection failed, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(source) => {
                    return Err(CallError::Transport {
                        url: url.to_string(),
                        attempts: attempt + 1,
                        source,
                    });
                }
            }
        }
    }

    async fn read_response(
        &self,
        url: &Url,
        response: Response,
        started: Instant,
        attempts: u32,
    ) -> Result<CallResult, CallError> {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|source| CallError::Transport {
            url: url.to_string(),
            attempts,
            source,
        })?;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let body = String::from_utf8_lossy(&bytes).into_owned();

        if !self.expected.matches(status) {
            return Err(CallError::UnexpectedStatus {
                url: url.to_string(),
                expected: self.expected,
                actual: status,
                body: truncate(&body, MAX_BODY_PREVIEW),
            });
        }

        let document: Value = serde_json::from_str(&body).map_err(|source| CallError::InvalidBody {
            url: url.to_string(),
            source,
        })?;
        debug!(url = %url, status, duration_ms, %document, "received response");

        Ok(CallResult {
            endpoint: url.to_string(),
            status,
            document,
            duration_ms,
        })
    }
}

fn build_headers(spec: &RequestSpec) -> Result<HeaderMap, CallError> {
    let mut headers = HeaderMap::new();

    let content_type = HeaderValue::from_str(spec.content_type.trim()).map_err(|e| CallError::InvalidHeader {
        name: CONTENT_TYPE.to_string(),
        reason: e.to_string(),
    })?;
    headers.insert(CONTENT_TYPE, content_type.clone());
    headers.insert(ACCEPT, content_type);

    for (key, value) in &spec.headers {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| CallError::InvalidHeader {
            name: key.to_string(),
            reason: e.to_string(),
        })?;
        let header_value = HeaderValue::from_str(value.trim()).map_err(|e| CallError::InvalidHeader {
            name: key.to_string(),
            reason: e.to_string(),
        })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMethod;
    use crate::http::error_chain;
    use axum::Router;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::post;
    use crate::http::request::MAX_RETRY_DELAY;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn spawn_server(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn spec(base_uri: &str) -> RequestSpec {
        RequestSpec {
            base_uri: base_uri.to_string(),
            base_path: "/api".to_string(),
            content_type: "application/json".to_string(),
            headers: vec![("X-Client".to_string(), "fixture-runner".to_string())],
            auth: AuthMethod::None,
            timeout: Duration::from_secs(5),
        }
    }

    fn executor(spec: RequestSpec) -> CallExecutor {
        CallExecutor::new(spec, ExpectedStatus::default(), RetryPolicy::default()).unwrap()
    }

    #[tokio::test]
    async fn posts_request_document_and_parses_response() {
        let router = Router::new().route(
            "/api/login",
            post(|headers: AxumHeaders, body: String| async move {
                let request: Value = serde_json::from_str(&body).unwrap();
                let client = headers.get("x-client").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
                let content_type = headers.get("content-type").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
                json!({"echo": request, "client": client, "content_type": content_type}).to_string()
            }),
        );
        let base = spawn_server(router).await;

        let result = executor(spec(&base)).execute("/login", &json!({"user": "a"})).await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(result.endpoint, format!("{base}/api/login"));
        assert_eq!(
            result.document,
            json!({"echo": {"user": "a"}, "client": "fixture-runner", "content_type": "application/json"})
        );
    }

    #[tokio::test]
    async fn bearer_auth_is_sent() {
        let router = Router::new().route(
            "/api/login",
            post(|headers: AxumHeaders| async move {
                let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
                json!({"authorization": auth}).to_string()
            }),
        );
        let base = spawn_server(router).await;
        let mut spec = spec(&base);
        spec.auth = AuthMethod::BearerToken { token: "abc".into() };

        let result = executor(spec).execute("/login", &json!({})).await.unwrap();
        assert_eq!(result.document, json!({"authorization": "Bearer abc"}));
    }

    #[tokio::test]
    async fn unexpected_status_is_a_call_error() {
        let router = Router::new().route(
            "/api/login",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_server(router).await;

        let err = executor(spec(&base)).execute("/login", &json!({})).await.unwrap_err();
        match err {
            CallError::UnexpectedStatus { actual, expected, body, .. } => {
                assert_eq!(actual, 500);
                assert_eq!(expected, ExpectedStatus::Class(2));
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_json_body_is_a_call_error() {
        let router = Router::new().route("/api/login", post(|| async { "plain text" }));
        let base = spawn_server(router).await;

        let err = executor(spec(&base)).execute("/login", &json!({})).await.unwrap_err();
        assert!(matches!(err, CallError::InvalidBody { .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_retried_then_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let retry = RetryPolicy {
            retries: 2,
            delay: Duration::from_millis(10),
        };
        let executor = CallExecutor::new(spec(&format!("http://{addr}")), ExpectedStatus::default(), retry).unwrap();

        let err = executor.execute("/login", &json!({})).await.unwrap_err();
        assert!(matches!(err, CallError::Transport { attempts: 3, .. }));
        assert!(error_chain(&err).starts_with("POST http://"));
    }

    #[tokio::test]
    async fn timed_out_post_is_not_sent_again() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/api/login",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    json!({"status": "ok"}).to_string()
                }
            }),
        );
        let base = spawn_server(router).await;
        let mut spec = spec(&base);
        spec.timeout = Duration::from_millis(100);
        let retry = RetryPolicy {
            retries: 2,
            delay: Duration::from_millis(10),
        };
        let executor = CallExecutor::new(spec, ExpectedStatus::default(), retry).unwrap();

        let err = executor.execute("/login", &json!({"user": "a"})).await.unwrap_err();
        assert!(matches!(err, CallError::Transport { attempts: 1, .. }), "{err}");

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let retry = RetryPolicy {
            retries: 5,
            delay: Duration::from_millis(100),
        };
        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(400));
        assert_eq!(retry.backoff(40), MAX_RETRY_DELAY);
    }

    #[test]
    fn invalid_extra_header_fails_construction() {
        let mut spec = spec("http://localhost");
        spec.headers.push(("bad header".to_string(), "x".to_string()));

        let err = CallExecutor::new(spec, ExpectedStatus::default(), RetryPolicy::default()).unwrap_err();
        assert!(matches!(err, CallError::InvalidHeader { .. }));
    }

    #[test]
    fn invalid_auth_fails_construction() {
        let mut spec = spec("http://localhost");
        spec.auth = AuthMethod::BearerToken { token: String::new() };

        let err = CallExecutor::new(spec, ExpectedStatus::default(), RetryPolicy::default()).unwrap_err();
        assert!(matches!(err, CallError::InvalidAuth(_)));
    }
}

//! # Authentication
//!
//! Authentication applied to every replayed request: Bearer Token, Basic
//! Auth, or an API key carried in a header or in the query string.

use reqwest::header::HeaderName;
use reqwest::{RequestBuilder, Url};

/// Supported authentication methods.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthMethod {
    #[default]
    None,
    BearerToken {
        token: String,
    },
    BasicAuth {
        username: String,
        password: String,
    },
    ApiKey {
        key: String,
        value: String,
        location: ApiKeyLocation,
    },
}

/// Where to place the API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    Header,
    Query,
}

impl AuthMethod {
    /// Check the settings once, before any request is sent.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            AuthMethod::None => {}
            AuthMethod::BearerToken { token } => {
                if token.trim().is_empty() {
                    return Err("Bearer token cannot be empty".to_string());
                }
            }
            AuthMethod::BasicAuth { username, .. } => {
                if username.trim().is_empty() {
                    return Err("Basic auth username cannot be empty".to_string());
                }
            }
            AuthMethod::ApiKey { key, location, .. } => {
                let key = key.trim();
                if key.is_empty() {
                    return Err("API key name cannot be empty".to_string());
                }
                if *location == ApiKeyLocation::Header {
                    HeaderName::from_bytes(key.as_bytes())
                        .map_err(|e| format!("Invalid API key header `{key}`: {e}"))?;
                }
            }
        }
        Ok(())
    }

    /// Add query-string credentials to the request URL.
    pub fn apply_to_url(&self, url: &mut Url) {
        if let AuthMethod::ApiKey {
            key,
            value,
            location: ApiKeyLocation::Query,
        } = self
        {
            url.query_pairs_mut().append_pair(key.trim(), value.trim());
        }
    }

    /// Add header credentials to the request.
    pub fn apply(&self, req_builder: RequestBuilder) -> RequestBuilder {
        match self {
            AuthMethod::None => req_builder,
            AuthMethod::BearerToken { token } => req_builder.bearer_auth(token.trim()),
            AuthMethod::BasicAuth { username, password } => {
                req_builder.basic_auth(username.trim(), Some(password.trim()))
            }
            AuthMethod::ApiKey {
                key,
                value,
                location: ApiKeyLocation::Header,
            } => req_builder.header(key.trim(), value.trim()),
            AuthMethod::ApiKey {
                location: ApiKeyLocation::Query,
                ..
            } => req_builder,
        }
    }
}

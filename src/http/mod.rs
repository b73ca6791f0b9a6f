//! # HTTP
//!
//! The call executor: one JSON POST per test case against the configured
//! endpoint, checked against the expected status before the body is parsed.

mod client;
mod request;
mod response;

use std::error::Error as StdError;

use thiserror::Error;

pub use client::CallExecutor;
pub use request::{RequestSpec, RetryPolicy};
pub use response::ExpectedStatus;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("invalid auth settings: {0}")]
    InvalidAuth(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to serialize request body: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("POST {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("POST {url} returned status {actual}, expected {expected}; body: {body}")]
    UnexpectedStatus {
        url: String,
        expected: ExpectedStatus,
        actual: u16,
        body: String,
    },
    #[error("response from {url} is not valid JSON: {source}")]
    InvalidBody {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Render an error with its chain of causes, e.g.
/// `POST ... failed: error sending request: connection refused`.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

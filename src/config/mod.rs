//! # Configuration
//!
//! Harness settings come from a properties file (`application.properties` by
//! default), with `{{NAME}}` placeholders resolved against the process
//! environment and command-line overrides applied last.

mod properties;

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::{ApiKeyLocation, AuthMethod};
use crate::environment::{build_variable_map, unresolved_placeholders};
use crate::fixtures::DEFAULT_MAX_DEPTH;
use crate::http::{ExpectedStatus, RequestSpec, RetryPolicy};

pub use properties::Properties;

pub const DEFAULT_CONFIG_FILE: &str = "application.properties";
pub const DEFAULT_REPORT_PATH: &str = "Reports/APIAutomationTestReport.html";
pub const DEFAULT_REPORT_TITLE: &str = "API Automation Test Report";
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

const HEADER_PREFIX: &str = "HEADER.";
const REPORT_INFO_PREFIX: &str = "REPORT_INFO.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration line {line}: `{content}`")]
    Syntax { line: usize, content: String },
    #[error("missing required configuration key `{0}`")]
    Missing(&'static str),
    #[error("invalid value `{value}` for `{key}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Values given on the command line; each one replaces its properties key.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub fixture_dir: Option<PathBuf>,
    pub base_uri: Option<String>,
    pub endpoint: Option<String>,
    pub report_path: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub history_db: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub path: PathBuf,
    pub title: String,
    pub system_info: Vec<(String, String)>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixture_dir: PathBuf,
    pub endpoint: String,
    pub request: RequestSpec,
    pub expected_status: ExpectedStatus,
    pub retry: RetryPolicy,
    pub run_timeout: Option<Duration>,
    pub concurrency: usize,
    pub max_scan_depth: usize,
    pub report: ReportConfig,
    pub history_db: Option<PathBuf>,
}

/// Read the properties file and resolve placeholders.
///
/// An explicitly named file must exist. Without one, `application.properties`
/// in `base_dir` is used when present, otherwise the run relies on overrides.
pub fn load_properties(
    explicit: Option<&Path>,
    base_dir: &Path,
    process_env: impl IntoIterator<Item = (String, String)>,
) -> Result<Properties, ConfigError> {
    let properties = match explicit {
        Some(path) => Properties::load(path)?,
        None => {
            let default_path = base_dir.join(DEFAULT_CONFIG_FILE);
            if default_path.is_file() {
                Properties::load(&default_path)?
            } else {
                debug!(path = %default_path.display(), "no properties file, using defaults and overrides");
                Properties::default()
            }
        }
    };

    let variables = build_variable_map(properties.iter(), process_env);
    let resolved = properties.interpolated(&variables);
    for (key, value) in resolved.iter() {
        for name in unresolved_placeholders(value) {
            warn!(key, placeholder = %name, "unresolved placeholder in configuration value");
        }
    }

    Ok(resolved)
}

impl HarnessConfig {
    pub fn from_properties(
        properties: &Properties,
        overrides: &Overrides,
        base_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let fixture_dir = match &overrides.fixture_dir {
            Some(dir) => base_dir.join(dir),
            None => {
                let raw = properties
                    .get("JSON_FILE_DIR")
                    .ok_or(ConfigError::Missing("JSON_FILE_DIR"))?;
                // appended to the working directory even when written with a leading separator
                base_dir.join(raw.trim_start_matches(['/', '\\']))
            }
        };

        let base_uri = overrides
            .base_uri
            .clone()
            .or_else(|| properties.get("BASE_URI").map(str::to_string))
            .ok_or(ConfigError::Missing("BASE_URI"))?;
        let endpoint = overrides
            .endpoint
            .clone()
            .or_else(|| properties.get("ENDPOINT").map(str::to_string))
            .ok_or(ConfigError::Missing("ENDPOINT"))?;

        let headers = properties
            .with_prefix(HEADER_PREFIX)
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let request = RequestSpec {
            base_uri,
            base_path: properties.get("BASE_PATH").unwrap_or_default().to_string(),
            content_type: properties
                .get("CONTENT_TYPE")
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            headers,
            auth: parse_auth(properties)?,
            timeout: Duration::from_millis(parse_number(
                properties,
                "REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?),
        };

        let expected_status = match properties.get("EXPECTED_STATUS") {
            Some(raw) => ExpectedStatus::from_str(raw).map_err(|reason| ConfigError::Invalid {
                key: "EXPECTED_STATUS",
                value: raw.to_string(),
                reason,
            })?,
            None => ExpectedStatus::default(),
        };

        let retry = RetryPolicy {
            retries: parse_number(properties, "RETRY_COUNT", 0)?,
            delay: Duration::from_millis(parse_number(properties, "RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)?),
        };

        let run_timeout = match properties.get("RUN_TIMEOUT_SECS") {
            Some(_) => Some(Duration::from_secs(parse_number(properties, "RUN_TIMEOUT_SECS", 0)?)),
            None => None,
        };

        let concurrency = match overrides.concurrency {
            Some(jobs) => jobs,
            None => parse_number(properties, "CONCURRENCY", 1)?,
        };
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "CONCURRENCY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let report_path = overrides.report_path.clone().unwrap_or_else(|| {
            PathBuf::from(properties.get("REPORT_PATH").unwrap_or(DEFAULT_REPORT_PATH))
        });
        let report = ReportConfig {
            path: base_dir.join(report_path),
            title: properties
                .get("REPORT_TITLE")
                .unwrap_or(DEFAULT_REPORT_TITLE)
                .to_string(),
            system_info: properties
                .with_prefix(REPORT_INFO_PREFIX)
                .map(|(name, value)| (name.replace('_', " "), value.to_string()))
                .collect(),
        };

        let history_db = history_path(properties, overrides, base_dir);

        Ok(Self {
            fixture_dir,
            endpoint,
            request,
            expected_status,
            retry,
            run_timeout,
            concurrency,
            max_scan_depth: parse_number(properties, "MAX_SCAN_DEPTH", DEFAULT_MAX_DEPTH)?,
            report,
            history_db,
        })
    }
}

/// History database location, if one is configured. Needs none of the
/// request settings, so stored runs can be listed without them.
pub fn history_path(properties: &Properties, overrides: &Overrides, base_dir: &Path) -> Option<PathBuf> {
    overrides
        .history_db
        .clone()
        .or_else(|| properties.get("HISTORY_DB").map(PathBuf::from))
        .map(|path| base_dir.join(path))
}

fn parse_number<T>(properties: &Properties, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match properties.get(key) {
        Some(raw) => raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}

fn require(properties: &Properties, key: &'static str) -> Result<String, ConfigError> {
    properties
        .get(key)
        .map(str::to_string)
        .ok_or(ConfigError::Missing(key))
}

fn parse_auth(properties: &Properties) -> Result<AuthMethod, ConfigError> {
    let kind = properties.get("AUTH_TYPE").unwrap_or("none");

    let auth = match kind.to_ascii_lowercase().as_str() {
        "none" => AuthMethod::None,
        "bearer" => AuthMethod::BearerToken {
            token: require(properties, "AUTH_TOKEN")?,
        },
        "basic" => AuthMethod::BasicAuth {
            username: require(properties, "AUTH_USERNAME")?,
            password: properties.get("AUTH_PASSWORD").unwrap_or_default().to_string(),
        },
        "api_key_header" | "api_key_query" => AuthMethod::ApiKey {
            key: require(properties, "API_KEY_NAME")?,
            value: properties.get("API_KEY_VALUE").unwrap_or_default().to_string(),
            location: if kind.eq_ignore_ascii_case("api_key_query") {
                ApiKeyLocation::Query
            } else {
                ApiKeyLocation::Header
            },
        },
        _ => {
            return Err(ConfigError::Invalid {
                key: "AUTH_TYPE",
                value: kind.to_string(),
                reason: "expected none, bearer, basic, api_key_header or api_key_query".to_string(),
            });
        }
    };

    Ok(auth)
}

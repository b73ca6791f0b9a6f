use std::fmt::{self, Display};
use std::str::FromStr;

use serde_json::Value;

/// Status codes a call must return to count as completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedStatus {
    Exact(u16),
    /// A status class, e.g. `Class(2)` for `2xx`.
    Class(u8),
}

impl ExpectedStatus {
    pub fn matches(&self, status: u16) -> bool {
        match self {
            ExpectedStatus::Exact(code) => status == *code,
            ExpectedStatus::Class(class) => status / 100 == u16::from(*class),
        }
    }
}

impl Default for ExpectedStatus {
    fn default() -> Self {
        ExpectedStatus::Class(2)
    }
}

impl FromStr for ExpectedStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let raw = input.trim();
        let lower = raw.to_ascii_lowercase();

        if let Some(class) = lower.strip_suffix("xx") {
            return match class.parse::<u8>() {
                Ok(class @ 1..=5) => Ok(ExpectedStatus::Class(class)),
                _ => Err(format!("Unknown status class `{raw}`")),
            };
        }

        match raw.parse::<u16>() {
            Ok(code @ 100..=599) => Ok(ExpectedStatus::Exact(code)),
            _ => Err(format!("Expected a status code like `200` or a class like `2xx`, got `{raw}`")),
        }
    }
}

impl Display for ExpectedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedStatus::Exact(code) => write!(f, "{code}"),
            ExpectedStatus::Class(class) => write!(f, "{class}xx"),
        }
    }
}

/// A completed call, scoped to one test case.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub endpoint: String,
    pub status: u16,
    pub document: Value,
    pub duration_ms: u64,
}

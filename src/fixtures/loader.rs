use std::fmt::{self, Display};
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FixtureError;

pub const REQUEST_SUFFIX: &str = "-request.json";
pub const RESPONSE_SUFFIX: &str = "-response.json";

const CASE_ID_DELIMITER: char = '-';
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Identifier shared by the request and response fixtures of one test case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    pub fn request_file_name(&self) -> String {
        format!("{}{REQUEST_SUFFIX}", self.0)
    }

    pub fn response_file_name(&self) -> String {
        format!("{}{RESPONSE_SUFFIX}", self.0)
    }
}

impl Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the case id from a request fixture name by cutting at the first `-`.
///
/// The name must read back as exactly `<CaseId>-request.json`. A name such as
/// `LOGIN-2-request.json` is rejected rather than mapped to `LOGIN`, which
/// would silently pair it with another case's fixtures.
pub fn extract_case_id(file_name: &str) -> Result<CaseId, FixtureError> {
    let malformed = |reason| FixtureError::MalformedName {
        file_name: file_name.to_string(),
        reason,
    };

    let (prefix, _) = file_name
        .split_once(CASE_ID_DELIMITER)
        .ok_or_else(|| malformed("no `-` delimiter after the case id"))?;
    if prefix.is_empty() {
        return Err(malformed("case id before `-` is empty"));
    }

    let case_id = CaseId(prefix.to_string());
    if case_id.request_file_name() != file_name {
        return Err(malformed("expected `<CaseId>-request.json` with no `-` inside the case id"));
    }

    Ok(case_id)
}

/// Read and parse one fixture.
///
/// I/O failures come back as [`FixtureError::NotFound`] so the caller can skip
/// the case; malformed JSON is [`FixtureError::Parse`] and must be reported.
pub fn load_document(dir: &Path, file_name: &str) -> Result<Value, FixtureError> {
    let path = dir.join(file_name);

    let raw = fs::read(&path).map_err(|source| {
        warn!(path = %path.display(), error = %source, "fixture not found");
        FixtureError::NotFound {
            path: path.clone(),
            source,
        }
    })?;
    let content = raw.strip_prefix(UTF8_BOM).unwrap_or(&raw);

    let document: Value = serde_json::from_slice(content).map_err(|source| FixtureError::Parse {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), %document, "loaded fixture");

    Ok(document)
}

//! # Fixtures
//!
//! Discovery and loading of request / expected-response JSON fixtures.
//!
//! A test case is a pair of files sharing a case id prefix:
//! `<CaseId>-request.json` and `<CaseId>-response.json`, living in the same
//! directory anywhere below the fixture root. Case ids must not contain `-`.

mod loader;
mod locator;

pub use loader::{CaseId, extract_case_id, load_document};
pub use locator::{DEFAULT_MAX_DEPTH, RequestFixture, locate};

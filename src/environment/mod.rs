//! # Variables
//!
//! `{{NAME}}` interpolation for configuration values. Variables come from the
//! properties file itself and from the process environment; a process
//! environment variable overrides a property of the same name.

use std::collections::HashMap;

/// Build a merged variable map.
/// Priority: process environment overrides properties.
pub fn build_variable_map<'a>(
    properties: impl IntoIterator<Item = (&'a str, &'a str)>,
    process_env: impl IntoIterator<Item = (String, String)>,
) -> HashMap<String, String> {
    let mut variables = HashMap::new();

    for (key, value) in properties {
        if !key.is_empty() {
            variables.insert(key.to_string(), value.to_string());
        }
    }

    for (key, value) in process_env {
        if !key.is_empty() {
            variables.insert(key, value);
        }
    }

    variables
}

/// Replace `{{key}}` placeholders. Unknown placeholders are left untouched.
pub fn interpolate(input: &str, variables: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            result.push_str(&rest[start..]);
            return result;
        };

        let name = after_open[..end].trim();
        match variables.get(name) {
            Some(value) => result.push_str(value),
            None => result.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    result.push_str(rest);
    result
}

/// Names of placeholders that are still present in `input`.
pub fn unresolved_placeholders(input: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            break;
        };
        names.push(after_open[..end].trim().to_string());
        rest = &after_open[end + 2..];
    }

    names
}

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use super::ConfigError;
use crate::environment::interpolate;

/// Flat `KEY=value` configuration, as found in `application.properties`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    /// Parse properties text.
    ///
    /// Blank lines and lines starting with `#` or `!` are ignored. The key
    /// ends at the first `=`, `:` or whitespace, so `KEY=value`, `KEY: value`
    /// and `KEY value` all read the same; a bare `KEY` has an empty value.
    /// Escapes and continuation lines are not supported. A later definition
    /// of the same key replaces an earlier one.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let mut values = BTreeMap::new();

        for (index, line) in input.lines().enumerate() {
            let raw = line.trim();
            if raw.is_empty() || raw.starts_with('#') || raw.starts_with('!') {
                continue;
            }

            let split = raw
                .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
                .unwrap_or(raw.len());
            let (key, rest) = raw.split_at(split);
            if key.is_empty() {
                return Err(ConfigError::Syntax {
                    line: index + 1,
                    content: raw.to_string(),
                });
            }
            let rest = rest.trim_start();
            let value = rest.strip_prefix(['=', ':']).unwrap_or(rest).trim();
            values.insert(key.to_string(), value.to_string());
        }

        Ok(Self { values })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Value for `key`; empty values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Entries whose key starts with `prefix`, with the prefix removed, in key order.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.iter().filter_map(move |(key, value)| {
            key.strip_prefix(prefix)
                .filter(|name| !name.is_empty())
                .map(|name| (name, value))
        })
    }

    /// Copy with `{{NAME}}` placeholders in every value resolved.
    pub fn interpolated(&self, variables: &HashMap<String, String>) -> Self {
        let values = self
            .values
            .iter()
            .map(|(key, value)| (key.clone(), interpolate(value, variables)))
            .collect();
        Self { values }
    }
}

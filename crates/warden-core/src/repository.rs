//! # Repository Names
//!
//! A `Repository` is an `owner/name` pair as used by Docker Hub, validated
//! against `^[a-z0-9]+(?:[._-][a-z0-9]+)*/[a-z0-9]+(?:[._-][a-z0-9]+)*$`.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A validated `owner/name` repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Repository(String);

impl Repository {
    /// Validate and wrap a repository name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRepository`] if the input is not
    /// exactly two lowercase path components separated by `/`.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        let mut parts = s.split('/');
        let valid = match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => is_valid_component(owner) && is_valid_component(name),
            _ => false,
        };
        if !valid {
            return Err(ValidationError::InvalidRepository(s));
        }
        Ok(Self(s))
    }

    /// The `owner/name` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `[a-z0-9]+` runs joined by single `.`, `_`, or `-` separators.
fn is_valid_component(component: &str) -> bool {
    if component.is_empty() {
        return false;
    }
    let mut previous_was_separator = true;
    for b in component.bytes() {
        match b {
            b'a'..=b'z' | b'0'..=b'9' => previous_was_separator = false,
            b'.' | b'_' | b'-' => {
                if previous_was_separator {
                    return false;
                }
                previous_was_separator = true;
            }
            _ => return false,
        }
    }
    !previous_was_separator
}

impl TryFrom<String> for Repository {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Repository> for String {
    fn from(r: Repository) -> Self {
        r.0
    }
}

impl std::str::FromStr for Repository {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

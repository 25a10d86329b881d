//! Host and body matchers
//!
//! Patterns are exact strings unless prefixed with `~`, in which case the rest
//! is a regular expression.

use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::fingerprint::normalize_scope;
use crate::network::HttpRequest;
use crate::{ReelError, Result};

/// Prefix marking a regex pattern
pub const REGEX_PREFIX: char = '~';

/// Key of a JSON body matcher holding a regex
pub const BODY_REGEX_KEY: &str = "$regex";

/// Matches the server a request targets
#[derive(Clone)]
pub enum HostPattern {
    /// Every host
    Any,
    /// `host`, `host:port` or `scheme://host:port`
    Exact(String),
    /// Regex tested against `host:port` and `scheme://host:port`
    Regex(Regex),
}

impl HostPattern {
    /// Parse a pattern; `~` prefix selects a regex, `*` or empty selects any host
    ///
    /// # Errors
    ///
    /// Returns error if the regex does not compile
    pub fn parse(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim();

        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::Any);
        }

        if let Some(source) = trimmed.strip_prefix(REGEX_PREFIX) {
            return Regex::new(source)
                .map(Self::Regex)
                .map_err(|e| ReelError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                });
        }

        Ok(Self::Exact(normalize_scope(trimmed)))
    }

    /// Whether a request targets a matching host
    #[must_use]
    pub fn matches(&self, request: &HttpRequest) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => {
                *expected == request.host
                    || *expected == request.authority()
                    || *expected == request.scope()
            }
            Self::Regex(regex) => {
                regex.is_match(&request.authority()) || regex.is_match(&request.scope())
            }
        }
    }
}

impl fmt::Debug for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(host) => write!(f, "{host}"),
            Self::Regex(regex) => write!(f, "{REGEX_PREFIX}{}", regex.as_str()),
        }
    }
}

/// Matches an outgoing request body
#[derive(Clone, Debug)]
pub enum BodyMatcher {
    /// Exact text
    Text(String),
    /// Regex over the body text
    Regex(Regex),
    /// Structural equality with the body parsed as JSON
    Json(Value),
}

impl BodyMatcher {
    /// Build a matcher from a cassette `body` value
    ///
    /// Strings match exactly, `{"$regex": "..."}` matches by regex, any other
    /// JSON value matches structurally.
    ///
    /// # Errors
    ///
    /// Returns error if a `$regex` pattern does not compile
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(Self::Text(text.clone())),
            Value::Object(map) if map.len() == 1 => match map.get(BODY_REGEX_KEY) {
                Some(Value::String(source)) => {
                    Regex::new(source)
                        .map(Self::Regex)
                        .map_err(|e| ReelError::InvalidPattern {
                            pattern: source.clone(),
                            reason: e.to_string(),
                        })
                }
                _ => Ok(Self::Json(value.clone())),
            },
            other => Ok(Self::Json(other.clone())),
        }
    }

    /// Whether a request body satisfies this matcher
    #[must_use]
    pub fn matches(&self, body: &[u8]) -> bool {
        match self {
            Self::Text(expected) => String::from_utf8_lossy(body) == expected.as_str(),
            Self::Regex(regex) => regex.is_match(&String::from_utf8_lossy(body)),
            Self::Json(expected) => serde_json::from_slice::<Value>(body)
                .map(|actual| actual == *expected)
                .unwrap_or(false),
        }
    }
}

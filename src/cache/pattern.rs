//! Key Pattern Module
//!
//! Selects cache keys for removal, either by exact match or by a glob where
//! `*` matches any run of characters and `?` exactly one. Every other
//! character, `.` included, matches only itself.

use regex::Regex;

use crate::error::{ProxyError, Result};

// == Key Pattern ==
/// A compiled key selector.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Plain key without glob metacharacters
    Exact(String),
    /// Glob compiled to a single anchored regex
    Glob { source: String, regex: Regex },
}

impl KeyPattern {
    /// Compiles `pattern`, choosing exact matching when it holds no `*` or `?`.
    pub fn parse(pattern: &str) -> Result<Self> {
        if !pattern.contains(['*', '?']) {
            return Ok(Self::Exact(pattern.to_string()));
        }

        let mut expr = String::with_capacity(pattern.len() * 2 + 8);
        expr.push_str("^(?s:");
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
        expr.push_str(")$");

        let regex = Regex::new(&expr).map_err(|e| ProxyError::InvalidPattern(e.to_string()))?;
        Ok(Self::Glob {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Returns true if `key` is selected by this pattern.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == key,
            Self::Glob { regex, .. } => regex.is_match(key),
        }
    }

    /// The pattern as written by the caller.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(exact) => exact,
            Self::Glob { source, .. } => source,
        }
    }

    pub fn is_glob(&self) -> bool {
        matches!(self, Self::Glob { .. })
    }
}

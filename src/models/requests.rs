//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Request body for removing entries (POST /entries/remove)
///
/// # Fields
/// - `pattern`: Exact cache key, or a glob using `*` and `?`
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveRequest {
    pub pattern: String,
}

impl RemoveRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.trim().is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        None
    }
}

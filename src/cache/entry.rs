//! Cache Entry Module
//!
//! Defines the immutable record stored for each cached URL.

use bytes::Bytes;
use chrono::{DateTime, Utc};

// == Cache Entry ==
/// A cached response body with its MIME type and absolute expiry.
///
/// Entries are never mutated after construction; cloning one is cheap
/// because the body is reference-counted.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    body: Bytes,
    content_type: String,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry expiring at `expires_at`.
    pub fn new(body: Bytes, content_type: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            body,
            content_type: content_type.into(),
            expires_at,
        }
    }

    /// The cached body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The MIME type reported by the upstream.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Body length in bytes, the unit of the cache's byte accounting.
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }

    // == Is Expired ==
    /// Checks whether the entry is stale at `now`.
    ///
    /// An entry stays fresh up to and including its expiry instant; it is
    /// expired only once `now` is strictly later.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Checks whether the entry is stale right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_entry_accessors() {
        let expires = Utc::now() + TimeDelta::seconds(60);
        let entry = CacheEntry::new(Bytes::from_static(b"<p>hi</p>"), "text/html", expires);

        assert_eq!(entry.body().as_ref(), b"<p>hi</p>");
        assert_eq!(entry.content_type(), "text/html");
        assert_eq!(entry.expires_at(), expires);
        assert_eq!(entry.size(), 9);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let expires = Utc::now();
        let entry = CacheEntry::new(Bytes::new(), "text/plain", expires);

        // Fresh at exactly the expiry instant, stale one tick later
        assert!(!entry.is_expired_at(expires));
        assert!(entry.is_expired_at(expires + TimeDelta::milliseconds(1)));
    }

    #[test]
    fn test_entry_expired_in_past() {
        let entry = CacheEntry::new(
            Bytes::from_static(b"old"),
            "text/plain",
            Utc::now() - TimeDelta::seconds(1),
        );
        assert!(entry.is_expired());
    }
}

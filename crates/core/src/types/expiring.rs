//! Values with an expiry instant.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How a cached value relates to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Not yet past its expiry instant.
    Valid,
    /// Past its expiry instant.
    Stale,
}

/// A value paired with the instant after which it must not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expiring<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> Expiring<T> {
    /// Wrap `value`, expiring `ttl` after `now`.
    #[must_use]
    pub fn new(value: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: now + ttl,
        }
    }

    /// Wrap `value` with an explicit expiry instant.
    #[must_use]
    pub const fn until(value: T, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    /// A value is valid up to and including its expiry instant.
    #[must_use]
    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        if now > self.expires_at {
            Freshness::Stale
        } else {
            Freshness::Valid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    #[test]
    fn test_valid_until_expiry_inclusive() {
        let cached = Expiring::new(0.2_f64.to_bits(), at(0), Duration::milliseconds(1000));
        assert_eq!(cached.freshness(at(500)), Freshness::Valid);
        assert_eq!(cached.freshness(at(1000)), Freshness::Valid);
        assert_eq!(cached.freshness(at(1001)), Freshness::Stale);
    }

    #[test]
    fn test_until_keeps_explicit_instant() {
        let cached = Expiring::until("cart", at(10));
        assert_eq!(cached.expires_at, at(10));
        assert_eq!(cached.freshness(at(11)), Freshness::Stale);
    }
}

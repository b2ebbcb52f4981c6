//! Freshness policy: when is cached data old enough to refetch.

const MINUTE_MILLIS: i64 = 60 * 1000;
const HOUR_MILLIS: i64 = 60 * MINUTE_MILLIS;

/// Returns true when data fetched at `last_fetched_at` is stale at `now`.
///
/// Data that was never fetched is always stale.
pub fn is_stale(last_fetched_at: Option<i64>, now: i64, ttl_millis: i64) -> bool {
  match last_fetched_at {
    Some(fetched) => now.saturating_sub(fetched) > ttl_millis,
    None => true,
  }
}

/// Time-to-live for one resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
  ttl_millis: i64,
}

impl FreshnessPolicy {
  pub const CONTACTS: Self = Self {
    ttl_millis: 24 * HOUR_MILLIS,
  };
  pub const POSTS: Self = Self {
    ttl_millis: HOUR_MILLIS,
  };
  pub const VIDEOS: Self = Self {
    ttl_millis: 2 * HOUR_MILLIS,
  };

  /// Create a policy; the TTL must be positive.
  pub fn new(ttl_millis: i64) -> Option<Self> {
    (ttl_millis > 0).then_some(Self { ttl_millis })
  }

  pub fn from_minutes(minutes: u64) -> Option<Self> {
    let millis = i64::try_from(minutes).ok()?.checked_mul(MINUTE_MILLIS)?;
    Self::new(millis)
  }

  pub fn ttl_millis(&self) -> i64 {
    self.ttl_millis
  }

  pub fn is_stale(&self, last_fetched_at: Option<i64>, now: i64) -> bool {
    is_stale(last_fetched_at, now, self.ttl_millis)
  }
}

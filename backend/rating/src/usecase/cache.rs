//! Per-user rating cache, keyed by role and user id.
//!
//! Every key carries a generation. `invalidate` bumps it, and `put` only
//! stores a value read under the generation it was handed on the miss, so a
//! reader that raced a write cannot reinstate ratings from before the write.

use std::fmt;
use std::time::{Duration, Instant};

use common::events::UserType;
use dashmap::DashMap;

use crate::domain::rating::RatingRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_type: UserType,
    pub user_id: i64,
}

impl CacheKey {
    pub fn new(user_type: UserType, user_id: i64) -> Self {
        Self { user_type, user_id }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.user_type {
            UserType::Driver => "driver-rate",
            UserType::Passenger => "passenger-rate",
        };
        write!(f, "{prefix}::{}", self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedRatings {
    pub ratings: Vec<RatingRecord>,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(CachedRatings),
    /// Pass `generation` back to [`RatingCache::put`].
    Miss { generation: u64 },
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    value: Option<(CachedRatings, Instant)>,
}

#[derive(Debug, Default)]
pub struct RatingCache {
    slots: DashMap<CacheKey, Slot>,
}

impl RatingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Lookup {
        let Some(mut slot) = self.slots.get_mut(key) else {
            metrics::counter!("rating_cache_misses_total").increment(1);
            return Lookup::Miss { generation: 0 };
        };

        match &slot.value {
            Some((value, expires_at)) if Instant::now() < *expires_at => {
                metrics::counter!("rating_cache_hits_total").increment(1);
                Lookup::Hit(value.clone())
            }
            _ => {
                slot.value = None;
                metrics::counter!("rating_cache_misses_total").increment(1);
                Lookup::Miss {
                    generation: slot.generation,
                }
            }
        }
    }

    /// Stores `value` unless the key was invalidated since the miss that
    /// produced `generation`. Returns whether the value was stored.
    pub fn put(&self, key: CacheKey, value: CachedRatings, ttl: Duration, generation: u64) -> bool {
        let mut slot = self.slots.entry(key).or_default();
        if slot.generation != generation {
            tracing::debug!(key = %key, "skipping stale cache fill");
            return false;
        }
        slot.value = Some((value, Instant::now() + ttl));
        true
    }

    pub fn invalidate(&self, key: &CacheKey) {
        let mut slot = self.slots.entry(*key).or_default();
        slot.generation = slot.generation.wrapping_add(1);
        slot.value = None;
        tracing::debug!(key = %key, "cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rating::sample_rating;

    const TTL: Duration = Duration::from_secs(60);

    fn cached(values: &[i16]) -> CachedRatings {
        let ratings: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, v)| sample_rating(i as i64, 7, UserType::Driver, *v))
            .collect();
        let average = crate::domain::rating::average(&ratings);
        CachedRatings { ratings, average }
    }

    fn miss_generation(lookup: Lookup) -> u64 {
        match lookup {
            Lookup::Miss { generation } => generation,
            Lookup::Hit(_) => panic!("expected a miss"),
        }
    }

    #[test]
    fn test_key_format() {
        assert_eq!(CacheKey::new(UserType::Driver, 7).to_string(), "driver-rate::7");
        assert_eq!(
            CacheKey::new(UserType::Passenger, 12).to_string(),
            "passenger-rate::12"
        );
    }

    #[test]
    fn test_roles_do_not_share_entries() {
        let cache = RatingCache::new();
        let driver = CacheKey::new(UserType::Driver, 7);
        let passenger = CacheKey::new(UserType::Passenger, 7);

        let generation = miss_generation(cache.get(&driver));
        assert!(cache.put(driver, cached(&[5]), TTL, generation));

        assert!(matches!(cache.get(&driver), Lookup::Hit(_)));
        assert!(matches!(cache.get(&passenger), Lookup::Miss { .. }));
    }

    #[test]
    fn test_invalidate_drops_value() {
        let cache = RatingCache::new();
        let key = CacheKey::new(UserType::Driver, 7);

        let generation = miss_generation(cache.get(&key));
        cache.put(key, cached(&[4]), TTL, generation);
        cache.invalidate(&key);

        assert!(matches!(cache.get(&key), Lookup::Miss { .. }));
    }

    #[test]
    fn test_fill_after_concurrent_invalidate_is_rejected() {
        let cache = RatingCache::new();
        let key = CacheKey::new(UserType::Driver, 7);

        // Reader misses and goes to the store.
        let generation = miss_generation(cache.get(&key));
        // A write lands and invalidates before the reader fills.
        cache.invalidate(&key);

        assert!(!cache.put(key, cached(&[4]), TTL, generation));
        let fresh = miss_generation(cache.get(&key));
        assert!(cache.put(key, cached(&[4, 2]), TTL, fresh));

        match cache.get(&key) {
            Lookup::Hit(value) => assert_eq!(value.average, 3.0),
            Lookup::Miss { .. } => panic!("expected a hit"),
        }
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = RatingCache::new();
        let key = CacheKey::new(UserType::Passenger, 3);

        let generation = miss_generation(cache.get(&key));
        cache.put(key, cached(&[5]), Duration::ZERO, generation);

        assert!(matches!(cache.get(&key), Lookup::Miss { .. }));
    }
}

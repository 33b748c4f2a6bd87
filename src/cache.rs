//! In-memory TTL read cache in front of the store's read surface.
//!
//! Purely a read accelerator — never a source of truth. Conflict decisions
//! bypass it entirely; the live change feed supersedes it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use tracing::debug;

use crate::config::CachePolicy;
use crate::model::{BookingRequest, ChangeEvent, Classroom, Schedule};
use crate::observability;

/// Logical cache partitions, one per collection or view. An enum rather than
/// strings: an unknown namespace is a compile error, not a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Classrooms,
    Bookings,
    BookingsByFaculty,
    Schedules,
}

/// What a cache entry can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Classrooms(Vec<Classroom>),
    Bookings(Vec<BookingRequest>),
    Schedules(Vec<Schedule>),
}

struct Entry {
    value: CachedValue,
    expires_at: Instant,
    /// Monotonic insertion order, used for oldest-first eviction.
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub hit_rate: f64,
}

pub struct ReadCache {
    entries: DashMap<(Namespace, String), Entry>,
    policy: CachePolicy,
    hits: AtomicU64,
    misses: AtomicU64,
    seq: AtomicU64,
}

impl ReadCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            seq: AtomicU64::new(0),
        }
    }

    pub fn get(&self, namespace: Namespace, key: &str) -> Option<CachedValue> {
        let full_key = (namespace, key.to_owned());
        let expired = match self.entries.get(&full_key) {
            Some(entry) => {
                if Instant::now() < entry.expires_at {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(observability::CACHE_HITS_TOTAL).increment(1);
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(&full_key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(observability::CACHE_MISSES_TOTAL).increment(1);
        None
    }

    /// Insert with the namespace's TTL from the policy table.
    pub fn set(&self, namespace: Namespace, key: String, value: CachedValue) {
        while self.entries.len() >= self.policy.max_entries && self.evict_oldest() {}
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.policy.ttl_for(namespace),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        self.entries.insert((namespace, key), entry);
    }

    pub fn invalidate_namespace(&self, namespace: Namespace) {
        self.entries.retain(|(ns, _), _| *ns != namespace);
    }

    pub fn invalidate_key(&self, namespace: Namespace, key: &str) {
        self.entries.remove(&(namespace, key.to_owned()));
    }

    /// Relationship-aware invalidation, driven by the committed write.
    ///
    /// Classroom writes clear the room list plus booking/schedule views
    /// (room availability display depends on all of them); request writes
    /// clear the affected faculty's view, the global list, and — because
    /// approval creates a schedule — the schedules namespace.
    pub fn invalidate_for(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::ClassroomCreated(_) | ChangeEvent::ClassroomUpdated(_) => {
                self.invalidate_namespace(Namespace::Classrooms);
                self.invalidate_namespace(Namespace::Bookings);
                self.invalidate_namespace(Namespace::Schedules);
            }
            ChangeEvent::ClassroomDeleted { .. } => {
                // Deletion cascades to that room's requests and schedules,
                // so faculty views go stale too.
                self.invalidate_namespace(Namespace::Classrooms);
                self.invalidate_namespace(Namespace::Bookings);
                self.invalidate_namespace(Namespace::BookingsByFaculty);
                self.invalidate_namespace(Namespace::Schedules);
            }
            ChangeEvent::RequestSubmitted(r)
            | ChangeEvent::RequestApproved(r)
            | ChangeEvent::RequestRejected(r)
            | ChangeEvent::RequestExpired(r) => {
                self.invalidate_key(Namespace::BookingsByFaculty, &r.faculty_id);
                self.invalidate_namespace(Namespace::Bookings);
                self.invalidate_namespace(Namespace::Schedules);
            }
            ChangeEvent::ScheduleCreated(_) | ChangeEvent::ScheduleCancelled(_) => {
                self.invalidate_namespace(Namespace::Schedules);
            }
        }
        debug!(?event, "cache invalidated for write");
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            size: self.entries.len(),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().seq)
            .map(|e| e.key().clone());
        match oldest {
            Some(key) => {
                self.entries.remove(&key);
                metrics::counter!(observability::CACHE_EVICTIONS_TOTAL).increment(1);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;
    use ulid::Ulid;

    fn room(name: &str) -> Classroom {
        Classroom {
            id: Ulid::new(),
            name: name.into(),
            capacity: 30,
            equipment: BTreeSet::new(),
            building: "Main".into(),
            floor: 1,
            is_available: true,
        }
    }

    fn rooms_value(name: &str) -> CachedValue {
        CachedValue::Classrooms(vec![room(name)])
    }

    #[test]
    fn set_then_get_hits() {
        let cache = ReadCache::new(CachePolicy::default());
        cache.set(Namespace::Classrooms, "R1".into(), rooms_value("101"));
        assert!(cache.get(Namespace::Classrooms, "R1").is_some());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn namespace_invalidation_forces_miss() {
        let cache = ReadCache::new(CachePolicy::default());
        cache.set(Namespace::Classrooms, "R1".into(), rooms_value("101"));
        cache.invalidate_namespace(Namespace::Classrooms);
        assert!(cache.get(Namespace::Classrooms, "R1").is_none());
    }

    #[test]
    fn namespace_invalidation_leaves_other_namespaces() {
        let cache = ReadCache::new(CachePolicy::default());
        cache.set(Namespace::Classrooms, "all".into(), rooms_value("101"));
        cache.set(Namespace::Bookings, "all".into(), CachedValue::Bookings(vec![]));
        cache.invalidate_namespace(Namespace::Bookings);
        assert!(cache.get(Namespace::Classrooms, "all").is_some());
        assert!(cache.get(Namespace::Bookings, "all").is_none());
    }

    #[test]
    fn key_invalidation_is_scoped() {
        let cache = ReadCache::new(CachePolicy::default());
        cache.set(Namespace::BookingsByFaculty, "alice".into(), CachedValue::Bookings(vec![]));
        cache.set(Namespace::BookingsByFaculty, "bob".into(), CachedValue::Bookings(vec![]));
        cache.invalidate_key(Namespace::BookingsByFaculty, "alice");
        assert!(cache.get(Namespace::BookingsByFaculty, "alice").is_none());
        assert!(cache.get(Namespace::BookingsByFaculty, "bob").is_some());
    }

    #[test]
    fn expired_entries_miss() {
        let policy = CachePolicy {
            classrooms_ttl: Duration::from_millis(0),
            ..Default::default()
        };
        let cache = ReadCache::new(policy);
        cache.set(Namespace::Classrooms, "R1".into(), rooms_value("101"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(Namespace::Classrooms, "R1").is_none());
        assert_eq!(cache.stats().misses, 1);
        // Expired entry was dropped, not retained.
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn capacity_bound_evicts_oldest_first() {
        let policy = CachePolicy {
            max_entries: 2,
            ..Default::default()
        };
        let cache = ReadCache::new(policy);
        cache.set(Namespace::Classrooms, "a".into(), rooms_value("a"));
        cache.set(Namespace::Classrooms, "b".into(), rooms_value("b"));
        cache.set(Namespace::Classrooms, "c".into(), rooms_value("c"));
        assert_eq!(cache.stats().size, 2);
        assert!(cache.get(Namespace::Classrooms, "a").is_none());
        assert!(cache.get(Namespace::Classrooms, "b").is_some());
        assert!(cache.get(Namespace::Classrooms, "c").is_some());
    }

    #[test]
    fn hit_rate_reflects_lookups() {
        let cache = ReadCache::new(CachePolicy::default());
        cache.set(Namespace::Classrooms, "R1".into(), rooms_value("101"));
        cache.get(Namespace::Classrooms, "R1");
        cache.get(Namespace::Classrooms, "nope");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn clear_drops_everything_but_keeps_counters() {
        let cache = ReadCache::new(CachePolicy::default());
        cache.set(Namespace::Classrooms, "R1".into(), rooms_value("101"));
        cache.get(Namespace::Classrooms, "R1");
        cache.clear();
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn classroom_write_invalidates_related_views() {
        let cache = ReadCache::new(CachePolicy::default());
        cache.set(Namespace::Classrooms, "all".into(), rooms_value("101"));
        cache.set(Namespace::Bookings, "all".into(), CachedValue::Bookings(vec![]));
        cache.set(Namespace::Schedules, "2025-12-15".into(), CachedValue::Schedules(vec![]));
        cache.set(Namespace::BookingsByFaculty, "alice".into(), CachedValue::Bookings(vec![]));

        cache.invalidate_for(&ChangeEvent::ClassroomUpdated(room("101")));

        assert!(cache.get(Namespace::Classrooms, "all").is_none());
        assert!(cache.get(Namespace::Bookings, "all").is_none());
        assert!(cache.get(Namespace::Schedules, "2025-12-15").is_none());
        // A rename doesn't touch per-faculty request views.
        assert!(cache.get(Namespace::BookingsByFaculty, "alice").is_some());
    }
}

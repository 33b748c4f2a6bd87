// ── Cache metrics ───────────────────────────────────────────────

/// Counter: cache lookups that returned a live entry.
pub const CACHE_HITS_TOTAL: &str = "lectern_cache_hits_total";

/// Counter: cache lookups that missed or hit an expired entry.
pub const CACHE_MISSES_TOTAL: &str = "lectern_cache_misses_total";

/// Counter: entries evicted by the capacity bound.
pub const CACHE_EVICTIONS_TOTAL: &str = "lectern_cache_evictions_total";

// ── Engine metrics ──────────────────────────────────────────────

/// Counter: authoritative conflict checks performed.
pub const CONFLICT_CHECKS_TOTAL: &str = "lectern_conflict_checks_total";

/// Counter: conflict checks that found at least one overlap.
pub const CONFLICTS_DETECTED_TOTAL: &str = "lectern_conflicts_detected_total";

/// Counter: booking requests accepted into pending.
pub const REQUESTS_SUBMITTED_TOTAL: &str = "lectern_requests_submitted_total";

/// Counter: lapsed pending requests expired by the sweeper.
pub const REQUESTS_EXPIRED_TOTAL: &str = "lectern_requests_expired_total";

// ── Subscription metrics ────────────────────────────────────────

/// Gauge: live subscription sets (at most one per session).
pub const SUBSCRIPTIONS_ACTIVE: &str = "lectern_subscriptions_active";

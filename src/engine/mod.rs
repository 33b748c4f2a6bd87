//! The accept/reject gate. One `Engine` per running client, constructed with
//! its store, cache, and change hub — fresh per test, never ambient state.

mod conflict;
mod mutations;
mod queries;

pub use conflict::{Conflict, ConflictKind};
pub use mutations::{NewBookingRequest, NewClassroom, SubmittedRequest};

use std::sync::Arc;

use crate::cache::ReadCache;
use crate::config::{BookingPolicy, CachePolicy};
use crate::hub::ChangeHub;
use crate::model::ChangeEvent;
use crate::store::Store;

pub struct Engine<S: Store> {
    store: Arc<S>,
    cache: Arc<ReadCache>,
    hub: Arc<ChangeHub>,
    policy: BookingPolicy,
}

impl<S: Store> Engine<S> {
    pub fn new(store: Arc<S>, policy: BookingPolicy, cache_policy: CachePolicy) -> Self {
        Self {
            store,
            cache: Arc::new(ReadCache::new(cache_policy)),
            hub: Arc::new(ChangeHub::new()),
            policy,
        }
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Diagnostics surface for the read cache.
    pub fn cache(&self) -> &ReadCache {
        &self.cache
    }

    /// The live feed. Hand this to a `SubscriptionManager`.
    pub fn hub(&self) -> Arc<ChangeHub> {
        self.hub.clone()
    }

    /// Post-commit fan-out: invalidate affected cache entries, then push the
    /// authoritative update to subscribers. Runs after every write, in this
    /// order — the feed supersedes whatever the cache held.
    fn publish(&self, event: ChangeEvent) {
        self.cache.invalidate_for(&event);
        self.hub.send(event.collection(), &event);
    }
}

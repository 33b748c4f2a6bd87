//! Per-user live subscriptions on top of [`ChangeHub`], with guaranteed
//! teardown: registering a new set for a user replaces the old one, and
//! dropping the manager tears everything down. Without this, a user who
//! switches roles would keep the old role's listeners running and see
//! duplicate or out-of-scope events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::hub::ChangeHub;
use crate::model::{ChangeEvent, Collection};
use crate::observability;

/// What slice of the change feed a subscriber is entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sees every event.
    Admin,
    /// Sees classroom events plus only their own bookings and schedules.
    Faculty,
}

/// Delivered to `on_error` instead of silently dropping the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The subscriber fell behind; this many events were discarded.
    #[error("subscriber lagged, {0} events skipped")]
    Lagged(u64),

    /// The hub side went away; the stream is over.
    #[error("change stream closed")]
    Closed,
}

pub type EventCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(SubscriptionError) + Send + Sync>;

/// Callbacks for one subscription set. Unset collections are not subscribed
/// at all.
#[derive(Default, Clone)]
pub struct Listeners {
    pub on_classrooms: Option<EventCallback>,
    pub on_bookings: Option<EventCallback>,
    pub on_schedules: Option<EventCallback>,
    pub on_error: Option<ErrorCallback>,
}

/// The tasks backing one subscription set. Dropping it aborts them, which is
/// what makes teardown unconditional: replacement, explicit teardown, and
/// manager drop all go through here.
struct ActiveSet {
    id: u64,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for ActiveSet {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        metrics::gauge!(observability::SUBSCRIPTIONS_ACTIVE).decrement(1.0);
        debug!(set = self.id, "subscription set torn down");
    }
}

/// Manages a single user's live subscription set.
pub struct SubscriptionManager {
    hub: Arc<ChangeHub>,
    active: Mutex<Option<ActiveSet>>,
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub fn new(hub: Arc<ChangeHub>) -> Self {
        Self {
            hub,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscription set, replacing (and tearing down) any
    /// previous one. Returns the set's id.
    ///
    /// Receivers are taken synchronously, before this returns, so events
    /// published after `subscribe` are never missed even if the pump tasks
    /// have not been polled yet.
    pub fn subscribe(&self, role: Role, user_id: &str, listeners: Listeners) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let scope = match role {
            Role::Admin => None,
            Role::Faculty => Some(user_id.to_string()),
        };

        let mut tasks = Vec::new();
        let streams = [
            (Collection::Classrooms, listeners.on_classrooms),
            (Collection::Bookings, listeners.on_bookings),
            (Collection::Schedules, listeners.on_schedules),
        ];
        for (collection, callback) in streams {
            let Some(callback) = callback else { continue };
            let rx = self.hub.subscribe(collection);
            tasks.push(tokio::spawn(pump(
                rx,
                scope.clone(),
                callback,
                listeners.on_error.clone(),
            )));
        }

        let replaced = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(ActiveSet { id, tasks });
        drop(replaced);

        metrics::gauge!(observability::SUBSCRIPTIONS_ACTIVE).increment(1.0);
        debug!(set = id, ?role, user = user_id, "subscription set registered");
        id
    }

    /// Tear down the active set, if any. Idempotent.
    pub fn teardown_all(&self) {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    /// Id of the currently active set.
    pub fn active_id(&self) -> Option<u64> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|set| set.id)
    }
}

async fn pump(
    mut rx: broadcast::Receiver<ChangeEvent>,
    scope: Option<String>,
    on_event: EventCallback,
    on_error: Option<ErrorCallback>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                // Events that name a faculty are scoped; the rest (classroom
                // changes) go to everyone.
                if let Some(owner) = &scope {
                    if event.faculty_id().is_some_and(|f| f != owner) {
                        continue;
                    }
                }
                on_event(event);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                if let Some(cb) = &on_error {
                    cb(SubscriptionError::Lagged(skipped));
                }
            }
            Err(broadcast::error::RecvError::Closed) => {
                if let Some(cb) = &on_error {
                    cb(SubscriptionError::Closed);
                }
                break;
            }
        }
    }
}

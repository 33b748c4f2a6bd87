//! lectern — the reservation core behind a classroom booking app.
//!
//! Faculty submit booking requests for classrooms, admins approve or reject
//! them, and dashboards follow room availability live. This crate is the part
//! that has to be right: the conflict-detection and scheduling-validity
//! engine, a TTL read cache with relationship-aware invalidation, and the
//! subscription manager that fans out authoritative updates. UI, auth, and
//! the concrete persistence backend are collaborators behind the [`store::Store`]
//! trait.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod limits;
pub mod model;
pub mod observability;
pub mod store;
pub mod subs;
pub mod sweeper;
pub mod times;

pub use cache::{CacheStats, Namespace, ReadCache};
pub use config::{BookingPolicy, CachePolicy};
pub use engine::{Conflict, ConflictKind, Engine, NewBookingRequest, NewClassroom, SubmittedRequest};
pub use error::{ConflictError, EngineError, StoreError, ValidationError};
pub use model::{
    BookingRequest, ChangeEvent, Classroom, Collection, Minute, RequestStatus, Schedule,
    ScheduleStatus, TimeRange,
};
pub use store::{MemoryStore, Store};
pub use subs::{Listeners, Role, SubscriptionManager};

use thiserror::Error;
use ulid::Ulid;

use crate::engine::Conflict;

/// Input-shape failures. Returned as values to the caller so UI code can
/// render them; never logged as system faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed time: {0:?}")]
    MalformedTime(String),

    #[error("malformed date: {0:?}")]
    MalformedDate(String),

    #[error("end time must be after start time")]
    EndNotAfterStart,

    #[error("time is outside school hours")]
    OutsideSchoolHours,

    #[error("booking duration of {minutes} minutes is outside the allowed range")]
    UnreasonableDuration { minutes: u16 },

    #[error("booking time has already passed")]
    PastBookingTime,

    #[error("booking date is outside the allowed window")]
    DateOutOfRange,

    #[error("purpose too long: {0} characters")]
    PurposeTooLong(usize),

    #[error("name too long: {0} characters")]
    NameTooLong(usize),

    #[error("feedback too long: {0} characters")]
    FeedbackTooLong(usize),

    #[error("too many equipment tags: {0}")]
    TooManyEquipmentTags(usize),

    #[error("classroom is not offered for booking")]
    ClassroomUnavailable,

    #[error("feedback is required when rejecting a request")]
    MissingFeedback,

    #[error("a reason is required when cancelling a schedule")]
    MissingReason,
}

/// An overlapping entry was found at authoritative check time. Distinct from
/// [`ValidationError`]: this depends on mutable shared state, not on the
/// input's own shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("time slot conflicts with {n} existing booking(s)", n = conflicts.len())]
pub struct ConflictError {
    pub conflicts: Vec<Conflict>,
}

/// Transient backend failure. Retry policy belongs to the caller; every
/// operation in this crate is safely re-callable after one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record not found: {0}")]
    NotFound(Ulid),
}

/// Umbrella error for engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("not found: {0}")]
    NotFound(Ulid),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    /// Caller bug, not a runtime condition. Fails loudly instead of no-opping.
    #[error("invariant violation: {0}")]
    Invariant(&'static str),
}

impl EngineError {
    /// True for errors the caller may retry after backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Store(StoreError::Unavailable(_)))
    }
}

//! Hard input limits. Policy knobs live in [`crate::config`]; these are the
//! caps that hold regardless of configuration.

/// Booking purpose free text.
pub const MAX_PURPOSE_LEN: usize = 500;

/// Admin feedback on a rejection and cancellation reasons.
pub const MAX_FEEDBACK_LEN: usize = 500;

/// Classroom and building display names.
pub const MAX_NAME_LEN: usize = 120;

/// Equipment tags per classroom.
pub const MAX_EQUIPMENT_TAGS: usize = 32;

/// Minutes in a day — upper bound for any time-of-day value.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::Namespace;
use crate::model::Minute;

/// Scheduling-validity knobs. Defaults carry the school-domain constants;
/// everything takes the policy by reference so tests can tighten or loosen
/// individual bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPolicy {
    pub slot_granularity_minutes: u16,
    pub school_hours_start: Minute,
    pub school_hours_end: Minute,
    pub min_duration_minutes: u16,
    pub max_duration_minutes: u16,
    pub max_advance_booking_months: u32,
    /// Forward slack when deciding "is this in the past", so a request
    /// submitted seconds before its own start isn't rejected by clock skew.
    pub past_booking_buffer_minutes: u16,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            slot_granularity_minutes: 30,
            school_hours_start: Minute::from_hm(7, 0),
            school_hours_end: Minute::from_hm(20, 0),
            min_duration_minutes: 30,
            max_duration_minutes: 8 * 60,
            max_advance_booking_months: 2,
            past_booking_buffer_minutes: 5,
        }
    }
}

/// Per-namespace TTL table plus the capacity bound. Frequently-mutated
/// collections get short TTLs; near-static data keeps longer ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub max_entries: usize,
    pub classrooms_ttl: Duration,
    pub bookings_ttl: Duration,
    pub schedules_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_entries: 256,
            classrooms_ttl: Duration::from_secs(15 * 60),
            bookings_ttl: Duration::from_secs(2 * 60),
            schedules_ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl CachePolicy {
    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        match namespace {
            Namespace::Classrooms => self.classrooms_ttl,
            Namespace::Bookings | Namespace::BookingsByFaculty => self.bookings_ttl,
            Namespace::Schedules => self.schedules_ttl,
        }
    }
}

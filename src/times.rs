//! Pure time and validity predicates. Everything that needs "now" takes it as
//! a parameter; the `local_*` helpers are the production clock.

use chrono::{Duration, Months, NaiveDate, NaiveDateTime};

use crate::config::BookingPolicy;
use crate::error::ValidationError;
use crate::model::{Minute, TimeRange};

/// Generate the fixed slot grid spanning school hours, both bounds inclusive.
/// Deterministic — same sequence on every call.
pub fn generate_time_slots(policy: &BookingPolicy) -> Vec<Minute> {
    let step = policy.slot_granularity_minutes.max(1);
    let mut slots = Vec::new();
    let mut t = policy.school_hours_start;
    while t <= policy.school_hours_end {
        slots.push(t);
        match t.checked_add(step) {
            Some(next) => t = next,
            None => break,
        }
    }
    slots
}

/// Time falls within school hours, inclusive at both bounds.
pub fn is_valid_school_time(policy: &BookingPolicy, t: Minute) -> bool {
    policy.school_hours_start <= t && t <= policy.school_hours_end
}

/// True if the slot starts less than the configured buffer ahead of `now`.
pub fn is_past_booking_time(
    policy: &BookingPolicy,
    date: NaiveDate,
    start: Minute,
    now: NaiveDateTime,
) -> bool {
    let start_at = start.on_date(date);
    start_at < now + Duration::minutes(policy.past_booking_buffer_minutes as i64)
}

/// Duration must lie within the configured bounds, inclusive.
pub fn is_reasonable_duration(policy: &BookingPolicy, range: TimeRange) -> bool {
    let minutes = range.duration_minutes();
    policy.min_duration_minutes <= minutes && minutes <= policy.max_duration_minutes
}

/// Slots strictly after `start` — never a same-time or earlier end option.
pub fn valid_end_times(start: Minute, slots: &[Minute]) -> Vec<Minute> {
    slots.iter().copied().filter(|&s| s > start).collect()
}

/// Parse an ISO `YYYY-MM-DD` date. Only component-true dates pass: Feb 30 and
/// Apr 31 are rejected rather than rolled over.
pub fn parse_iso_date(s: &str) -> Result<NaiveDate, ValidationError> {
    // chrono's %m/%d accept unpadded digits; require the strict 10-char form.
    if s.len() != 10 {
        return Err(ValidationError::MalformedDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ValidationError::MalformedDate(s.to_string()))
}

/// Booking date must be between `today` and `today` plus the advance window,
/// both inclusive. Both bounds are local-calendar values — using UTC here is
/// the classic off-by-one.
pub fn booking_date_in_range(policy: &BookingPolicy, date: NaiveDate, today: NaiveDate) -> bool {
    if date < today {
        return false;
    }
    match today.checked_add_months(Months::new(policy.max_advance_booking_months)) {
        Some(limit) => date <= limit,
        None => false,
    }
}

pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Minute {
        Minute::parse_24h(s).unwrap()
    }

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::new(m(start), m(end)).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        parse_iso_date(s).unwrap()
    }

    #[test]
    fn slot_grid_is_fixed_and_ordered() {
        let policy = BookingPolicy::default();
        let slots = generate_time_slots(&policy);
        assert_eq!(slots.first().copied(), Some(m("07:00")));
        assert_eq!(slots.last().copied(), Some(m("20:00")));
        // 07:00..=20:00 at 30-minute steps
        assert_eq!(slots.len(), 27);
        assert!(slots.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(slots, generate_time_slots(&policy));
    }

    #[test]
    fn slot_grid_respects_granularity() {
        let policy = BookingPolicy {
            slot_granularity_minutes: 15,
            ..Default::default()
        };
        let slots = generate_time_slots(&policy);
        assert_eq!(slots.len(), 53);
        assert_eq!(slots[1], m("07:15"));
    }

    #[test]
    fn school_hours_boundaries() {
        let policy = BookingPolicy::default();
        assert!(is_valid_school_time(&policy, Minute::parse_12h("7:00 AM").unwrap()));
        assert!(!is_valid_school_time(&policy, Minute::parse_12h("6:59 AM").unwrap()));
        assert!(is_valid_school_time(&policy, Minute::parse_12h("8:00 PM").unwrap()));
        assert!(!is_valid_school_time(&policy, Minute::parse_12h("8:01 PM").unwrap()));
    }

    #[test]
    fn duration_bounds_inclusive() {
        let policy = BookingPolicy::default();
        let from_12h = |s: &str, e: &str| {
            TimeRange::new(Minute::parse_12h(s).unwrap(), Minute::parse_12h(e).unwrap()).unwrap()
        };
        assert!(!is_reasonable_duration(&policy, from_12h("9:00 AM", "9:29 AM")));
        assert!(is_reasonable_duration(&policy, from_12h("9:00 AM", "9:30 AM")));
        assert!(is_reasonable_duration(&policy, from_12h("9:00 AM", "5:00 PM")));
        assert!(!is_reasonable_duration(&policy, from_12h("9:00 AM", "5:01 PM")));
    }

    #[test]
    fn past_time_respects_buffer() {
        let policy = BookingPolicy::default();
        let now = date("2025-12-15").and_hms_opt(9, 0, 0).unwrap();
        // Starts 4 minutes from now — inside the 5-minute buffer, counts as past.
        assert!(is_past_booking_time(&policy, date("2025-12-15"), m("09:04"), now));
        // Starts 6 minutes out — fine.
        assert!(!is_past_booking_time(&policy, date("2025-12-15"), m("09:06"), now));
        assert!(is_past_booking_time(&policy, date("2025-12-14"), m("20:00"), now));
        assert!(!is_past_booking_time(&policy, date("2025-12-16"), m("07:00"), now));
    }

    #[test]
    fn end_times_strictly_after_start() {
        let policy = BookingPolicy::default();
        let slots = generate_time_slots(&policy);
        let ends = valid_end_times(m("19:00"), &slots);
        assert_eq!(ends, vec![m("19:30"), m("20:00")]);
        assert!(valid_end_times(m("20:00"), &slots).is_empty());
    }

    #[test]
    fn iso_date_rejects_rollover() {
        assert!(parse_iso_date("2025-02-30").is_err());
        assert!(parse_iso_date("2025-04-31").is_err());
        assert!(parse_iso_date("2025-13-01").is_err());
        assert!(parse_iso_date("2025-2-28").is_err()); // not zero-padded ISO
        assert!(parse_iso_date("2025-02-28").is_ok());
        assert!(parse_iso_date("2024-02-29").is_ok()); // leap year
        assert!(parse_iso_date("2025-02-29").is_err());
    }

    #[test]
    fn date_range_two_month_window() {
        let policy = BookingPolicy::default();
        let today = date("2025-12-15");
        assert!(booking_date_in_range(&policy, today, today));
        assert!(booking_date_in_range(&policy, date("2026-02-15"), today));
        assert!(!booking_date_in_range(&policy, date("2026-02-16"), today));
        assert!(!booking_date_in_range(&policy, date("2025-12-14"), today));
    }

    #[test]
    fn date_range_clamps_short_months() {
        let policy = BookingPolicy::default();
        // Dec 31 + 2 months clamps to Feb 28/29.
        let today = date("2025-12-31");
        assert!(booking_date_in_range(&policy, date("2026-02-28"), today));
        assert!(!booking_date_in_range(&policy, date("2026-03-01"), today));
    }
}

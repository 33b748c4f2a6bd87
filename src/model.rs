use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::ValidationError;
use crate::limits::MINUTES_PER_DAY;

/// Minutes since local midnight — the only time-of-day type.
///
/// Ordering matches lexicographic ordering of the zero-padded `HH:MM`
/// rendering, so comparisons done on either representation agree.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Minute(u16);

impl Minute {
    /// Panics if the components don't name a real time of day. For literals.
    pub const fn from_hm(hour: u16, minute: u16) -> Self {
        assert!(hour < 24 && minute < 60);
        Self(hour * 60 + minute)
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    pub fn minutes_from_midnight(self) -> u16 {
        self.0
    }

    pub fn checked_add(self, minutes: u16) -> Option<Self> {
        let total = self.0.checked_add(minutes)?;
        if total < MINUTES_PER_DAY {
            Some(Self(total))
        } else {
            None
        }
    }

    /// Parse 24-hour `HH:MM`. Rejects anything else — malformed input must
    /// fail cleanly, never silently corrupt.
    pub fn parse_24h(s: &str) -> Result<Self, ValidationError> {
        let malformed = || ValidationError::MalformedTime(s.to_string());
        let (h, m) = s.split_once(':').ok_or_else(malformed)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(malformed());
        }
        let hour: u16 = h.parse().map_err(|_| malformed())?;
        let minute: u16 = m.parse().map_err(|_| malformed())?;
        if hour >= 24 || minute >= 60 {
            return Err(malformed());
        }
        Ok(Self(hour * 60 + minute))
    }

    /// Parse 12-hour `h:mm AM/PM` (case-insensitive).
    pub fn parse_12h(s: &str) -> Result<Self, ValidationError> {
        let malformed = || ValidationError::MalformedTime(s.to_string());
        let (time, meridiem) = s.trim().split_once(' ').ok_or_else(malformed)?;
        let pm = match meridiem.to_ascii_uppercase().as_str() {
            "AM" => false,
            "PM" => true,
            _ => return Err(malformed()),
        };
        let (h, m) = time.split_once(':').ok_or_else(malformed)?;
        let hour: u16 = h.parse().map_err(|_| malformed())?;
        let minute: u16 = m.parse().map_err(|_| malformed())?;
        if hour == 0 || hour > 12 || minute >= 60 || m.len() != 2 {
            return Err(malformed());
        }
        let hour24 = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, false) => h,
            (h, true) => h + 12,
        };
        Ok(Self(hour24 * 60 + minute))
    }

    /// Render as `h:mm AM/PM`.
    pub fn to_12h_string(self) -> String {
        let (hour, minute) = (self.hour(), self.minute());
        let meridiem = if hour < 12 { "AM" } else { "PM" };
        let display_hour = match hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{display_hour}:{minute:02} {meridiem}")
    }

    /// Combine with a calendar date into a wall-clock instant.
    pub fn on_date(self, date: NaiveDate) -> NaiveDateTime {
        date.and_hms_opt(self.hour() as u32, self.minute() as u32, 0)
            .expect("minute-of-day is always a valid wall-clock time")
    }
}

impl fmt::Display for Minute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl fmt::Debug for Minute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Minute({self})")
    }
}

impl FromStr for Minute {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_24h(s)
    }
}

/// Half-open interval `[start, end)` within one calendar day.
///
/// `overlaps` is the single overlap implementation in the crate — every
/// conflict check composes it rather than re-deriving the inequality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    start: Minute,
    end: Minute,
}

impl TimeRange {
    pub fn new(start: Minute, end: Minute) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::EndNotAfterStart);
        }
        Ok(Self { start, end })
    }

    pub fn start(self) -> Minute {
        self.start
    }

    pub fn end(self) -> Minute {
        self.end
    }

    pub fn duration_minutes(self) -> u16 {
        self.end.0 - self.start.0
    }

    /// Two half-open intervals sharing only a boundary do not overlap.
    pub fn overlaps(self, other: TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Does the instant fall inside this range? Its own predicate — not a
    /// degenerate-width reuse of `overlaps`, which can never match a
    /// zero-width probe against itself.
    pub fn contains_instant(self, t: Minute) -> bool {
        self.start <= t && t < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Lifecycle of a booking request. Transitions not in the table are rejected
/// at the engine boundary; nothing ever moves back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl RequestStatus {
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (
                RequestStatus::Pending,
                RequestStatus::Approved | RequestStatus::Rejected | RequestStatus::Expired
            )
        )
    }

    pub fn is_terminal(self) -> bool {
        self != RequestStatus::Pending
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Confirmed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn can_transition_to(self, next: ScheduleStatus) -> bool {
        matches!(
            (self, next),
            (ScheduleStatus::Confirmed, ScheduleStatus::Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleStatus::Confirmed => "confirmed",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classroom {
    pub id: Ulid,
    pub name: String,
    pub capacity: u32,
    pub equipment: BTreeSet<String>,
    pub building: String,
    pub floor: i32,
    /// Whether the room is offered at all, independent of scheduling.
    pub is_available: bool,
}

/// Partial classroom update — `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassroomPatch {
    pub name: Option<String>,
    pub capacity: Option<u32>,
    pub equipment: Option<BTreeSet<String>>,
    pub building: Option<String>,
    pub floor: Option<i32>,
    pub is_available: Option<bool>,
}

impl ClassroomPatch {
    pub fn apply(&self, room: &mut Classroom) {
        if let Some(name) = &self.name {
            room.name = name.clone();
        }
        if let Some(capacity) = self.capacity {
            room.capacity = capacity;
        }
        if let Some(equipment) = &self.equipment {
            room.equipment = equipment.clone();
        }
        if let Some(building) = &self.building {
            room.building = building.clone();
        }
        if let Some(floor) = self.floor {
            room.floor = floor;
        }
        if let Some(is_available) = self.is_available {
            room.is_available = is_available;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: Ulid,
    /// External identity of the requester (opaque to this crate).
    pub faculty_id: String,
    pub faculty_name: String,
    pub classroom_id: Ulid,
    /// Denormalized at creation so the record stays displayable if the room
    /// is later renamed or deleted.
    pub classroom_name: String,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub purpose: String,
    pub status: RequestStatus,
    pub requested_at: NaiveDateTime,
    pub admin_feedback: Option<String>,
}

/// The confirmed-booking projection, created when a request is approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Ulid,
    /// The request this schedule was approved from.
    pub request_id: Ulid,
    pub classroom_id: Ulid,
    pub classroom_name: String,
    pub faculty_id: String,
    pub faculty_name: String,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub purpose: String,
    pub status: ScheduleStatus,
    pub cancel_reason: Option<String>,
}

/// The entity collections a client can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Classrooms,
    Bookings,
    Schedules,
}

/// Every mutation the engine performs — flat, no nesting. Drives both cache
/// invalidation and the change hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    ClassroomCreated(Classroom),
    ClassroomUpdated(Classroom),
    ClassroomDeleted { id: Ulid },
    RequestSubmitted(BookingRequest),
    RequestApproved(BookingRequest),
    RequestRejected(BookingRequest),
    RequestExpired(BookingRequest),
    ScheduleCreated(Schedule),
    ScheduleCancelled(Schedule),
}

impl ChangeEvent {
    pub fn collection(&self) -> Collection {
        match self {
            ChangeEvent::ClassroomCreated(_)
            | ChangeEvent::ClassroomUpdated(_)
            | ChangeEvent::ClassroomDeleted { .. } => Collection::Classrooms,
            ChangeEvent::RequestSubmitted(_)
            | ChangeEvent::RequestApproved(_)
            | ChangeEvent::RequestRejected(_)
            | ChangeEvent::RequestExpired(_) => Collection::Bookings,
            ChangeEvent::ScheduleCreated(_) | ChangeEvent::ScheduleCancelled(_) => {
                Collection::Schedules
            }
        }
    }

    /// Identity the event concerns, where one exists. Used for role-scoped
    /// stream filtering.
    pub fn faculty_id(&self) -> Option<&str> {
        match self {
            ChangeEvent::RequestSubmitted(r)
            | ChangeEvent::RequestApproved(r)
            | ChangeEvent::RequestRejected(r)
            | ChangeEvent::RequestExpired(r) => Some(&r.faculty_id),
            ChangeEvent::ScheduleCreated(s) | ChangeEvent::ScheduleCancelled(s) => {
                Some(&s.faculty_id)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_display_zero_padded() {
        assert_eq!(Minute::from_hm(7, 0).to_string(), "07:00");
        assert_eq!(Minute::from_hm(13, 5).to_string(), "13:05");
    }

    #[test]
    fn minute_parse_24h() {
        assert_eq!(Minute::parse_24h("09:30").unwrap(), Minute::from_hm(9, 30));
        assert_eq!(Minute::parse_24h("7:00").unwrap(), Minute::from_hm(7, 0));
        assert_eq!(Minute::parse_24h("00:00").unwrap(), Minute::from_hm(0, 0));
        assert_eq!(Minute::parse_24h("23:59").unwrap(), Minute::from_hm(23, 59));
    }

    #[test]
    fn minute_parse_24h_rejects_garbage() {
        for bad in ["24:00", "12:60", "12", "12:5", "ab:cd", "", "12:345", ":30"] {
            assert!(Minute::parse_24h(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn minute_parse_12h() {
        assert_eq!(Minute::parse_12h("9:30 AM").unwrap(), Minute::from_hm(9, 30));
        assert_eq!(Minute::parse_12h("12:00 AM").unwrap(), Minute::from_hm(0, 0));
        assert_eq!(Minute::parse_12h("12:00 PM").unwrap(), Minute::from_hm(12, 0));
        assert_eq!(Minute::parse_12h("8:01 pm").unwrap(), Minute::from_hm(20, 1));
    }

    #[test]
    fn minute_parse_12h_rejects_garbage() {
        for bad in ["0:30 AM", "13:00 PM", "9:30", "9:30 XM", "9:60 AM"] {
            assert!(Minute::parse_12h(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn minute_12h_round_trip() {
        for raw in ["00:00", "07:00", "11:59", "12:00", "12:30", "19:45", "23:00"] {
            let m = Minute::parse_24h(raw).unwrap();
            assert_eq!(Minute::parse_12h(&m.to_12h_string()).unwrap(), m);
        }
    }

    #[test]
    fn minute_ordering_matches_lexicographic() {
        let a = Minute::parse_24h("09:00").unwrap();
        let b = Minute::parse_24h("10:30").unwrap();
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn minute_checked_add_caps_at_midnight() {
        assert_eq!(
            Minute::from_hm(9, 0).checked_add(30),
            Some(Minute::from_hm(9, 30))
        );
        assert_eq!(Minute::from_hm(23, 45).checked_add(30), None);
    }

    #[test]
    fn range_rejects_inverted_and_empty() {
        let nine = Minute::from_hm(9, 0);
        let ten = Minute::from_hm(10, 0);
        assert!(TimeRange::new(ten, nine).is_err());
        assert!(TimeRange::new(nine, nine).is_err());
        assert!(TimeRange::new(nine, ten).is_ok());
    }

    #[test]
    fn range_overlap_symmetry() {
        let a = TimeRange::new(Minute::from_hm(9, 0), Minute::from_hm(10, 0)).unwrap();
        let b = TimeRange::new(Minute::from_hm(9, 30), Minute::from_hm(10, 30)).unwrap();
        let c = TimeRange::new(Minute::from_hm(11, 0), Minute::from_hm(12, 0)).unwrap();
        assert_eq!(a.overlaps(b), b.overlaps(a));
        assert_eq!(a.overlaps(c), c.overlaps(a));
        assert!(a.overlaps(b));
        assert!(!a.overlaps(c));
    }

    #[test]
    fn range_touching_boundary_not_overlapping() {
        let a = TimeRange::new(Minute::from_hm(9, 0), Minute::from_hm(10, 0)).unwrap();
        let b = TimeRange::new(Minute::from_hm(10, 0), Minute::from_hm(11, 0)).unwrap();
        assert!(!a.overlaps(b));
        assert!(!b.overlaps(a));
    }

    #[test]
    fn range_contains_instant_half_open() {
        let r = TimeRange::new(Minute::from_hm(9, 0), Minute::from_hm(10, 0)).unwrap();
        assert!(r.contains_instant(Minute::from_hm(9, 0)));
        assert!(r.contains_instant(Minute::from_hm(9, 59)));
        assert!(!r.contains_instant(Minute::from_hm(10, 0)));
        assert!(!r.contains_instant(Minute::from_hm(8, 59)));
    }

    #[test]
    fn request_status_transitions() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Expired));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Expired.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn schedule_status_transitions() {
        use ScheduleStatus::*;
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Confirmed));
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut room = Classroom {
            id: Ulid::new(),
            name: "Room 101".into(),
            capacity: 40,
            equipment: BTreeSet::from(["projector".to_string()]),
            building: "Main".into(),
            floor: 1,
            is_available: true,
        };
        let patch = ClassroomPatch {
            capacity: Some(50),
            is_available: Some(false),
            ..Default::default()
        };
        patch.apply(&mut room);
        assert_eq!(room.capacity, 50);
        assert!(!room.is_available);
        assert_eq!(room.name, "Room 101");
        assert_eq!(room.floor, 1);
    }

    #[test]
    fn event_collection_mapping() {
        let id = Ulid::new();
        assert_eq!(
            ChangeEvent::ClassroomDeleted { id }.collection(),
            Collection::Classrooms
        );
    }
}

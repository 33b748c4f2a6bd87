use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::EngineError;
use crate::model::{RequestStatus, ScheduleStatus, TimeRange};
use crate::observability;
use crate::store::Store;
use crate::times;

use super::Engine;

/// How hard the block is. Confirmed entries are hard blocks; a pending
/// request is a soft warning — someone else asked first but no admin has
/// resolved it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    Confirmed,
    Pending,
}

/// One overlapping entry, described well enough for a UI badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub entry_id: Ulid,
    pub kind: ConflictKind,
    pub range: TimeRange,
    pub holder: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            ConflictKind::Confirmed => "Reserved",
            ConflictKind::Pending => "Pending",
        };
        write!(f, "{label} {} by {}", self.range, self.holder)
    }
}

impl<S: Store> Engine<S> {
    /// Authoritative conflict scan for a classroom + date + range.
    ///
    /// Always reads the store directly — cached conflict data is a hint, not
    /// an answer. Call sites that showed an earlier "available" preview must
    /// call this again immediately before committing; that re-check is what
    /// keeps the check-to-write race window as small as we can make it
    /// without transactions.
    ///
    /// `exclude` skips one entry id so a record being edited doesn't
    /// conflict with itself; it matches a schedule's originating request
    /// too. Classroom existence is the caller's problem.
    ///
    /// Only pending requests are scanned: an approved request's authority
    /// lives in the confirmed schedule created at approval, so counting
    /// both would report one booking twice — and would keep blocking the
    /// slot after that schedule is cancelled.
    pub async fn check_conflicts(
        &self,
        classroom_id: Ulid,
        date: NaiveDate,
        range: TimeRange,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Conflict>, EngineError> {
        metrics::counter!(observability::CONFLICT_CHECKS_TOTAL).increment(1);

        let schedules = self
            .store
            .schedules_for(classroom_id, date, &[ScheduleStatus::Confirmed])
            .await?;
        let requests = self
            .store
            .requests_for(classroom_id, date, &[RequestStatus::Pending])
            .await?;

        let mut conflicts = Vec::new();
        for schedule in schedules {
            if exclude == Some(schedule.id) || exclude == Some(schedule.request_id) {
                continue;
            }
            if schedule.range.overlaps(range) {
                conflicts.push(Conflict {
                    entry_id: schedule.id,
                    kind: ConflictKind::Confirmed,
                    range: schedule.range,
                    holder: schedule.faculty_name,
                });
            }
        }
        for request in requests {
            if exclude == Some(request.id) {
                continue;
            }
            if request.range.overlaps(range) {
                conflicts.push(Conflict {
                    entry_id: request.id,
                    kind: ConflictKind::Pending,
                    range: request.range,
                    holder: request.faculty_name,
                });
            }
        }

        if !conflicts.is_empty() {
            metrics::counter!(observability::CONFLICTS_DETECTED_TOTAL).increment(1);
        }
        Ok(conflicts)
    }

    /// Boolean accept/reject probe. With `include_past_check`, a range whose
    /// start has already passed (per the policy buffer) counts as conflicting.
    pub async fn has_conflict(
        &self,
        classroom_id: Ulid,
        date: NaiveDate,
        range: TimeRange,
        include_past_check: bool,
        exclude: Option<Ulid>,
        now: NaiveDateTime,
    ) -> Result<bool, EngineError> {
        if include_past_check && times::is_past_booking_time(&self.policy, date, range.start(), now)
        {
            return Ok(true);
        }
        Ok(!self
            .check_conflicts(classroom_id, date, range, exclude)
            .await?
            .is_empty())
    }
}

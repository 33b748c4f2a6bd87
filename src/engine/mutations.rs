use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;
use ulid::Ulid;

use crate::error::{ConflictError, EngineError, ValidationError};
use crate::limits::{MAX_EQUIPMENT_TAGS, MAX_FEEDBACK_LEN, MAX_NAME_LEN, MAX_PURPOSE_LEN};
use crate::model::{
    BookingRequest, ChangeEvent, Classroom, ClassroomPatch, Minute, RequestStatus, Schedule,
    ScheduleStatus, TimeRange,
};
use crate::observability;
use crate::store::Store;
use crate::times;

use super::conflict::{Conflict, ConflictKind};
use super::Engine;

/// A booking intent, before validation.
#[derive(Debug, Clone)]
pub struct NewBookingRequest {
    pub faculty_id: String,
    pub faculty_name: String,
    pub classroom_id: Ulid,
    pub date: NaiveDate,
    pub start: Minute,
    pub end: Minute,
    pub purpose: String,
}

/// An accepted submission. `warnings` lists unresolved pending requests that
/// overlap — another faculty asked first, but that's an admin's call, not a
/// block.
#[derive(Debug, Clone)]
pub struct SubmittedRequest {
    pub request: BookingRequest,
    pub warnings: Vec<Conflict>,
}

#[derive(Debug, Clone)]
pub struct NewClassroom {
    pub name: String,
    pub capacity: u32,
    pub equipment: BTreeSet<String>,
    pub building: String,
    pub floor: i32,
    pub is_available: bool,
}

impl<S: Store> Engine<S> {
    /// Submit a booking request. The sequence is fixed: field validation,
    /// then the validity predicates, then the authoritative conflict
    /// re-check, then the write, then invalidation and fan-out. Skipping the
    /// re-check in favor of an earlier preview is the bug this crate exists
    /// to prevent.
    pub async fn submit_request(
        &self,
        new: NewBookingRequest,
        now: NaiveDateTime,
    ) -> Result<SubmittedRequest, EngineError> {
        // 1. Field validation.
        if new.purpose.chars().count() > MAX_PURPOSE_LEN {
            return Err(ValidationError::PurposeTooLong(new.purpose.chars().count()).into());
        }
        let range = TimeRange::new(new.start, new.end)?;

        // 2. Validity predicates.
        if !times::is_valid_school_time(&self.policy, new.start)
            || !times::is_valid_school_time(&self.policy, new.end)
        {
            return Err(ValidationError::OutsideSchoolHours.into());
        }
        if !times::is_reasonable_duration(&self.policy, range) {
            return Err(ValidationError::UnreasonableDuration {
                minutes: range.duration_minutes(),
            }
            .into());
        }
        if !times::booking_date_in_range(&self.policy, new.date, now.date()) {
            return Err(ValidationError::DateOutOfRange.into());
        }
        if times::is_past_booking_time(&self.policy, new.date, new.start, now) {
            return Err(ValidationError::PastBookingTime.into());
        }

        let room = self
            .store
            .get_classroom(new.classroom_id)
            .await?
            .ok_or(EngineError::NotFound(new.classroom_id))?;
        if !room.is_available {
            return Err(ValidationError::ClassroomUnavailable.into());
        }

        // 3. Authoritative conflict re-check, immediately before the write.
        let conflicts = self
            .check_conflicts(new.classroom_id, new.date, range, None)
            .await?;
        let (hard, soft): (Vec<_>, Vec<_>) = conflicts
            .into_iter()
            .partition(|c| c.kind == ConflictKind::Confirmed);
        if !hard.is_empty() {
            return Err(ConflictError { conflicts: hard }.into());
        }

        // 4. Write.
        let request = BookingRequest {
            id: Ulid::new(),
            faculty_id: new.faculty_id,
            faculty_name: new.faculty_name,
            classroom_id: room.id,
            classroom_name: room.name,
            date: new.date,
            range,
            purpose: new.purpose,
            status: RequestStatus::Pending,
            requested_at: now,
            admin_feedback: None,
        };
        self.store.insert_request(request.clone()).await?;

        // 5. Invalidate + fan out.
        info!(
            request = %request.id,
            room = %request.classroom_name,
            date = %request.date,
            range = %request.range,
            "booking request submitted"
        );
        metrics::counter!(observability::REQUESTS_SUBMITTED_TOTAL).increment(1);
        self.publish(ChangeEvent::RequestSubmitted(request.clone()));

        Ok(SubmittedRequest {
            request,
            warnings: soft,
        })
    }

    /// Approve a pending request: re-check conflicts (excluding the request
    /// itself), create the confirmed schedule, then transition the request.
    pub async fn approve_request(&self, id: Ulid) -> Result<Schedule, EngineError> {
        let mut request = self
            .store
            .get_request(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if !request.status.can_transition_to(RequestStatus::Approved) {
            return Err(EngineError::InvalidTransition {
                from: request.status.as_str(),
                to: RequestStatus::Approved.as_str(),
            });
        }

        // Another request may have been approved since this one was listed.
        let conflicts = self
            .check_conflicts(request.classroom_id, request.date, request.range, Some(id))
            .await?;
        let hard: Vec<_> = conflicts
            .into_iter()
            .filter(|c| c.kind == ConflictKind::Confirmed)
            .collect();
        if !hard.is_empty() {
            return Err(ConflictError { conflicts: hard }.into());
        }

        // Schedule first, status second. If the store fails between the two
        // writes the request is still pending, and the retry picks up the
        // schedule from the first attempt instead of inserting a duplicate.
        let existing = self
            .store
            .schedules_for(request.classroom_id, request.date, &[ScheduleStatus::Confirmed])
            .await?
            .into_iter()
            .find(|s| s.request_id == id);
        let schedule = match existing {
            Some(schedule) => schedule,
            None => {
                let schedule = Schedule {
                    id: Ulid::new(),
                    request_id: id,
                    classroom_id: request.classroom_id,
                    classroom_name: request.classroom_name.clone(),
                    faculty_id: request.faculty_id.clone(),
                    faculty_name: request.faculty_name.clone(),
                    date: request.date,
                    range: request.range,
                    purpose: request.purpose.clone(),
                    status: ScheduleStatus::Confirmed,
                    cancel_reason: None,
                };
                self.store.insert_schedule(schedule.clone()).await?;
                schedule
            }
        };

        request.status = RequestStatus::Approved;
        self.store.update_request(request.clone()).await?;

        info!(request = %id, schedule = %schedule.id, "request approved");
        self.publish(ChangeEvent::RequestApproved(request));
        self.publish(ChangeEvent::ScheduleCreated(schedule.clone()));
        Ok(schedule)
    }

    /// Reject a pending request. Feedback is mandatory — the requester needs
    /// to know which way to adjust.
    pub async fn reject_request(&self, id: Ulid, feedback: &str) -> Result<(), EngineError> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(ValidationError::MissingFeedback.into());
        }
        if feedback.chars().count() > MAX_FEEDBACK_LEN {
            return Err(ValidationError::FeedbackTooLong(feedback.chars().count()).into());
        }

        let mut request = self
            .store
            .get_request(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if !request.status.can_transition_to(RequestStatus::Rejected) {
            return Err(EngineError::InvalidTransition {
                from: request.status.as_str(),
                to: RequestStatus::Rejected.as_str(),
            });
        }

        request.status = RequestStatus::Rejected;
        request.admin_feedback = Some(feedback.to_string());
        self.store.update_request(request.clone()).await?;

        info!(request = %id, "request rejected");
        self.publish(ChangeEvent::RequestRejected(request));
        Ok(())
    }

    /// Cancel a confirmed schedule. Admin action; reason mandatory. The
    /// original request stays `approved` — cancellation is a schedule-level
    /// transition.
    pub async fn cancel_schedule(&self, id: Ulid, reason: &str) -> Result<(), EngineError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::MissingReason.into());
        }

        let mut schedule = self
            .store
            .get_schedule(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if !schedule.status.can_transition_to(ScheduleStatus::Cancelled) {
            return Err(EngineError::InvalidTransition {
                from: schedule.status.as_str(),
                to: ScheduleStatus::Cancelled.as_str(),
            });
        }

        schedule.status = ScheduleStatus::Cancelled;
        schedule.cancel_reason = Some(reason.to_string());
        self.store.update_schedule(schedule.clone()).await?;

        info!(schedule = %id, "schedule cancelled");
        self.publish(ChangeEvent::ScheduleCancelled(schedule));
        Ok(())
    }

    /// Sweep: move pending requests whose start time has passed to
    /// `expired`. Clients never set this terminal state themselves.
    pub async fn expire_lapsed_requests(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<Ulid>, EngineError> {
        let mut expired = Vec::new();
        for mut request in self.store.list_requests().await? {
            if request.status != RequestStatus::Pending {
                continue;
            }
            if request.range.start().on_date(request.date) > now {
                continue;
            }
            request.status = RequestStatus::Expired;
            self.store.update_request(request.clone()).await?;
            metrics::counter!(observability::REQUESTS_EXPIRED_TOTAL).increment(1);
            expired.push(request.id);
            self.publish(ChangeEvent::RequestExpired(request));
        }
        Ok(expired)
    }

    // ── Classroom administration ───────────────────────────────

    pub async fn create_classroom(&self, new: NewClassroom) -> Result<Classroom, EngineError> {
        validate_classroom_fields(&new.name, &new.building, &new.equipment)?;
        let room = Classroom {
            id: Ulid::new(),
            name: new.name,
            capacity: new.capacity,
            equipment: new.equipment,
            building: new.building,
            floor: new.floor,
            is_available: new.is_available,
        };
        self.store.put_classroom(room.clone()).await?;
        info!(room = %room.id, name = %room.name, "classroom created");
        self.publish(ChangeEvent::ClassroomCreated(room.clone()));
        Ok(room)
    }

    pub async fn update_classroom(
        &self,
        id: Ulid,
        patch: ClassroomPatch,
    ) -> Result<Classroom, EngineError> {
        let mut room = self
            .store
            .get_classroom(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        patch.apply(&mut room);
        validate_classroom_fields(&room.name, &room.building, &room.equipment)?;
        self.store.put_classroom(room.clone()).await?;
        self.publish(ChangeEvent::ClassroomUpdated(room.clone()));
        Ok(room)
    }

    /// Delete a classroom, cascading to its pending requests and confirmed
    /// schedules. Lapsed records keep their terminal status for history.
    pub async fn delete_classroom(&self, id: Ulid) -> Result<(), EngineError> {
        if self.store.get_classroom(id).await?.is_none() {
            return Err(EngineError::NotFound(id));
        }
        let requests = self.store.delete_pending_requests_for_classroom(id).await?;
        let schedules = self
            .store
            .delete_confirmed_schedules_for_classroom(id)
            .await?;
        self.store.delete_classroom(id).await?;
        info!(
            room = %id,
            requests = requests.len(),
            schedules = schedules.len(),
            "classroom deleted with cascade"
        );
        self.publish(ChangeEvent::ClassroomDeleted { id });
        Ok(())
    }
}

fn validate_classroom_fields(
    name: &str,
    building: &str,
    equipment: &BTreeSet<String>,
) -> Result<(), ValidationError> {
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong(name.chars().count()));
    }
    if building.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong(building.chars().count()));
    }
    if equipment.len() > MAX_EQUIPMENT_TAGS {
        return Err(ValidationError::TooManyEquipmentTags(equipment.len()));
    }
    Ok(())
}

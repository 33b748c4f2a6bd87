//! The persistence seam. The engine only ever talks to [`Store`]; which
//! document database actually backs it is a deployment concern.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use ulid::Ulid;

use crate::error::StoreError;
use crate::model::{BookingRequest, Classroom, RequestStatus, Schedule, ScheduleStatus};

/// CRUD + scoped-query surface over the three collections. Every method is a
/// suspension point; implementations must leave no partial mutation behind on
/// failure so callers can safely retry.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    // ── Classrooms ──────────────────────────────────────────────

    async fn list_classrooms(&self) -> Result<Vec<Classroom>, StoreError>;
    async fn get_classroom(&self, id: Ulid) -> Result<Option<Classroom>, StoreError>;
    /// Create-if-absent, else replace.
    async fn put_classroom(&self, room: Classroom) -> Result<(), StoreError>;
    async fn delete_classroom(&self, id: Ulid) -> Result<(), StoreError>;

    // ── Booking requests ────────────────────────────────────────

    async fn insert_request(&self, request: BookingRequest) -> Result<(), StoreError>;
    async fn get_request(&self, id: Ulid) -> Result<Option<BookingRequest>, StoreError>;
    async fn list_requests(&self) -> Result<Vec<BookingRequest>, StoreError>;
    async fn requests_by_faculty(
        &self,
        faculty_id: &str,
    ) -> Result<Vec<BookingRequest>, StoreError>;
    /// The conflict-relevant slice: one classroom, one date, statuses in the
    /// given set.
    async fn requests_for(
        &self,
        classroom_id: Ulid,
        date: NaiveDate,
        statuses: &[RequestStatus],
    ) -> Result<Vec<BookingRequest>, StoreError>;
    /// Replace by id. `NotFound` if the record doesn't exist.
    async fn update_request(&self, request: BookingRequest) -> Result<(), StoreError>;
    /// Cascade helper: drop this room's pending requests, returning their ids.
    async fn delete_pending_requests_for_classroom(
        &self,
        classroom_id: Ulid,
    ) -> Result<Vec<Ulid>, StoreError>;

    // ── Schedules ───────────────────────────────────────────────

    async fn insert_schedule(&self, schedule: Schedule) -> Result<(), StoreError>;
    async fn get_schedule(&self, id: Ulid) -> Result<Option<Schedule>, StoreError>;
    async fn schedules_on(&self, date: NaiveDate) -> Result<Vec<Schedule>, StoreError>;
    async fn schedules_for(
        &self,
        classroom_id: Ulid,
        date: NaiveDate,
        statuses: &[ScheduleStatus],
    ) -> Result<Vec<Schedule>, StoreError>;
    async fn update_schedule(&self, schedule: Schedule) -> Result<(), StoreError>;
    /// Cascade helper: drop this room's confirmed schedules, returning ids.
    async fn delete_confirmed_schedules_for_classroom(
        &self,
        classroom_id: Ulid,
    ) -> Result<Vec<Ulid>, StoreError>;
}

/// DashMap-backed reference store. Production deployments put a remote
/// document database behind [`Store`]; this one backs tests and local runs.
pub struct MemoryStore {
    classrooms: DashMap<Ulid, Classroom>,
    requests: DashMap<Ulid, BookingRequest>,
    schedules: DashMap<Ulid, Schedule>,
    /// Countdown to an injected failure; negative means disarmed.
    fail_in: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            classrooms: DashMap::new(),
            requests: DashMap::new(),
            schedules: DashMap::new(),
            fail_in: AtomicI64::new(-1),
        }
    }

    /// Make the next store call fail with `Unavailable`. Test hook for
    /// transient-failure paths.
    pub fn fail_next_op(&self) {
        self.fail_after_ops(0);
    }

    /// Let `n` store calls succeed, then fail the one after with
    /// `Unavailable`. Targets a specific write inside a multi-write flow.
    pub fn fail_after_ops(&self, n: i64) {
        self.fail_in.store(n, Ordering::SeqCst);
    }

    fn check_fail(&self) -> Result<(), StoreError> {
        if self.fail_in.load(Ordering::SeqCst) >= 0
            && self.fail_in.fetch_sub(1, Ordering::SeqCst) == 0
        {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort by id so reads return a stable order (ulids sort by creation time).
fn sorted_by_id<T, F: Fn(&T) -> Ulid>(mut items: Vec<T>, id: F) -> Vec<T> {
    items.sort_by_key(|item| id(item));
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_classrooms(&self) -> Result<Vec<Classroom>, StoreError> {
        self.check_fail()?;
        let rooms = self.classrooms.iter().map(|e| e.value().clone()).collect();
        Ok(sorted_by_id(rooms, |r: &Classroom| r.id))
    }

    async fn get_classroom(&self, id: Ulid) -> Result<Option<Classroom>, StoreError> {
        self.check_fail()?;
        Ok(self.classrooms.get(&id).map(|e| e.value().clone()))
    }

    async fn put_classroom(&self, room: Classroom) -> Result<(), StoreError> {
        self.check_fail()?;
        self.classrooms.insert(room.id, room);
        Ok(())
    }

    async fn delete_classroom(&self, id: Ulid) -> Result<(), StoreError> {
        self.check_fail()?;
        self.classrooms
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert_request(&self, request: BookingRequest) -> Result<(), StoreError> {
        self.check_fail()?;
        self.requests.insert(request.id, request);
        Ok(())
    }

    async fn get_request(&self, id: Ulid) -> Result<Option<BookingRequest>, StoreError> {
        self.check_fail()?;
        Ok(self.requests.get(&id).map(|e| e.value().clone()))
    }

    async fn list_requests(&self) -> Result<Vec<BookingRequest>, StoreError> {
        self.check_fail()?;
        let requests = self.requests.iter().map(|e| e.value().clone()).collect();
        Ok(sorted_by_id(requests, |r: &BookingRequest| r.id))
    }

    async fn requests_by_faculty(
        &self,
        faculty_id: &str,
    ) -> Result<Vec<BookingRequest>, StoreError> {
        self.check_fail()?;
        let requests = self
            .requests
            .iter()
            .filter(|e| e.value().faculty_id == faculty_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(requests, |r: &BookingRequest| r.id))
    }

    async fn requests_for(
        &self,
        classroom_id: Ulid,
        date: NaiveDate,
        statuses: &[RequestStatus],
    ) -> Result<Vec<BookingRequest>, StoreError> {
        self.check_fail()?;
        let requests = self
            .requests
            .iter()
            .filter(|e| {
                let r = e.value();
                r.classroom_id == classroom_id && r.date == date && statuses.contains(&r.status)
            })
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(requests, |r: &BookingRequest| r.id))
    }

    async fn update_request(&self, request: BookingRequest) -> Result<(), StoreError> {
        self.check_fail()?;
        match self.requests.get_mut(&request.id) {
            Some(mut entry) => {
                *entry = request;
                Ok(())
            }
            None => Err(StoreError::NotFound(request.id)),
        }
    }

    async fn delete_pending_requests_for_classroom(
        &self,
        classroom_id: Ulid,
    ) -> Result<Vec<Ulid>, StoreError> {
        self.check_fail()?;
        let doomed: Vec<Ulid> = self
            .requests
            .iter()
            .filter(|e| {
                let r = e.value();
                r.classroom_id == classroom_id && r.status == RequestStatus::Pending
            })
            .map(|e| *e.key())
            .collect();
        for id in &doomed {
            self.requests.remove(id);
        }
        Ok(doomed)
    }

    async fn insert_schedule(&self, schedule: Schedule) -> Result<(), StoreError> {
        self.check_fail()?;
        self.schedules.insert(schedule.id, schedule);
        Ok(())
    }

    async fn get_schedule(&self, id: Ulid) -> Result<Option<Schedule>, StoreError> {
        self.check_fail()?;
        Ok(self.schedules.get(&id).map(|e| e.value().clone()))
    }

    async fn schedules_on(&self, date: NaiveDate) -> Result<Vec<Schedule>, StoreError> {
        self.check_fail()?;
        let schedules = self
            .schedules
            .iter()
            .filter(|e| e.value().date == date)
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(schedules, |s: &Schedule| s.id))
    }

    async fn schedules_for(
        &self,
        classroom_id: Ulid,
        date: NaiveDate,
        statuses: &[ScheduleStatus],
    ) -> Result<Vec<Schedule>, StoreError> {
        self.check_fail()?;
        let schedules = self
            .schedules
            .iter()
            .filter(|e| {
                let s = e.value();
                s.classroom_id == classroom_id && s.date == date && statuses.contains(&s.status)
            })
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(schedules, |s: &Schedule| s.id))
    }

    async fn update_schedule(&self, schedule: Schedule) -> Result<(), StoreError> {
        self.check_fail()?;
        match self.schedules.get_mut(&schedule.id) {
            Some(mut entry) => {
                *entry = schedule;
                Ok(())
            }
            None => Err(StoreError::NotFound(schedule.id)),
        }
    }

    async fn delete_confirmed_schedules_for_classroom(
        &self,
        classroom_id: Ulid,
    ) -> Result<Vec<Ulid>, StoreError> {
        self.check_fail()?;
        let doomed: Vec<Ulid> = self
            .schedules
            .iter()
            .filter(|e| {
                let s = e.value();
                s.classroom_id == classroom_id && s.status == ScheduleStatus::Confirmed
            })
            .map(|e| *e.key())
            .collect();
        for id in &doomed {
            self.schedules.remove(id);
        }
        Ok(doomed)
    }
}

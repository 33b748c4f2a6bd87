//! Cache-first read surface. These are display reads — conflict decisions
//! never come through here (see `conflict.rs`).

use chrono::NaiveDate;

use crate::cache::{CacheStats, CachedValue, Namespace};
use crate::error::EngineError;
use crate::model::{BookingRequest, Classroom, Schedule};
use crate::store::Store;

use super::Engine;

const ALL_KEY: &str = "all";

impl<S: Store> Engine<S> {
    pub async fn classrooms(&self) -> Result<Vec<Classroom>, EngineError> {
        if let Some(CachedValue::Classrooms(rooms)) = self.cache.get(Namespace::Classrooms, ALL_KEY)
        {
            return Ok(rooms);
        }
        let rooms = self.store.list_classrooms().await?;
        self.cache.set(
            Namespace::Classrooms,
            ALL_KEY.into(),
            CachedValue::Classrooms(rooms.clone()),
        );
        Ok(rooms)
    }

    pub async fn all_bookings(&self) -> Result<Vec<BookingRequest>, EngineError> {
        if let Some(CachedValue::Bookings(requests)) = self.cache.get(Namespace::Bookings, ALL_KEY)
        {
            return Ok(requests);
        }
        let requests = self.store.list_requests().await?;
        self.cache.set(
            Namespace::Bookings,
            ALL_KEY.into(),
            CachedValue::Bookings(requests.clone()),
        );
        Ok(requests)
    }

    pub async fn bookings_for_faculty(
        &self,
        faculty_id: &str,
    ) -> Result<Vec<BookingRequest>, EngineError> {
        if let Some(CachedValue::Bookings(requests)) =
            self.cache.get(Namespace::BookingsByFaculty, faculty_id)
        {
            return Ok(requests);
        }
        let requests = self.store.requests_by_faculty(faculty_id).await?;
        self.cache.set(
            Namespace::BookingsByFaculty,
            faculty_id.to_string(),
            CachedValue::Bookings(requests.clone()),
        );
        Ok(requests)
    }

    pub async fn schedules_on(&self, date: NaiveDate) -> Result<Vec<Schedule>, EngineError> {
        let key = date.to_string();
        if let Some(CachedValue::Schedules(schedules)) = self.cache.get(Namespace::Schedules, &key)
        {
            return Ok(schedules);
        }
        let schedules = self.store.schedules_on(date).await?;
        self.cache.set(
            Namespace::Schedules,
            key,
            CachedValue::Schedules(schedules.clone()),
        );
        Ok(schedules)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

//! Room availability: conflict lookup for a candidate interval.
//!
//! Checks short-circuit to "no conflicts" without touching the backend while
//! the room or range is incomplete or the range is not well ordered. A failed
//! backend read is surfaced as an error and never counts as available.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::booking::{MeetingBooking, MeetingId, RoomId, TimeRange};
use crate::error::RepositoryResult;
use crate::range::validate_time_range;
use crate::repository::MeetingRepository;

/// Inputs of one availability check, as they arrive from a booking form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub room_id: Option<RoomId>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub exclude_meeting_id: Option<MeetingId>,
}

impl AvailabilityQuery {
    /// Room and well-ordered range, when both are present.
    pub fn checkable(&self) -> Option<(RoomId, TimeRange)> {
        let room_id = self.room_id?;
        let range = TimeRange::new(self.start?, self.end?);
        validate_time_range(&range).ok()?;
        Some((room_id, range))
    }
}

/// Verdict derived from a check result. Failed checks block submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    Available,
    Blocked(Vec<MeetingBooking>),
    Unknown(String),
}

impl Availability {
    pub fn allows_submission(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

impl From<RepositoryResult<Vec<MeetingBooking>>> for Availability {
    fn from(result: RepositoryResult<Vec<MeetingBooking>>) -> Self {
        match result {
            Ok(conflicts) if conflicts.is_empty() => Availability::Available,
            Ok(conflicts) => Availability::Blocked(conflicts),
            Err(e) => Availability::Unknown(e.to_string()),
        }
    }
}

pub struct RoomAvailabilityChecker<R> {
    meetings: R,
}

impl<R: MeetingRepository> RoomAvailabilityChecker<R> {
    pub fn new(meetings: R) -> Self {
        Self { meetings }
    }

    pub fn repository(&self) -> &R {
        &self.meetings
    }

    /// Existing bookings of `room_id` overlapping `[start, end)`.
    ///
    /// An empty list means the room is free. `exclude_meeting_id` drops the
    /// booking being edited so it does not conflict with itself.
    pub async fn check_availability(
        &self,
        room_id: Option<RoomId>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        exclude_meeting_id: Option<MeetingId>,
    ) -> RepositoryResult<Vec<MeetingBooking>> {
        self.check_query(&AvailabilityQuery {
            room_id,
            start,
            end,
            exclude_meeting_id,
        })
        .await
    }

    pub async fn check_query(
        &self,
        query: &AvailabilityQuery,
    ) -> RepositoryResult<Vec<MeetingBooking>> {
        match query.checkable() {
            Some((room_id, range)) => {
                self.check_range(room_id, range, query.exclude_meeting_id)
                    .await
            }
            None => {
                tracing::debug!("Skipping availability check: incomplete or invalid input");
                Ok(Vec::new())
            }
        }
    }

    /// Conflicts for a complete, well-ordered range.
    pub async fn check_range(
        &self,
        room_id: RoomId,
        range: TimeRange,
        exclude_meeting_id: Option<MeetingId>,
    ) -> RepositoryResult<Vec<MeetingBooking>> {
        let found = self.meetings.find_conflicts(room_id, range).await?;

        let conflicts: Vec<MeetingBooking> = found
            .into_iter()
            .filter(|b| b.conflicts_with(room_id, &range))
            .filter(|b| exclude_meeting_id.is_none() || b.id != exclude_meeting_id)
            .collect();

        tracing::debug!(
            "Room {} [{} - {}]: {} conflict(s)",
            room_id,
            range.start.format("%Y-%m-%d %H:%M"),
            range.end.format("%H:%M"),
            conflicts.len()
        );

        Ok(conflicts)
    }

    /// Run a check under `tracker`; `None` when a newer check superseded it
    /// or the tracker was closed before the result arrived.
    pub async fn check_latest(
        &self,
        tracker: &AvailabilityTracker,
        query: &AvailabilityQuery,
    ) -> Option<RepositoryResult<Vec<MeetingBooking>>> {
        let ticket = tracker.begin();
        let result = self.check_query(query).await;
        tracker.accept(ticket, result)
    }
}

/// Latest-wins bookkeeping for checks issued from one form or socket.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityTracker {
    latest: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

/// Handle for one issued check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckTicket {
    generation: u64,
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket, superseding every earlier one.
    pub fn begin(&self) -> CheckTicket {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        CheckTicket { generation }
    }

    pub fn is_current(&self, ticket: &CheckTicket) -> bool {
        !self.closed.load(Ordering::SeqCst)
            && self.latest.load(Ordering::SeqCst) == ticket.generation
    }

    /// Keep `value` only if `ticket` is still the latest.
    pub fn accept<T>(&self, ticket: CheckTicket, value: T) -> Option<T> {
        if self.is_current(&ticket) {
            Some(value)
        } else {
            tracing::debug!("Discarding stale availability result #{}", ticket.generation);
            None
        }
    }

    /// Teardown: every outstanding and future result is discarded.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

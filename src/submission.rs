//! Submit and reschedule gate for booking forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::availability::RoomAvailabilityChecker;
use crate::booking::{MeetingBooking, MeetingId, RoomId, TimeRange};
use crate::error::{RangeInvalid, RepositoryResult};
use crate::range::validate_time_range;
use crate::repository::MeetingRepository;

/// Typed form payload for creating or editing a booking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(default)]
    pub meeting_id: Option<MeetingId>,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority_id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub organizers: Vec<String>,
}

impl BookingRequest {
    /// Names of required fields still missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.room_id.is_none() {
            missing.push("roomId");
        }
        if self.start.is_none() {
            missing.push("start");
        }
        if self.end.is_none() {
            missing.push("end");
        }
        missing
    }

    fn into_booking(self, room_id: RoomId, range: TimeRange) -> MeetingBooking {
        let mut booking = MeetingBooking::new(self.title, room_id, range)
            .with_attendees(self.attendees)
            .with_organizers(self.organizers);
        booking.id = self.meeting_id;
        booking.priority_id = self.priority_id;
        booking.description = self.description;
        booking
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// Both checks passed; the booking may be persisted.
    Ready(MeetingBooking),
    Incomplete(Vec<&'static str>),
    RangeInvalid(RangeInvalid),
    Conflicts(Vec<MeetingBooking>),
}

impl SubmissionOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, SubmissionOutcome::Ready(_))
    }
}

pub struct BookingGate<R> {
    checker: RoomAvailabilityChecker<R>,
}

impl<R: MeetingRepository> BookingGate<R> {
    pub fn new(meetings: R) -> Self {
        Self {
            checker: RoomAvailabilityChecker::new(meetings),
        }
    }

    pub fn checker(&self) -> &RoomAvailabilityChecker<R> {
        &self.checker
    }

    /// Re-run range and availability checks before persisting.
    pub async fn check_submission(
        &self,
        request: BookingRequest,
    ) -> RepositoryResult<SubmissionOutcome> {
        let (room_id, start, end) = match (request.room_id, request.start, request.end) {
            (Some(room_id), Some(start), Some(end)) => (room_id, start, end),
            _ => return Ok(SubmissionOutcome::Incomplete(request.missing_fields())),
        };

        let range = TimeRange::new(start, end);
        if let Err(invalid) = validate_time_range(&range) {
            return Ok(SubmissionOutcome::RangeInvalid(invalid));
        }

        let conflicts = self
            .checker
            .check_range(room_id, range, request.meeting_id)
            .await?;

        if conflicts.is_empty() {
            Ok(SubmissionOutcome::Ready(request.into_booking(room_id, range)))
        } else {
            tracing::debug!(
                "Blocking submission for room {}: {} conflict(s)",
                room_id,
                conflicts.len()
            );
            Ok(SubmissionOutcome::Conflicts(conflicts))
        }
    }

    /// Bookings shown around a reschedule: everything overlapping `range`,
    /// ordered by start. A range that is not well ordered lists nothing.
    pub async fn meetings_in_range(
        &self,
        range: TimeRange,
    ) -> RepositoryResult<Vec<MeetingBooking>> {
        if validate_time_range(&range).is_err() {
            tracing::debug!("Skipping meeting listing: range is not well ordered");
            return Ok(Vec::new());
        }
        self.checker.repository().list_meetings(range).await
    }

    /// Drag/resize of an existing booking to `range`.
    pub async fn reschedule(
        &self,
        booking: MeetingBooking,
        range: TimeRange,
    ) -> RepositoryResult<SubmissionOutcome> {
        if let Err(invalid) = validate_time_range(&range) {
            return Ok(SubmissionOutcome::RangeInvalid(invalid));
        }

        let conflicts = self
            .checker
            .check_range(booking.room_id, range, booking.id)
            .await?;

        if conflicts.is_empty() {
            Ok(SubmissionOutcome::Ready(booking.rescheduled(range)))
        } else {
            Ok(SubmissionOutcome::Conflicts(conflicts))
        }
    }
}

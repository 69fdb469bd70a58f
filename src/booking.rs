use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a bookable room (sala).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

/// Identifier of a persisted meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(pub i64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open `[start, end)` interval a room is occupied for.
///
/// Construction does not reject `end <= start`; callers run the range
/// validator before treating a range as bookable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Open-interval overlap: touching endpoints are not an overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingBooking {
    pub id: Option<MeetingId>,
    pub room_id: RoomId,
    pub range: TimeRange,
    pub priority_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub attendees: Vec<String>,
    pub organizers: Vec<String>,
}

impl MeetingBooking {
    pub fn new(title: String, room_id: RoomId, range: TimeRange) -> Self {
        Self {
            id: None,
            room_id,
            range,
            priority_id: None,
            title,
            description: None,
            attendees: Vec::new(),
            organizers: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: MeetingId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_priority(mut self, priority_id: i64) -> Self {
        self.priority_id = Some(priority_id);
        self
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_attendees(mut self, attendees: Vec<String>) -> Self {
        self.attendees = attendees;
        self
    }

    pub fn with_organizers(mut self, organizers: Vec<String>) -> Self {
        self.organizers = organizers;
        self
    }

    /// Move the booking to a new interval (calendar drag/resize).
    pub fn rescheduled(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    /// True when this booking occupies `room_id` somewhere inside `range`.
    pub fn conflicts_with(&self, room_id: RoomId, range: &TimeRange) -> bool {
        self.room_id == room_id && self.range.overlaps(range)
    }

    /// Get a human-readable date string
    pub fn formatted_date(&self) -> String {
        self.range.start.format("%Y-%m-%d").to_string()
    }

    /// Get a human-readable time range string
    pub fn formatted_time_range(&self) -> String {
        format!(
            "{} - {}",
            self.range.start.format("%H:%M"),
            self.range.end.format("%H:%M")
        )
    }
}

/// Render the first `limit` conflicts as `"<title> (<date> <hh:mm - hh:mm>)"`,
/// noting how many more were left out.
pub fn conflict_summary(conflicts: &[MeetingBooking], limit: usize) -> Vec<String> {
    let mut lines: Vec<String> = conflicts
        .iter()
        .take(limit)
        .map(|m| {
            format!(
                "{} ({} {})",
                m.title,
                m.formatted_date(),
                m.formatted_time_range()
            )
        })
        .collect();

    if conflicts.len() > limit {
        lines.push(format!("and {} more", conflicts.len() - limit));
    }

    lines
}

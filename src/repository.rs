//! Collaborator seams for the meetings backend, plus in-memory stand-ins.
//!
//! The in-memory repositories back the tests and the demo mode used when
//! no backend URL is configured.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::access_token::AccessToken;
use crate::booking::{MeetingBooking, MeetingId, RoomId, TimeRange};
use crate::error::{RepositoryError, RepositoryResult};

/// Read side of the meeting store used by the availability checker.
#[async_trait]
pub trait MeetingRepository: Send + Sync {
    /// Bookings in `room_id` whose range overlaps `range` (open-interval rule).
    async fn find_conflicts(
        &self,
        room_id: RoomId,
        range: TimeRange,
    ) -> RepositoryResult<Vec<MeetingBooking>>;

    /// Every booking overlapping `range`, in any room, ordered by start.
    async fn list_meetings(&self, range: TimeRange) -> RepositoryResult<Vec<MeetingBooking>>;
}

/// Lookup for participant-form access tokens.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// `Ok(None)` when the token does not exist or the backend marks it invalid.
    async fn resolve_token(&self, token: &str) -> RepositoryResult<Option<AccessToken>>;
}

#[async_trait]
impl<T: MeetingRepository + ?Sized> MeetingRepository for Arc<T> {
    async fn find_conflicts(
        &self,
        room_id: RoomId,
        range: TimeRange,
    ) -> RepositoryResult<Vec<MeetingBooking>> {
        (**self).find_conflicts(room_id, range).await
    }

    async fn list_meetings(&self, range: TimeRange) -> RepositoryResult<Vec<MeetingBooking>> {
        (**self).list_meetings(range).await
    }
}

#[async_trait]
impl<T: TokenRepository + ?Sized> TokenRepository for Arc<T> {
    async fn resolve_token(&self, token: &str) -> RepositoryResult<Option<AccessToken>> {
        (**self).resolve_token(token).await
    }
}

/// Meeting store held in memory.
#[derive(Clone, Default)]
pub struct InMemoryMeetingRepository {
    bookings: Arc<RwLock<Vec<MeetingBooking>>>,
    delay: Option<std::time::Duration>,
    fail_with: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryMeetingRepository {
    pub fn new(bookings: Vec<MeetingBooking>) -> Self {
        Self {
            bookings: Arc::new(RwLock::new(bookings)),
            ..Self::default()
        }
    }

    /// Answer every query after `delay`.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every query with a transport error.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub async fn insert(&self, booking: MeetingBooking) {
        self.bookings.write().await.push(booking);
    }

    /// Number of `find_conflicts` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeetingRepository for InMemoryMeetingRepository {
    async fn find_conflicts(
        &self,
        room_id: RoomId,
        range: TimeRange,
    ) -> RepositoryResult<Vec<MeetingBooking>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.fail_with {
            return Err(RepositoryError::Transport(message.clone()));
        }

        let bookings = self.bookings.read().await;
        Ok(bookings
            .iter()
            .filter(|b| b.conflicts_with(room_id, &range))
            .cloned()
            .collect())
    }

    async fn list_meetings(&self, range: TimeRange) -> RepositoryResult<Vec<MeetingBooking>> {
        if let Some(message) = &self.fail_with {
            return Err(RepositoryError::Transport(message.clone()));
        }

        let bookings = self.bookings.read().await;
        let mut listed: Vec<MeetingBooking> = bookings
            .iter()
            .filter(|b| b.range.overlaps(&range))
            .cloned()
            .collect();
        listed.sort_by_key(|b| b.range.start);
        Ok(listed)
    }
}

/// Token store held in memory.
#[derive(Clone, Default)]
pub struct InMemoryTokenRepository {
    tokens: Arc<RwLock<HashMap<String, AccessToken>>>,
    fail_with: Option<String>,
}

impl InMemoryTokenRepository {
    pub fn new(tokens: Vec<AccessToken>) -> Self {
        let tokens = tokens.into_iter().map(|t| (t.token.clone(), t)).collect();
        Self {
            tokens: Arc::new(RwLock::new(tokens)),
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            tokens: Arc::default(),
            fail_with: Some(message.to_string()),
        }
    }

    pub async fn insert(&self, token: AccessToken) {
        self.tokens.write().await.insert(token.token.clone(), token);
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn resolve_token(&self, token: &str) -> RepositoryResult<Option<AccessToken>> {
        if let Some(message) = &self.fail_with {
            return Err(RepositoryError::Transport(message.clone()));
        }
        Ok(self.tokens.read().await.get(token).cloned())
    }
}

/// Sample data for running without a backend.
pub fn demo_repositories() -> (InMemoryMeetingRepository, InMemoryTokenRepository) {
    let now = Utc::now();

    let standup = MeetingBooking::new(
        "Daily Standup".to_string(),
        RoomId(1),
        TimeRange::new(now - Duration::minutes(5), now + Duration::minutes(25)),
    )
    .with_id(MeetingId(1))
    .with_priority(2)
    .with_description("Daily team sync meeting".to_string());

    let review = MeetingBooking::new(
        "Project Review".to_string(),
        RoomId(1),
        TimeRange::new(now + Duration::minutes(30), now + Duration::minutes(90)),
    )
    .with_id(MeetingId(2))
    .with_priority(3);

    let training = MeetingBooking::new(
        "Onboarding Training".to_string(),
        RoomId(3),
        TimeRange::new(now + Duration::hours(3), now + Duration::hours(5)),
    )
    .with_id(MeetingId(3))
    .with_priority(1);

    let tokens = vec![
        AccessToken::new("demo-standup", MeetingId(1), &standup.title, standup.range),
        AccessToken::new("demo-training", MeetingId(3), &training.title, training.range),
    ];

    (
        InMemoryMeetingRepository::new(vec![standup, review, training]),
        InMemoryTokenRepository::new(tokens),
    )
}

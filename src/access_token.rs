//! Access gate for the public participant-registration form.
//!
//! A token resolves to one meeting. The form is open from
//! [`ACCESS_GRACE_MINUTES`] before the meeting's start until the same margin
//! after its end, both bounds inclusive.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::{MeetingId, TimeRange};
use crate::error::RepositoryResult;
use crate::repository::TokenRepository;

/// Margin applied on both sides of a meeting's nominal window.
pub const ACCESS_GRACE_MINUTES: i64 = 15;

pub fn access_grace() -> Duration {
    Duration::minutes(ACCESS_GRACE_MINUTES)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub token: String,
    pub meeting_id: MeetingId,
    pub meeting_title: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(
        token: impl Into<String>,
        meeting_id: MeetingId,
        meeting_title: impl Into<String>,
        window: TimeRange,
    ) -> Self {
        Self {
            token: token.into(),
            meeting_id,
            meeting_title: meeting_title.into(),
            window_start: window.start,
            window_end: window.end,
        }
    }

    /// Nominal window widened by the grace margin on both sides.
    pub fn grace_window(&self) -> TimeRange {
        TimeRange::new(
            self.window_start - access_grace(),
            self.window_end + access_grace(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TokenValidationResult {
    Valid { meeting: AccessToken },
    NotFound,
    NotYetOpen,
    Expired,
}

impl TokenValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenValidationResult::Valid { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TokenValidationResult::Valid { .. } => "valid",
            TokenValidationResult::NotFound => "notFound",
            TokenValidationResult::NotYetOpen => "notYetOpen",
            TokenValidationResult::Expired => "expired",
        }
    }
}

/// Place `now` relative to the token's grace window.
pub fn classify_window(access: AccessToken, now: DateTime<Utc>) -> TokenValidationResult {
    let window = access.grace_window();

    if now < window.start {
        TokenValidationResult::NotYetOpen
    } else if now > window.end {
        TokenValidationResult::Expired
    } else {
        TokenValidationResult::Valid { meeting: access }
    }
}

pub struct AccessTokenValidator<R> {
    tokens: R,
}

impl<R: TokenRepository> AccessTokenValidator<R> {
    pub fn new(tokens: R) -> Self {
        Self { tokens }
    }

    /// Resolve `token` and classify it at `now`.
    ///
    /// A lookup that fails in transport is returned as `Err`, never as
    /// `NotFound`.
    pub async fn validate_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<TokenValidationResult> {
        if token.is_empty() {
            return Ok(TokenValidationResult::NotFound);
        }

        let access = match self.tokens.resolve_token(token).await {
            Ok(Some(access)) => access,
            Ok(None) => {
                tracing::debug!("Access token not found");
                return Ok(TokenValidationResult::NotFound);
            }
            Err(e) => {
                tracing::warn!("Access token lookup failed: {}", e);
                return Err(e);
            }
        };

        let result = classify_window(access, now);
        tracing::debug!("Access token classified as {}", result.label());
        Ok(result)
    }
}

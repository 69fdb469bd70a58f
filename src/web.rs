use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::access_token::AccessTokenValidator;
use crate::availability::{AvailabilityQuery, AvailabilityTracker, CheckTicket};
use crate::booking::{conflict_summary, MeetingBooking, TimeRange};
use crate::error::{RepositoryError, RepositoryResult};
use crate::range::{validate_fields, validate_time_range, RangeKind};
use crate::repository::{MeetingRepository, TokenRepository};
use crate::submission::{BookingGate, BookingRequest, SubmissionOutcome};

/// Conflicts listed by title in responses; the rest are counted.
const SUMMARY_LIMIT: usize = 3;

pub type SharedMeetings = Arc<dyn MeetingRepository>;
pub type SharedTokens = Arc<dyn TokenRepository>;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<BookingGate<SharedMeetings>>,
    pub access: Arc<AccessTokenValidator<SharedTokens>>,
}

impl AppState {
    pub fn new(meetings: SharedMeetings, tokens: SharedTokens) -> Self {
        Self {
            gate: Arc::new(BookingGate::new(meetings)),
            access: Arc::new(AccessTokenValidator::new(tokens)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/ranges/validate", post(validate_range))
        .route("/api/rooms/availability", post(check_availability))
        .route("/api/bookings/check", post(check_booking))
        .route("/api/meetings", get(list_meetings))
        .route("/api/access/:token", get(validate_access))
        .route("/ws/availability", get(availability_socket))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn backend_failure(e: RepositoryError) -> Response {
    warn!("Meetings backend failure: {}", e);
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeRequest {
    pub kind: RangeKind,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

async fn validate_range(Json(request): Json<RangeRequest>) -> Json<RangeResponse> {
    let outcome = validate_fields(
        request.kind,
        request.start.as_deref(),
        request.end.as_deref(),
    );

    Json(RangeResponse {
        valid: outcome.is_ok(),
        message: outcome.err().map(|e| e.to_string()),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    pub conflicts: Vec<MeetingBooking>,
    pub summary: Vec<String>,
}

impl AvailabilityResponse {
    fn from_conflicts(conflicts: Vec<MeetingBooking>) -> Self {
        Self {
            available: conflicts.is_empty(),
            summary: conflict_summary(&conflicts, SUMMARY_LIMIT),
            conflicts,
        }
    }
}

async fn check_availability(
    State(state): State<AppState>,
    Json(query): Json<AvailabilityQuery>,
) -> Response {
    match state.gate.checker().check_query(&query).await {
        Ok(conflicts) => Json(AvailabilityResponse::from_conflicts(conflicts)).into_response(),
        Err(e) => backend_failure(e),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SubmissionResponse {
    Ready {
        booking: MeetingBooking,
    },
    Incomplete {
        missing: Vec<&'static str>,
    },
    RangeInvalid {
        message: String,
    },
    Conflicts {
        conflicts: Vec<MeetingBooking>,
        summary: Vec<String>,
    },
}

impl From<SubmissionOutcome> for SubmissionResponse {
    fn from(outcome: SubmissionOutcome) -> Self {
        match outcome {
            SubmissionOutcome::Ready(booking) => SubmissionResponse::Ready { booking },
            SubmissionOutcome::Incomplete(missing) => SubmissionResponse::Incomplete { missing },
            SubmissionOutcome::RangeInvalid(invalid) => SubmissionResponse::RangeInvalid {
                message: invalid.to_string(),
            },
            SubmissionOutcome::Conflicts(conflicts) => SubmissionResponse::Conflicts {
                summary: conflict_summary(&conflicts, SUMMARY_LIMIT),
                conflicts,
            },
        }
    }
}

async fn check_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Response {
    match state.gate.check_submission(request).await {
        Ok(outcome) => Json(SubmissionResponse::from(outcome)).into_response(),
        Err(e) => backend_failure(e),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeetingsQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

async fn list_meetings(
    State(state): State<AppState>,
    Query(query): Query<MeetingsQuery>,
) -> Response {
    let range = TimeRange::new(query.start, query.end);
    if let Err(invalid) = validate_time_range(&range) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: invalid.to_string(),
            }),
        )
            .into_response();
    }

    match state.gate.meetings_in_range(range).await {
        Ok(meetings) => Json(meetings).into_response(),
        Err(e) => backend_failure(e),
    }
}

async fn validate_access(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.access.validate_token(&token, Utc::now()).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => backend_failure(e),
    }
}

/// One availability request on the socket; replies echo `seq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketRequest {
    pub seq: u64,
    #[serde(flatten)]
    pub query: AvailabilityQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketReply {
    pub seq: u64,
    pub available: bool,
    pub conflicts: Vec<MeetingBooking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SocketReply {
    fn from_result(seq: u64, result: RepositoryResult<Vec<MeetingBooking>>) -> Self {
        match result {
            Ok(conflicts) => Self {
                seq,
                available: conflicts.is_empty(),
                conflicts,
                error: None,
            },
            Err(e) => Self {
                seq,
                available: false,
                conflicts: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

async fn availability_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_availability_socket(socket, state))
}

async fn handle_availability_socket(mut socket: WebSocket, state: AppState) {
    let tracker = AvailabilityTracker::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<(CheckTicket, SocketReply)>();
    // At most one check runs per socket; a newer request aborts it.
    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };

                let request: SocketRequest = match serde_json::from_str(&text) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!("Ignoring malformed availability request: {}", e);
                        continue;
                    }
                };

                let ticket = tracker.begin();
                if let Some(previous) = in_flight.take() {
                    previous.abort();
                }

                let tracker = tracker.clone();
                let gate = state.gate.clone();
                let tx = tx.clone();

                in_flight = Some(tokio::spawn(async move {
                    let result = gate.checker().check_query(&request.query).await;
                    if let Some(result) = tracker.accept(ticket, result) {
                        let _ = tx.send((ticket, SocketReply::from_result(request.seq, result)));
                    }
                }));
            }
            Some((ticket, reply)) = rx.recv() => {
                if !tracker.is_current(&ticket) {
                    debug!("Dropping superseded availability reply #{}", reply.seq);
                    continue;
                }
                if let Ok(message) = serde_json::to_string(&reply) {
                    if socket.send(Message::Text(message)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    tracker.close();
    if let Some(check) = in_flight {
        check.abort();
    }
    debug!("Availability socket closed");
}

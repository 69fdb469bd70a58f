use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::access_token::AccessToken;
use crate::booking::{MeetingBooking, MeetingId, RoomId, TimeRange};
use crate::error::{RepositoryError, RepositoryResult};
use crate::repository::{MeetingRepository, TokenRepository};

const VALIDATE_ROOM_PATH: &str = "api/Meet/validarSala";
const FORM_ACCESS_PATH: &str = "api/Meet/formulario";
const MEETINGS_BY_RANGE_PATH: &str = "api/Meet/rango";

/// Body of the room validation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRoomRequest {
    pub id_sala: i64,
    pub fecha_inicio: DateTime<Utc>,
    pub fecha_fin: DateTime<Utc>,
}

/// Meeting as returned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendMeeting {
    pub id_meet: Option<i64>,
    pub titulo: Option<String>,
    pub descripcion: Option<String>,
    pub fecha_inicio: Option<DateTime<Utc>>,
    pub fecha_fin: Option<DateTime<Utc>>,
    pub id_sala: Option<i64>,
    pub id_prioridad: Option<i64>,
    #[serde(default)]
    pub invitados: Vec<String>,
    #[serde(default)]
    pub organizadores: Vec<String>,
}

/// Participant-form access record as returned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendFormAccess {
    pub llave: Option<String>,
    pub valido: Option<bool>,
    pub id_meet: Option<i64>,
    pub titulo: Option<String>,
    pub fecha_inicio: Option<DateTime<Utc>>,
    pub fecha_fin: Option<DateTime<Utc>>,
}

/// HTTP client for the meetings backend.
pub struct BackendClient {
    base_url: Url,
    http_client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        // A base without a trailing slash would lose its last segment on join.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| anyhow!("Invalid backend URL {}: {}", normalized, e))?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        tracing::info!("Initialized meetings backend client for {}", base_url);

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// `Ok(None)` when no backend URL is configured.
    pub fn new_from_config(config: &crate::config::Config) -> Result<Option<Self>> {
        match config.backend_url() {
            Some(base_url) => Self::new(base_url, config.request_timeout()).map(Some),
            None => {
                tracing::debug!("Meetings backend not configured");
                Ok(None)
            }
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> RepositoryResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RepositoryError::NotConfigured(format!("invalid endpoint {}: {}", path, e)))
    }
}

#[async_trait]
impl MeetingRepository for BackendClient {
    async fn find_conflicts(
        &self,
        room_id: RoomId,
        range: TimeRange,
    ) -> RepositoryResult<Vec<MeetingBooking>> {
        let url = self.endpoint(VALIDATE_ROOM_PATH)?;
        let body = ValidateRoomRequest {
            id_sala: room_id.0,
            fecha_inicio: range.start,
            fecha_fin: range.end,
        };

        tracing::debug!("Validating room {} against {}", room_id, url);

        let response = self.http_client.post(url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RepositoryError::Status {
                status: status.as_u16(),
                message: text,
            });
        }

        let meetings: Vec<BackendMeeting> = response
            .json()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        meetings
            .into_iter()
            .map(|meeting| convert_meeting(Some(room_id), meeting))
            .collect()
    }

    async fn list_meetings(&self, range: TimeRange) -> RepositoryResult<Vec<MeetingBooking>> {
        let url = self.endpoint(MEETINGS_BY_RANGE_PATH)?;

        tracing::debug!("Listing meetings from {} to {}", range.start, range.end);

        let response = self
            .http_client
            .get(url)
            .query(&[
                ("fechaInicio", range.start.to_rfc3339()),
                ("fechaFin", range.end.to_rfc3339()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RepositoryError::Status {
                status: status.as_u16(),
                message: text,
            });
        }

        let meetings: Vec<BackendMeeting> = response
            .json()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let mut listed = meetings
            .into_iter()
            .map(|meeting| convert_meeting(None, meeting))
            .collect::<RepositoryResult<Vec<_>>>()?;
        listed.sort_by_key(|b| b.range.start);
        Ok(listed)
    }
}

#[async_trait]
impl TokenRepository for BackendClient {
    async fn resolve_token(&self, token: &str) -> RepositoryResult<Option<AccessToken>> {
        let path = format!("{}/{}", FORM_ACCESS_PATH, urlencoding::encode(token));
        let url = self.endpoint(&path)?;

        let response = self.http_client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RepositoryError::Status {
                status: status.as_u16(),
                message: text,
            });
        }

        let access: BackendFormAccess = response
            .json()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        convert_form_access(token, access)
    }
}

/// Records without `idSala` belong to `queried_room` when the request was
/// scoped to one. A record that cannot be placed fails the whole read.
fn convert_meeting(
    queried_room: Option<RoomId>,
    meeting: BackendMeeting,
) -> RepositoryResult<MeetingBooking> {
    let (start, end) = match (meeting.fecha_inicio, meeting.fecha_fin) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            return Err(RepositoryError::Decode(format!(
                "meeting {:?} is missing its start or end",
                meeting.id_meet
            )))
        }
    };

    let room_id = match meeting.id_sala.map(RoomId).or(queried_room) {
        Some(room_id) => room_id,
        None => {
            return Err(RepositoryError::Decode(format!(
                "meeting {:?} has no room",
                meeting.id_meet
            )))
        }
    };
    let title = meeting.titulo.unwrap_or_else(|| "Untitled Meeting".to_string());
    let mut booking = MeetingBooking::new(title, room_id, TimeRange::new(start, end))
        .with_attendees(meeting.invitados)
        .with_organizers(meeting.organizadores);
    booking.id = meeting.id_meet.map(MeetingId);
    booking.priority_id = meeting.id_prioridad;
    booking.description = meeting.descripcion;

    Ok(booking)
}

fn convert_form_access(
    token: &str,
    access: BackendFormAccess,
) -> RepositoryResult<Option<AccessToken>> {
    if access.valido == Some(false) {
        return Ok(None);
    }

    match (access.id_meet, access.fecha_inicio, access.fecha_fin) {
        (Some(id), Some(start), Some(end)) => Ok(Some(AccessToken::new(
            access.llave.unwrap_or_else(|| token.to_string()),
            MeetingId(id),
            access.titulo.unwrap_or_default(),
            TimeRange::new(start, end),
        ))),
        _ => Err(RepositoryError::Decode(
            "form access record is missing its meeting or window".to_string(),
        )),
    }
}

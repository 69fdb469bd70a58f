//! Error taxonomy for the booking core.
//!
//! Invalid ranges, conflicts and token states are ordinary return values.
//! Only collaborator failures travel through `Err`.

use thiserror::Error;

use crate::range::RangeKind;

/// End of a range does not strictly follow its start.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{kind}")]
pub struct RangeInvalid {
    pub kind: RangeKind,
}

/// A read against the meetings backend failed.
///
/// Never to be read as "no conflicts" or "token not found".
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode backend response: {0}")]
    Decode(String),

    #[error("backend not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for RepositoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RepositoryError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RepositoryError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RepositoryError::Transport(err.to_string())
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

use thiserror::Error;
use tokio::task::JoinError;

/// Échec de récupération d'une image
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("Cover not found")]
    NotFound,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("HTTP error: {0}")]
    Http(String),

    /// Le corps n'est pas une image
    #[error("Unexpected content type: {0}")]
    NotAnImage(String),

    #[error("Cover exceeds {0} bytes")]
    TooLarge(usize),

    #[error("Cover task failed: {0}")]
    Internal(String),
}

impl AssetError {
    pub fn from_status_code(code: u16) -> Self {
        match code {
            404 | 410 => Self::NotFound,
            _ => Self::Status(code),
        }
    }
}

impl From<reqwest::Error> for AssetError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::from_status_code(status.as_u16()),
            None => Self::Http(e.to_string()),
        }
    }
}

impl From<JoinError> for AssetError {
    fn from(e: JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}

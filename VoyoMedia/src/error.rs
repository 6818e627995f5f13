//! Erreurs visibles par les clients
//!
//! Les messages sont génériques : ni identifiant natif, ni nom de provider,
//! ni texte d'erreur amont.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use voyoguard::RateLimited;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid identifier")]
    InvalidIdentifier,

    /// Paramètre `kind` ou `quality` inconnu
    #[error("Invalid request")]
    InvalidRequest,

    #[error("Too many requests")]
    RateLimited(#[from] RateLimited),

    #[error("Resolution exhausted")]
    ResolutionExhausted,

    /// Échec amont avant le premier octet
    #[error("Upstream unavailable")]
    UpstreamUnavailable,

    #[error("Range not satisfiable")]
    RangeNotSatisfiable { size: Option<u64> },

    #[error("Cover unavailable")]
    CoverUnavailable,

    #[error("Internal error")]
    Internal,
}

/// Corps JSON des erreurs
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    /// Secondes avant de réessayer (429 seulement)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Arrondi à la seconde supérieure, au moins 1
pub fn retry_after_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidIdentifier | Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::ResolutionExhausted => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::CoverUnavailable => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier => "Voyo: invalid media identifier",
            Self::InvalidRequest => "Voyo: invalid request",
            Self::RateLimited(_) => "Voyo: too many requests, slow down",
            Self::ResolutionExhausted => "Voyo: this media is temporarily unavailable",
            Self::UpstreamUnavailable => "Voyo: stream interrupted, please retry",
            Self::RangeNotSatisfiable { .. } => "Voyo: requested range not satisfiable",
            Self::CoverUnavailable => "Voyo: cover not available",
            Self::Internal => "Voyo: internal error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            Self::RateLimited(r) => Some(retry_after_secs(r.retry_after)),
            _ => None,
        };

        let body = ErrorBody {
            error: self.public_message().to_string(),
            retry_after,
        };
        let mut response = (self.status_code(), Json(body)).into_response();

        let headers = response.headers_mut();
        if let Some(secs) = retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        if let Self::RangeNotSatisfiable { size: Some(size) } = self {
            if let Ok(v) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                headers.insert(header::CONTENT_RANGE, v);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voyoguard::Ceiling;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(44_100)), 45);
        assert_eq!(retry_after_secs(Duration::from_secs(45)), 45);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[test]
    fn test_rate_limited_response() {
        let err = ServiceError::RateLimited(RateLimited {
            ceiling: Ceiling::ClientExpensive,
            retry_after: Duration::from_secs(30),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServiceError::InvalidIdentifier.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ServiceError::ResolutionExhausted.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let response = ServiceError::RangeNotSatisfiable { size: Some(1000) }.into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
    }
}

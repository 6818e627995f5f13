//! Proxy de diffusion
//!
//! Relaie un flux (fichier du miroir local ou connexion amont) en respectant
//! les requêtes `Range`. Le corps est un tuyau direct : rien n'est chargé
//! en entier, un client lent ralentit la lecture amont. Une erreur amont en
//! cours de flux interrompt la réponse.

use crate::error::ServiceError;
use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use futures::TryStreamExt;
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use voyoextract::{MediaKind, ProviderError, StreamDescriptor, fetch_range};
use voyomirror::MirroredFile;
use voyoutils::{content_type_for_extension, normalize_content_type};

/// Plage d'octets inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Nombre d'octets couverts
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Analyse un en-tête `Range` pour une ressource de `size` octets
///
/// Formes acceptées : `bytes=a-b`, `bytes=a-`, `bytes=-n`. Retourne
/// `Ok(None)` pour un en-tête ignoré (unité inconnue, plages multiples,
/// syntaxe invalide) : la ressource est alors servie en entier.
/// `Err(RangeNotSatisfiable)` si la plage est hors de la ressource.
pub fn parse_range(range: &str, size: u64) -> Result<Option<ByteRange>, ServiceError> {
    let Some(ranges) = range.trim().strip_prefix("bytes=") else {
        return Ok(None);
    };
    if ranges.contains(',') {
        return Ok(None);
    }
    let Some((first, last)) = ranges.split_once('-') else {
        return Ok(None);
    };
    let (first, last) = (first.trim(), last.trim());

    let unsatisfiable = ServiceError::RangeNotSatisfiable { size: Some(size) };

    let range = if first.is_empty() {
        // suffixe : les n derniers octets
        let Ok(suffix) = last.parse::<u64>() else {
            return Ok(None);
        };
        if suffix == 0 || size == 0 {
            return Err(unsatisfiable);
        }
        ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        }
    } else {
        let Ok(start) = first.parse::<u64>() else {
            return Ok(None);
        };
        let end = match last {
            "" => None,
            _ => match last.parse::<u64>() {
                Ok(end) => Some(end),
                Err(_) => return Ok(None),
            },
        };
        if end.is_some_and(|e| e < start) {
            return Ok(None);
        }
        if start >= size {
            return Err(unsatisfiable);
        }
        ByteRange {
            start,
            end: end.unwrap_or(u64::MAX).min(size - 1),
        }
    };

    Ok(Some(range))
}

/// Sert un fichier du miroir local
pub async fn serve_local_file(
    file: &MirroredFile,
    range_header: Option<&str>,
) -> Result<Response, ServiceError> {
    let size = file.size;
    let range = match range_header {
        Some(h) => parse_range(h, size)?,
        None => None,
    };

    let mut handle = tokio::fs::File::open(&file.path).await.map_err(|e| {
        warn!(path = %file.path.display(), "Cannot open mirror file: {}", e);
        ServiceError::UpstreamUnavailable
    })?;

    let (status, start, len) = match range {
        Some(r) => (StatusCode::PARTIAL_CONTENT, r.start, r.length()),
        None => (StatusCode::OK, 0, size),
    };
    if start > 0 {
        handle.seek(SeekFrom::Start(start)).await.map_err(|e| {
            warn!(path = %file.path.display(), "Cannot seek mirror file: {}", e);
            ServiceError::UpstreamUnavailable
        })?;
    }

    let body = Body::from_stream(ReaderStream::new(handle.take(len)));
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type_for_extension(file.extension))
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, len);
    if let Some(r) = range {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", r.start, r.end, size),
        );
    }

    debug!(path = %file.path.display(), status = status.as_u16(), "Serving mirror file");
    builder.body(body).map_err(|_| ServiceError::Internal)
}

/// Relaie le flux amont d'un descripteur
///
/// L'en-tête `Range` du client est transmis tel quel ; `Content-Length` et
/// `Content-Range` amont sont recopiés s'ils existent.
pub async fn serve_upstream(
    client: &reqwest::Client,
    descriptor: &StreamDescriptor,
    range_header: Option<&str>,
) -> Result<Response, ServiceError> {
    let upstream = fetch_range(client, &descriptor.playable_url, range_header)
        .await
        .map_err(|e| match e {
            ProviderError::Status(416) => ServiceError::RangeNotSatisfiable { size: None },
            other => {
                warn!("Upstream stream unavailable: {}", other);
                ServiceError::UpstreamUnavailable
            }
        })?;

    let declared = upstream
        .content_type
        .as_deref()
        .filter(|t| !t.starts_with("application/octet-stream"))
        .unwrap_or(&descriptor.mime_type);
    let content_type = normalize_content_type(Some(declared), descriptor.kind == MediaKind::Video);

    let status = if upstream.partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(len) = upstream.content_length {
        builder = builder.header(header::CONTENT_LENGTH, len);
    }
    if let Some(content_range) = upstream
        .content_range
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }

    // une erreur dans le flux interrompt la connexion côté client
    let body = Body::from_stream(upstream.body.inspect_err(|e| {
        warn!("Upstream stream aborted: {}", e);
    }));
    builder.body(body).map_err(|_| ServiceError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> Option<ByteRange> {
        Some(ByteRange { start, end })
    }

    #[test]
    fn test_parse_range_forms() {
        assert_eq!(parse_range("bytes=100-199", 1000).unwrap(), range(100, 199));
        assert_eq!(parse_range("bytes=900-", 1000).unwrap(), range(900, 999));
        assert_eq!(parse_range("bytes=-100", 1000).unwrap(), range(900, 999));
        assert_eq!(parse_range("bytes=-5000", 1000).unwrap(), range(0, 999));
        assert_eq!(parse_range("bytes=990-5000", 1000).unwrap(), range(990, 999));
    }

    #[test]
    fn test_ignored_ranges() {
        assert_eq!(parse_range("items=0-1", 1000).unwrap(), None);
        assert_eq!(parse_range("bytes=0-1,5-6", 1000).unwrap(), None);
        assert_eq!(parse_range("bytes=abc", 1000).unwrap(), None);
        assert_eq!(parse_range("bytes=200-100", 1000).unwrap(), None);
    }

    #[test]
    fn test_unsatisfiable_ranges() {
        assert!(matches!(
            parse_range("bytes=1000-", 1000),
            Err(ServiceError::RangeNotSatisfiable { size: Some(1000) })
        ));
        assert!(parse_range("bytes=-0", 1000).is_err());
        assert!(parse_range("bytes=0-", 0).is_err());
    }

    #[test]
    fn test_range_len() {
        assert_eq!(ByteRange { start: 100, end: 199 }.length(), 100);
    }
}

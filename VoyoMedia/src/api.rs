//! Handlers HTTP
//!
//! - `/api/v1/*` : API JSON documentée (montée par `add_openapi`)
//! - `/stream/{id}` et `/cover/{id}` : octets servis aux lecteurs

use crate::error::{ErrorBody, ServiceError};
use crate::prefetch::WarmState;
use crate::proxy::{serve_local_file, serve_upstream};
use crate::service::{MediaLocation, MediaService, ServiceStatus};
use axum::{
    Json, Router,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use utoipa::OpenApi;
use voyoextract::{MediaKind, QualityTier};
use voyoid::encode;
use voyoutils::{content_type_for_extension, normalize_content_type};

/// Paramètres `kind` et `quality` communs aux routes média
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MediaQuery {
    /// `audio` (défaut) ou `video`
    pub kind: Option<String>,
    /// `low`, `standard` ou `high` (défaut)
    pub quality: Option<String>,
}

impl MediaQuery {
    pub fn parse(&self) -> Result<(MediaKind, QualityTier), ServiceError> {
        let kind = match self.kind.as_deref() {
            None | Some("") => MediaKind::default(),
            Some(k) => k.parse().map_err(|_| ServiceError::InvalidRequest)?,
        };
        let quality = match self.quality.as_deref() {
            None | Some("") => QualityTier::default(),
            Some(q) => q.parse().map_err(|_| ServiceError::InvalidRequest)?,
        };
        Ok((kind, quality))
    }
}

/// Clé du client pour la garde
///
/// Premier saut de `X-Forwarded-For` s'il existe, sinon l'adresse du pair.
pub fn client_key(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::RANGE).and_then(|v| v.to_str().ok())
}

/// Description d'un média résolu
///
/// `streamUrl` pointe toujours vers le proxy de ce service.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub media_id: String,
    pub kind: String,
    pub quality: String,
    pub mime_type: String,
    /// Débit en bits/s, absent pour un fichier du miroir ou s'il est inconnu
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    pub stream_url: String,
    /// Vrai si le média est servi depuis le miroir local
    pub local: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PrefetchResponse {
    pub state: WarmState,
}

/// GET /api/v1/resolve/{id} - Résout un média
#[utoipa::path(
    get,
    path = "/api/v1/resolve/{id}",
    tag = "media",
    params(
        ("id" = String, Path, description = "MediaId (ou identifiant natif pendant la transition)"),
        MediaQuery
    ),
    responses(
        (status = 200, description = "Média résolu", body = ResolveResponse),
        (status = 400, description = "Identifiant invalide", body = ErrorBody),
        (status = 429, description = "Trop de requêtes", body = ErrorBody),
        (status = 503, description = "Média indisponible", body = ErrorBody)
    )
)]
async fn resolve_media(
    State(service): State<MediaService>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<ResolveResponse>, ServiceError> {
    let (kind, quality) = query.parse()?;
    let media = service
        .locate(&client_key(&headers, peer), &id, kind, quality)
        .await?;

    let media_id = encode(&media.source);
    let (mime_type, bitrate) = match &media.location {
        MediaLocation::Mirror(file) => (content_type_for_extension(file.extension), None),
        MediaLocation::Remote(d) => (
            normalize_content_type(Some(&d.mime_type), kind == MediaKind::Video),
            Some(d.bitrate).filter(|b| *b > 0),
        ),
    };

    Ok(Json(ResolveResponse {
        stream_url: format!(
            "/stream/{}?kind={}&quality={}",
            media_id,
            kind.as_str(),
            quality.as_str()
        ),
        media_id: media_id.to_string(),
        kind: kind.as_str().to_string(),
        quality: quality.as_str().to_string(),
        mime_type: mime_type.to_string(),
        bitrate,
        local: media.location.is_local(),
    }))
}

/// POST /api/v1/prefetch/{id} - Précharge la résolution d'un média
#[utoipa::path(
    post,
    path = "/api/v1/prefetch/{id}",
    tag = "media",
    params(
        ("id" = String, Path, description = "MediaId (ou identifiant natif pendant la transition)"),
        MediaQuery
    ),
    responses(
        (status = 202, description = "Préchargement accepté", body = PrefetchResponse),
        (status = 400, description = "Identifiant invalide", body = ErrorBody),
        (status = 429, description = "Trop de requêtes", body = ErrorBody)
    )
)]
async fn prefetch_media(
    State(service): State<MediaService>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Result<(StatusCode, Json<PrefetchResponse>), ServiceError> {
    let (kind, quality) = query.parse()?;
    let state = service.prefetch(&client_key(&headers, peer), &id, kind, quality)?;
    Ok((StatusCode::ACCEPTED, Json(PrefetchResponse { state })))
}

/// GET /api/v1/prefetch/{id} - État du préchargement
#[utoipa::path(
    get,
    path = "/api/v1/prefetch/{id}",
    tag = "media",
    params(
        ("id" = String, Path, description = "MediaId (ou identifiant natif pendant la transition)"),
        MediaQuery
    ),
    responses(
        (status = 200, description = "État courant", body = PrefetchResponse),
        (status = 400, description = "Identifiant invalide", body = ErrorBody)
    )
)]
async fn prefetch_status(
    State(service): State<MediaService>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<PrefetchResponse>, ServiceError> {
    let (kind, quality) = query.parse()?;
    let state = service.prefetch_state(&client_key(&headers, peer), &id, kind, quality)?;
    Ok(Json(PrefetchResponse { state }))
}

/// GET /api/v1/status - Statistiques des caches et de la garde
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "service",
    responses(
        (status = 200, description = "Compteurs du service", body = ServiceStatus)
    )
)]
async fn service_status(State(service): State<MediaService>) -> Json<ServiceStatus> {
    Json(service.status())
}

/// GET /stream/{id} - Diffuse un média (requêtes `Range` acceptées)
async fn stream_media(
    State(service): State<MediaService>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Result<Response, ServiceError> {
    let (kind, quality) = query.parse()?;
    let media = service
        .locate(&client_key(&headers, peer), &id, kind, quality)
        .await?;

    match &media.location {
        MediaLocation::Mirror(file) => serve_local_file(file, range_header(&headers)).await,
        MediaLocation::Remote(descriptor) => {
            serve_upstream(service.stream_client(), descriptor, range_header(&headers)).await
        }
    }
}

/// GET /cover/{id} - Image de couverture
async fn get_cover(
    State(service): State<MediaService>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let art = service.cover(&client_key(&headers, peer), &id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, art.content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        art.bytes,
    )
        .into_response())
}

/// Router de l'API JSON, à monter sous `/api/v1`
pub fn create_api_router(service: MediaService) -> Router {
    Router::new()
        .route("/resolve/{id}", get(resolve_media))
        .route("/prefetch/{id}", get(prefetch_status).post(prefetch_media))
        .route("/status", get(service_status))
        .with_state(service)
}

/// Router des octets (`/stream`, `/cover`), à monter à la racine
pub fn create_media_router(service: MediaService) -> Router {
    Router::new()
        .route("/stream/{id}", get(stream_media))
        .route("/cover/{id}", get(get_cover))
        .with_state(service)
}

/// Documentation OpenAPI de l'API Voyo
#[derive(OpenApi)]
#[openapi(
    paths(resolve_media, prefetch_media, prefetch_status, service_status),
    components(
        schemas(ResolveResponse, PrefetchResponse, WarmState, ServiceStatus, ErrorBody)
    ),
    tags(
        (name = "media", description = "Résolution et préchargement des médias"),
        (name = "service", description = "État du service")
    ),
    info(
        title = "Voyo Media API",
        version = "1.0.0",
        description = r#"
# API de résolution des médias

Les identifiants exposés sont des `MediaId` opaques (`vyo_...`). Un
identifiant natif brut est encore accepté pendant la transition.

## Octets

Les routes suivantes ne sont pas sous `/api/v1` :

### GET /stream/{id}?kind=&quality=
Diffuse le média (miroir local ou flux amont), requêtes `Range` acceptées

### GET /cover/{id}
Image de couverture

## Erreurs

Corps JSON générique `{ "error": "...", "retryAfter": 30 }`. Un 429 porte
aussi l'en-tête `Retry-After`.
        "#,
    )
)]
pub struct ApiDoc;

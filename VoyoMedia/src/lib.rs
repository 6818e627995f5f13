//! # VoyoMedia - Service de résolution et de diffusion
//!
//! Assemble les crates Voyo derrière une API HTTP :
//!
//! - [`service`] : orchestration garde, codec, miroir, résolution, promotion
//! - [`prefetch`] : préchargement des résolutions
//! - [`proxy`] : diffusion `Range`-aware depuis le miroir ou l'amont
//! - [`api`] : handlers axum et documentation OpenAPI
//! - [`error`] : erreurs génériques renvoyées aux clients
//!
//! ## Routes enregistrées par [`MediaServerExt::init_media_service`]
//!
//! - `GET /api/v1/resolve/{id}`
//! - `GET|POST /api/v1/prefetch/{id}`
//! - `GET /api/v1/status`
//! - `GET /stream/{id}`
//! - `GET /cover/{id}`
//! - `GET /swagger-ui/v1`

pub mod api;
pub mod error;
pub mod prefetch;
pub mod proxy;
pub mod service;

pub use api::{ApiDoc, MediaQuery, client_key, create_api_router, create_media_router};
pub use error::{ErrorBody, ServiceError};
pub use prefetch::{PrefetchScheduler, WarmState};
pub use service::{LocatedMedia, MediaLocation, MediaService, ServiceStatus};

use utoipa::OpenApi;
use voyoserver::Server;

/// Extension du serveur pour monter le service média
#[async_trait::async_trait]
pub trait MediaServerExt {
    async fn init_media_service(&mut self, service: MediaService);
}

#[async_trait::async_trait]
impl MediaServerExt for Server {
    async fn init_media_service(&mut self, service: MediaService) {
        self.add_router("/", create_media_router(service.clone()))
            .await;
        self.add_openapi(create_api_router(service), ApiDoc::openapi(), "v1")
            .await;
    }
}

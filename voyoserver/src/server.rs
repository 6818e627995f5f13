//! # Module Server
//!
//! Accumule les routes du service dans un `Router` partagé puis le sert sur
//! le port configuré.

use crate::logs::{LogState, create_log_stream_router, create_logs_router, init_logging};
use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::RwLock, task::JoinHandle};
use tracing::{error, info};
use utoipa_swagger_ui::SwaggerUi;
use voyoconfig::get_config;

/// Info serveur sérialisable
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

/// Serveur principal
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    log_state: Option<LogState>,
}

impl Server {
    /// Crée une nouvelle instance de serveur
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du serveur (pour les logs)
    /// * `base_url` - Hôte public annoncé
    /// * `http_port` - Port HTTP à écouter (0 pour un port éphémère)
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            local_addr: None,
            log_state: None,
        }
    }

    /// Serveur initialisé depuis `host.base_url` et `host.http_port`
    pub fn new_configured() -> Self {
        let config = get_config();
        Self::new("Voyo-Media", config.get_base_url(), config.get_http_port())
    }

    async fn mount(&self, path: &str, route: Router) {
        let mut r = self.router.write().await;
        *r = if path == "/" {
            std::mem::take(&mut *r).merge(route)
        } else {
            let normalized = format!("/{}", path.trim_start_matches('/'));
            std::mem::take(&mut *r).nest(&normalized, route)
        };
    }

    /// Ajoute une route JSON dynamique (GET)
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        let handler = move || {
            let f = f.clone();
            async move { Json(f().await) }
        };
        self.mount(path, Router::new().route("/", get(handler))).await;
    }

    /// Ajoute un sous-router
    ///
    /// - Si `path` est "/", le router est fusionné à la racine
    /// - Sinon, il est imbriqué sous le chemin donné
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        self.mount(path, sub_router).await;
    }

    /// Ajoute une API documentée avec OpenAPI et Swagger UI
    ///
    /// Les routes sont montées sous `/api/{name}`, la documentation sous
    /// `/swagger-ui/{name}` et la spécification sous `/api-docs/{name}.json`.
    pub async fn add_openapi(
        &mut self,
        api_router: Router,
        openapi: utoipa::openapi::OpenApi,
        name: &str,
    ) {
        // chemins enregistrés une seule fois au démarrage
        let swagger_path: &'static str = Box::leak(format!("/swagger-ui/{}", name).into_boxed_str());
        let openapi_json_path: &'static str =
            Box::leak(format!("/api-docs/{}.json", name).into_boxed_str());
        let swagger = SwaggerUi::new(swagger_path).url(openapi_json_path, openapi);

        let nested_router = Router::new().nest(&format!("/api/{}", name), api_router);

        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).merge(nested_router).merge(swagger);
    }

    /// Copie du router courant
    pub async fn router(&self) -> Router {
        self.router.read().await.clone()
    }

    /// Démarre le serveur HTTP
    ///
    /// Le port est lié avant le retour, une erreur de bind remonte donc à
    /// l'appelant. Le service tourne ensuite jusqu'à Ctrl+C.
    pub async fn start(&mut self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Unable to bind HTTP port {}", self.http_port))?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        info!(
            "Server {} running at http://{}:{}",
            self.name,
            self.base_url,
            local_addr.port()
        );

        let router = self.router.read().await.clone();
        let server_task = tokio::spawn(async move {
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                error!("HTTP server stopped: {}", e);
            }
        });

        let shutdown_task = tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => info!("Ctrl+C received, shutting down"),
                Err(e) => error!("Unable to listen for Ctrl+C: {}", e),
            }
        });

        self.join_handle = Some(tokio::spawn(async move {
            tokio::select! {
                _ = server_task => {},
                _ = shutdown_task => {},
            }
        }));

        Ok(())
    }

    /// Attend la fin du serveur
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    /// Adresse effectivement liée, une fois le serveur démarré
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Récupère les infos du serveur
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            http_port: self.local_addr.map(|a| a.port()).unwrap_or(self.http_port),
        }
    }

    /// Initialise le logging et enregistre les routes associées
    ///
    /// Routes : `/log-sse`, `/log-dump` et l'API `/api/logs/log_setup`.
    pub async fn init_logging(&mut self) {
        let log_state = init_logging();

        self.add_router("/", create_log_stream_router(log_state.clone()))
            .await;

        use utoipa::OpenApi;
        self.add_openapi(
            create_logs_router(log_state.clone()),
            crate::logs::LogsApiDoc::openapi(),
            "logs",
        )
        .await;

        self.log_state = Some(log_state);
    }

    pub fn log_state(&self) -> Option<&LogState> {
        self.log_state.as_ref()
    }
}

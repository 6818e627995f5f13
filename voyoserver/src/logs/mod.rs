//! Journalisation du service
//!
//! Chaque événement `tracing` est conservé dans un buffer circulaire et
//! diffusé aux abonnés SSE. Le niveau minimum est rechargeable à chaud via
//! `POST /api/logs/log_setup`.

mod sselayer;

pub use sselayer::SseLayer;

use std::{
    collections::VecDeque,
    sync::{Arc, PoisonError, RwLock},
    time::SystemTime,
};

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};
use voyoconfig::get_config;

const LEVELS: [&str; 5] = ["ERROR", "WARN", "INFO", "DEBUG", "TRACE"];

/// Une entrée du journal
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// État partagé du journal : buffer, diffusion et niveau courant
#[derive(Clone)]
pub struct LogState {
    buffer: Arc<RwLock<VecDeque<LogEntry>>>,
    capacity: usize,
    tx: broadcast::Sender<LogEntry>,
    max_level: Arc<RwLock<Level>>,
    reload_handle: Option<reload::Handle<LevelFilter, Registry>>,
}

impl LogState {
    pub fn new(
        capacity: usize,
        level: Level,
        reload_handle: Option<reload::Handle<LevelFilter, Registry>>,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            tx: broadcast::channel(1000).0,
            max_level: Arc::new(RwLock::new(level)),
            reload_handle,
        }
    }

    pub fn set_max_level(&self, level: Level) {
        *self.max_level.write().unwrap_or_else(PoisonError::into_inner) = level;

        if let Some(handle) = &self.reload_handle {
            if let Err(e) = handle.reload(LevelFilter::from_level(level)) {
                eprintln!("Failed to reload log level filter: {}", e);
            }
        }
    }

    pub fn get_max_level(&self) -> Level {
        *self.max_level.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, entry: LogEntry) {
        {
            let mut buf = self.buffer.write().unwrap_or_else(PoisonError::into_inner);
            if buf.len() >= self.capacity {
                buf.pop_front();
            }
            buf.push_back(entry.clone());
        }
        let _ = self.tx.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    pub fn dump(&self) -> Vec<LogEntry> {
        self.buffer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// Paramètres de `/log-sse`
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub error: Option<bool>,
    #[serde(default)]
    pub warn: Option<bool>,
    #[serde(default)]
    pub info: Option<bool>,
    #[serde(default)]
    pub debug: Option<bool>,
    #[serde(default)]
    pub trace: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
}

/// Handler SSE : historique puis flux temps réel
pub async fn log_sse(
    State(state): State<LogState>,
    Query(params): Query<LogQuery>,
) -> impl IntoResponse {
    let mut rx = state.subscribe();
    let history = state.dump();

    let stream = async_stream::stream! {
        for entry in history {
            if is_level_allowed(&entry.level, state.get_max_level()) && filter_entry(&entry, &params) {
                if let Ok(json) = serde_json::to_string(&entry) {
                    yield Ok::<_, axum::Error>(Event::default().data(json));
                }
            }
        }

        loop {
            let entry = match rx.recv().await {
                Ok(entry) => entry,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if !is_level_allowed(&entry.level, state.get_max_level()) || !filter_entry(&entry, &params) {
                continue;
            }
            if let Ok(json) = serde_json::to_string(&entry) {
                yield Ok::<_, axum::Error>(Event::default().data(json));
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handler REST (dump JSON du buffer)
pub async fn log_dump(State(state): State<LogState>) -> impl IntoResponse {
    Json(state.dump())
}

fn is_level_allowed(log_level: &str, max_level: Level) -> bool {
    match string_to_level(log_level) {
        // Level::ERROR est le plus petit dans l'ordre de tracing
        Some(level) => level <= max_level,
        None => false,
    }
}

fn filter_entry(entry: &LogEntry, q: &LogQuery) -> bool {
    let lvl = entry.level.to_lowercase();
    let flags = [
        ("error", q.error),
        ("warn", q.warn),
        ("info", q.info),
        ("debug", q.debug),
        ("trace", q.trace),
    ];

    let any_flag = flags.iter().any(|(_, f)| f.unwrap_or(false));
    let mut allowed = !any_flag
        || flags
            .iter()
            .any(|(name, f)| f.unwrap_or(false) && *name == lvl);

    if let Some(search) = &q.search {
        allowed &= entry.message.contains(search) || entry.target.contains(search);
    }

    allowed
}

/// Installe le subscriber global
///
/// Niveau, taille du buffer et sortie console viennent de `host.logger`.
/// Si un subscriber est déjà installé (tests), le `LogState` reste utilisable
/// mais ne reçoit rien.
pub fn init_logging() -> LogState {
    let config = get_config();

    let level = string_to_level(&config.get_log_min_level()).unwrap_or(Level::INFO);
    let (filter, reload_handle) = reload::Layer::new(LevelFilter::from_level(level));

    let log_state = LogState::new(config.get_log_cache_size(), level, Some(reload_handle));

    // le filtre rechargeable doit précéder le SseLayer
    let subscriber = Registry::default()
        .with(filter)
        .with(SseLayer::new(log_state.clone()));

    let result = if config.get_log_enable_console() {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialised: {}", e);
    }

    log_state
}

/// Corps de `POST /log_setup`
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LogSetupRequest {
    pub level: String,
}

/// Réponse de `/log_setup`
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LogSetupResponse {
    pub current_level: String,
    pub available_levels: Vec<String>,
}

impl LogSetupResponse {
    fn new(level: Level) -> Self {
        Self {
            current_level: level.as_str().to_string(),
            available_levels: LEVELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/log_setup",
    responses(
        (status = 200, description = "Current log configuration", body = LogSetupResponse)
    ),
    tag = "logs"
)]
pub async fn log_setup_get(State(state): State<LogState>) -> impl IntoResponse {
    Json(LogSetupResponse::new(state.get_max_level()))
}

#[utoipa::path(
    post,
    path = "/log_setup",
    request_body = LogSetupRequest,
    responses(
        (status = 200, description = "Log level updated", body = LogSetupResponse),
        (status = 400, description = "Invalid log level")
    ),
    tag = "logs"
)]
pub async fn log_setup_post(
    State(state): State<LogState>,
    Json(payload): Json<LogSetupRequest>,
) -> impl IntoResponse {
    let Some(level) = string_to_level(&payload.level) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("Invalid log level. Must be one of: {}", LEVELS.join(", "))
            })),
        )
            .into_response();
    };

    state.set_max_level(level);
    tracing::info!("Log level changed to: {}", level);

    (StatusCode::OK, Json(LogSetupResponse::new(level))).into_response()
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

/// Routes `/log-sse` et `/log-dump`, à monter à la racine
pub fn create_log_stream_router(log_state: LogState) -> axum::Router {
    use axum::routing::get;
    axum::Router::new()
        .route("/log-sse", get(log_sse))
        .route("/log-dump", get(log_dump))
        .with_state(log_state)
}

/// Router de l'API de gestion des logs
pub fn create_logs_router(log_state: LogState) -> axum::Router {
    use axum::routing::get;
    axum::Router::new()
        .route("/log_setup", get(log_setup_get).post(log_setup_post))
        .with_state(log_state)
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(log_setup_get, log_setup_post),
    components(schemas(LogSetupRequest, LogSetupResponse)),
    tags((name = "logs", description = "Log level configuration endpoints"))
)]
pub struct LogsApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: &str, message: &str) -> LogEntry {
        LogEntry {
            timestamp: SystemTime::now(),
            level: level.to_string(),
            target: "voyo".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let state = LogState::new(2, Level::TRACE, None);
        state.push(entry("INFO", "a"));
        state.push(entry("INFO", "b"));
        state.push(entry("INFO", "c"));

        let messages: Vec<_> = state.dump().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["b", "c"]);
    }

    #[test]
    fn test_level_ordering() {
        assert!(is_level_allowed("ERROR", Level::INFO));
        assert!(is_level_allowed("INFO", Level::INFO));
        assert!(!is_level_allowed("DEBUG", Level::INFO));
        assert!(!is_level_allowed("bogus", Level::TRACE));
    }

    #[test]
    fn test_query_filters() {
        let q = LogQuery {
            warn: Some(true),
            search: Some("mirror".to_string()),
            ..Default::default()
        };
        assert!(filter_entry(&entry("WARN", "mirror promotion failed"), &q));
        assert!(!filter_entry(&entry("INFO", "mirror promotion done"), &q));
        assert!(!filter_entry(&entry("WARN", "cover fetch failed"), &q));
        assert!(filter_entry(&entry("DEBUG", "x"), &LogQuery::default()));
    }
}

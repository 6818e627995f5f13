//! # voyoserver - Hôte HTTP du service Voyo
//!
//! Cette crate fournit une couche fine au-dessus d'Axum :
//!
//! - [`server`] : le [`Server`] qui accumule les routers, expose Swagger UI
//!   et gère l'arrêt gracieux sur Ctrl+C
//! - [`logs`] : journalisation `tracing` avec buffer circulaire, flux SSE
//!   et réglage du niveau à chaud
//!
//! Le serveur transmet l'adresse du pair aux handlers (`ConnectInfo<SocketAddr>`),
//! ce dont la garde anti-abus a besoin pour identifier les clients.
//!
//! ## Exemple
//!
//! ```rust,no_run
//! use voyoserver::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Server::new_configured();
//!     server.init_logging().await;
//!     server.add_route("/health", || async { serde_json::json!({"ok": true}) }).await;
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{LogState, SseLayer, create_log_stream_router, log_dump, log_sse};
pub use server::{Server, ServerInfo};

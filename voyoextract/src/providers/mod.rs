//! Paliers de la chaîne d'extraction, dans leur ordre d'essai

pub mod cli;
pub mod native_api;
pub mod object_storage;
pub mod peer_proxy;

pub use cli::CliProvider;
pub use native_api::NativeApiProvider;
pub use object_storage::{HttpObjectStorage, ObjectMeta, ObjectStorage, ObjectStorageProvider};
pub use peer_proxy::PeerProxyProvider;

/// URL de lecture publique d'un contenu de la plateforme
pub(crate) fn watch_url(source: &voyoid::SourceId) -> String {
    format!("https://www.youtube.com/watch?v={}", source)
}

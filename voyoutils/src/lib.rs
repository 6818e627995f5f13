//! Utilitaires partagés par les crates Voyo.
//!
//! - [`TaskSupervisor`] : propriétaire des tâches de fond (promotion vers le
//!   miroir local, préchargement, balayages périodiques)
//! - [`content_type`] : normalisation des types MIME servis aux clients

pub mod content_type;
mod supervisor;

pub use content_type::{content_type_for_extension, normalize_content_type};
pub use supervisor::TaskSupervisor;

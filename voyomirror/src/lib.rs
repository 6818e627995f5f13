//! # voyomirror - Miroir local des médias audio
//!
//! Après une première résolution réussie, l'audio est téléchargé en entier
//! dans un répertoire local. Les requêtes suivantes sont servies depuis ce
//! fichier sans passer par la chaîne d'extraction.
//!
//! - [`MirrorStore`] : nommage, recherche, écriture atomique, consolidation
//! - [`MirrorPromoter`] : déclenchement unique par couple (identifiant, palier)

pub mod config_ext;
pub mod error;
pub mod promoter;
pub mod store;

pub use config_ext::MirrorConfigExt;
pub use error::PromotionFailure;
pub use promoter::{MirrorPromoter, PromotionOutcome};
pub use store::{MIRROR_EXTENSIONS, MirrorStore, MirroredFile, extension_for_mime};

//! # voyoguard - Garde anti-abus
//!
//! Limiteur à fenêtre fixe à deux niveaux :
//!
//! - par client : un plafond général (toutes requêtes) et un plafond strict
//!   pour les requêtes coûteuses (celles qui déclencheraient une extraction)
//! - global : un plafond de requêtes coûteuses tous clients confondus
//!
//! Les plafonds sont évalués dans l'ordre général, coûteux client, coûteux
//! global. Une requête n'est comptée que si elle passe les trois contrôles.
//!
//! ```
//! use voyoguard::{AbuseGuard, GuardSettings, RequestClass};
//!
//! let guard = AbuseGuard::new(GuardSettings::default());
//! guard.check("203.0.113.7", RequestClass::Expensive).unwrap();
//! ```

pub mod config_ext;
mod guard;

pub use config_ext::GuardConfigExt;
pub use guard::{AbuseGuard, Ceiling, GuardSettings, GuardStats, RateLimited, RequestClass};

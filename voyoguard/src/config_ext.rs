//! Construction de la garde depuis la section `guard` de la configuration

use crate::{AbuseGuard, GuardSettings};
use std::sync::Arc;
use voyoconfig::Config;

pub trait GuardConfigExt {
    /// Lit `guard.*`, avec les valeurs de [`GuardSettings::default`] en repli
    fn get_guard_settings(&self) -> GuardSettings;

    fn create_abuse_guard(&self) -> Arc<AbuseGuard> {
        Arc::new(AbuseGuard::new(self.get_guard_settings()))
    }
}

impl GuardConfigExt for Config {
    fn get_guard_settings(&self) -> GuardSettings {
        let d = GuardSettings::default();
        let ceiling = |key: &str, default: u32| {
            u32::try_from(self.get_usize(&["guard", key], default as usize)).unwrap_or(default)
        };

        GuardSettings {
            window: self.get_secs(&["guard", "window_secs"], d.window),
            general_ceiling: ceiling("general_ceiling", d.general_ceiling),
            expensive_ceiling: ceiling("expensive_ceiling", d.expensive_ceiling),
            global_expensive_ceiling: ceiling("global_expensive_ceiling", d.global_expensive_ceiling),
            sweep_interval: self.get_secs(&["guard", "sweep_interval_secs"], d.sweep_interval),
        }
    }
}

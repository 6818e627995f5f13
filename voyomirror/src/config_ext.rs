//! Extension pour construire le miroir local depuis `voyoconfig`

use crate::promoter::MirrorPromoter;
use crate::store::MirrorStore;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use voyoconfig::Config;
use voyoutils::TaskSupervisor;

const DEFAULT_MIRROR_DIR: &str = "mirror";
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

pub trait MirrorConfigExt {
    /// Répertoire du miroir, absolu ou relatif au répertoire de configuration
    ///
    /// Créé s'il n'existe pas.
    fn get_mirror_dir(&self) -> Result<String>;

    fn get_mirror_download_timeout(&self) -> Duration;

    fn create_mirror_store(&self) -> Result<Arc<MirrorStore>> {
        Ok(Arc::new(MirrorStore::new(self.get_mirror_dir()?)?))
    }

    fn create_mirror_promoter(&self, supervisor: TaskSupervisor) -> Result<Arc<MirrorPromoter>> {
        Ok(Arc::new(MirrorPromoter::new(
            self.create_mirror_store()?,
            supervisor,
            self.get_mirror_download_timeout(),
        )?))
    }
}

impl MirrorConfigExt for Config {
    fn get_mirror_dir(&self) -> Result<String> {
        self.get_managed_dir(&["mirror", "directory"], DEFAULT_MIRROR_DIR)
    }

    fn get_mirror_download_timeout(&self) -> Duration {
        self.get_secs(&["mirror", "download_timeout_secs"], DEFAULT_DOWNLOAD_TIMEOUT)
    }
}

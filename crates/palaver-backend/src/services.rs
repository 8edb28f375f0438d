use std::sync::Arc;

use crate::config::BackendConfig;
use crate::directory::{DirectoryStore, HttpDirectory};
use crate::identity::{HttpIdentity, IdentityService};
use crate::media::{HttpMedia, MediaStore};
use crate::memory::{LocalIdentity, MemoryDirectory, MemoryMedia, MemoryRealtime};
use crate::realtime::{HttpRealtime, RealtimeStore};

/// The four service handles the sync engine works against. Which side of
/// each seam is wired depends only on the environment.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityService>,
    pub directory: Arc<dyn DirectoryStore>,
    pub media: Arc<dyn MediaStore>,
    pub realtime: Arc<dyn RealtimeStore>,
}

impl Services {
    pub fn from_env() -> Self {
        match BackendConfig::from_env() {
            Some(config) => {
                tracing::info!("🔌 hosted backend configured");
                Self::hosted(config)
            }
            None => {
                tracing::info!("📦 no backend configured, using in-process services");
                Self::in_process()
            }
        }
    }

    pub fn hosted(config: BackendConfig) -> Self {
        Self {
            identity: Arc::new(HttpIdentity::new(config.clone())),
            directory: Arc::new(HttpDirectory::new(config.clone())),
            media: Arc::new(HttpMedia::new(config.clone())),
            realtime: Arc::new(HttpRealtime::new(config)),
        }
    }

    pub fn in_process() -> Self {
        Self {
            identity: Arc::new(LocalIdentity::new()),
            directory: Arc::new(MemoryDirectory::new()),
            media: Arc::new(MemoryMedia::new()),
            realtime: Arc::new(MemoryRealtime::new()),
        }
    }
}

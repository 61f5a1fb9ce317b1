// outline-backup/src/services.rs
use tracing::warn;

use crate::config::AppConfig;
use crate::database::{AdminConnector, DumpTool, PgAdminConnector, PgClientTools};
use crate::storage::{MinioStore, ObjectStore, UnavailableStore};

/// The external collaborators one pass talks to.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub connector: &'a dyn AdminConnector,
    pub dump_tool: &'a dyn DumpTool,
    pub store: &'a dyn ObjectStore,
}

/// Production collaborators built from the loaded configuration.
pub struct LiveServices {
    connector: PgAdminConnector,
    tools: PgClientTools,
    store: Box<dyn ObjectStore>,
}

impl LiveServices {
    /// A MinIO client that cannot be built fails only the storage pass.
    pub async fn from_config(app_config: &AppConfig) -> Self {
        let store: Box<dyn ObjectStore> = match MinioStore::connect(&app_config.minio).await {
            Ok(store) => Box::new(store),
            Err(e) => {
                warn!("⚠️ MinIO client unavailable, bucket pass will fail: {:#}", e);
                Box::new(UnavailableStore::new(e))
            }
        };
        LiveServices {
            connector: PgAdminConnector::new(&app_config.postgres),
            tools: PgClientTools::new(&app_config.postgres),
            store,
        }
    }

    pub fn services(&self) -> Services<'_> {
        Services {
            connector: &self.connector,
            dump_tool: &self.tools,
            store: &*self.store,
        }
    }
}

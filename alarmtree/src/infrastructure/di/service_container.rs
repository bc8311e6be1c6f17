//! Service container for dependency injection
//!
//! Wires up services with settings and opens the configured stores.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::services::AlarmTreeService;
use crate::application::ApplicationError;
use crate::config::Settings;
use crate::infrastructure::store::{AlarmDb, HierarchyDb};
use crate::infrastructure::InfraResult;

/// Container holding application services and store locations.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    pub tree_service: AlarmTreeService,
}

impl ServiceContainer {
    pub fn new(settings: Settings) -> Self {
        let settings = Arc::new(settings);
        let tree_service = AlarmTreeService::new(Arc::clone(&settings));
        Self {
            settings,
            tree_service,
        }
    }

    /// Open the legacy hierarchy, preferring `explicit` over the configured path.
    pub fn hierarchy_db(&self, explicit: Option<&Path>) -> InfraResult<HierarchyDb> {
        let path = self.resolve(explicit, self.settings.hierarchy_db.as_deref(), "hierarchy_db")?;
        HierarchyDb::open(&path)
    }

    /// Open the alarm database read-only.
    pub fn alarm_db(&self, explicit: Option<&Path>) -> InfraResult<AlarmDb> {
        let path = self.resolve(explicit, self.settings.alarm_db.as_deref(), "alarm_db")?;
        AlarmDb::open(&path)
    }

    /// Open (creating if needed) the alarm database for writing.
    pub fn alarm_db_for_writing(&self, explicit: Option<&Path>) -> InfraResult<AlarmDb> {
        let path = self.resolve(explicit, self.settings.alarm_db.as_deref(), "alarm_db")?;
        AlarmDb::create(&path)
    }

    fn resolve(&self, explicit: Option<&Path>, configured: Option<&Path>, key: &str) -> InfraResult<PathBuf> {
        explicit
            .or(configured)
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                ApplicationError::Config {
                    message: format!("no {} given and none configured", key),
                }
                .into()
            })
    }
}

//! Explicit context passed to every operation
//!
//! Holds the resolved settings, the deck layout derived from them and the
//! localization handle. There is no process-wide state.

use crate::localization::LocalizationTables;
use deckdata_common::config::Settings;
use deckdata_common::db::{open_cache, open_existing_cache};
use deckdata_common::tabular::DataLayout;
use deckdata_common::Result;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct SyncContext {
    pub settings: Settings,
    pub layout: DataLayout,
    /// Empty until [`SyncContext::reload_localization`] is called
    pub localization: LocalizationTables,
}

impl SyncContext {
    pub fn new(settings: Settings) -> Self {
        let layout = DataLayout::new(settings.deck_name.clone());
        Self {
            settings,
            layout,
            localization: LocalizationTables::default(),
        }
    }

    /// Open the configured cache, creating it if missing
    pub async fn open_cache(&self) -> Result<SqlitePool> {
        open_cache(&self.settings.cache_path).await
    }

    /// Open the configured cache, which must exist
    pub async fn open_existing_cache(&self) -> Result<SqlitePool> {
        open_existing_cache(&self.settings.cache_path).await
    }

    /// Reload the localization tables from the cache
    pub async fn reload_localization(&mut self, pool: &SqlitePool) -> Result<()> {
        self.localization.reload(pool).await
    }
}

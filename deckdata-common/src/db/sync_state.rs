//! Sync metadata
//!
//! Evidence of the last successful sync, for both stores:
//! - cache side: `cache_revision` (bumped by triggers on every write) and
//!   `synced_revision` (its value when the last sync committed)
//! - tabular side: SHA-256 of every CSV file as imported or exported

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use tracing::debug;

const KEY_SYNCED_AT: &str = "synced_at";
const KEY_CACHE_REVISION: &str = "cache_revision";
const KEY_SYNCED_REVISION: &str = "synced_revision";

/// Snapshot of the sync bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// None until the first successful import or export
    pub synced_at: Option<DateTime<Utc>>,
    pub cache_revision: i64,
    pub synced_revision: i64,
    /// Relative file name (`/` separated) to hex SHA-256
    pub file_hashes: BTreeMap<String, String>,
}

impl SyncState {
    /// The cache was written to after the last sync
    pub fn cache_has_unsynced_writes(&self) -> bool {
        self.cache_revision > self.synced_revision
    }
}

/// Read the current bookkeeping
pub async fn load_sync_state(pool: &SqlitePool) -> Result<SyncState> {
    let rows: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT key, value FROM sync_metadata")
            .fetch_all(pool)
            .await?;

    let mut state = SyncState::default();
    for (key, value) in rows {
        let Some(value) = value else { continue };
        match key.as_str() {
            KEY_SYNCED_AT => {
                let instant = DateTime::parse_from_rfc3339(&value).map_err(|e| {
                    Error::schema("sync_metadata", format!("bad synced_at '{}': {}", value, e))
                })?;
                state.synced_at = Some(instant.with_timezone(&Utc));
            }
            KEY_CACHE_REVISION => state.cache_revision = parse_revision(&key, &value)?,
            KEY_SYNCED_REVISION => state.synced_revision = parse_revision(&key, &value)?,
            _ => {}
        }
    }

    let hashes: Vec<(String, String)> =
        sqlx::query_as("SELECT file_name, sha256 FROM sync_file_hashes")
            .fetch_all(pool)
            .await?;
    state.file_hashes = hashes.into_iter().collect();

    Ok(state)
}

fn parse_revision(key: &str, value: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| Error::schema("sync_metadata", format!("bad {} '{}'", key, value)))
}

/// Record a successful sync inside the caller's transaction
///
/// Must run after the data writes of the same transaction, so that
/// `synced_revision` includes the revisions those writes produced.
pub async fn record_sync(
    conn: &mut SqliteConnection,
    file_hashes: &BTreeMap<String, String>,
) -> Result<DateTime<Utc>> {
    let now = Utc::now();

    let revision: Option<String> =
        sqlx::query_scalar::<_, Option<String>>("SELECT value FROM sync_metadata WHERE key = ?")
            .bind(KEY_CACHE_REVISION)
            .fetch_optional(&mut *conn)
            .await?
            .flatten();
    let revision = revision.unwrap_or_else(|| "0".to_string());

    for (key, value) in [
        (KEY_SYNCED_AT, now.to_rfc3339()),
        (KEY_SYNCED_REVISION, revision.clone()),
    ] {
        sqlx::query("INSERT OR REPLACE INTO sync_metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query("DELETE FROM sync_file_hashes")
        .execute(&mut *conn)
        .await?;

    for (file_name, sha256) in file_hashes {
        sqlx::query("INSERT INTO sync_file_hashes (file_name, sha256) VALUES (?, ?)")
            .bind(file_name)
            .bind(sha256)
            .execute(&mut *conn)
            .await?;
    }

    debug!(
        "Recorded sync at {} (revision {}, {} files)",
        now,
        revision,
        file_hashes.len()
    );
    Ok(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::open_cache;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fresh_cache_state() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_cache(&temp_dir.path().join("data.db")).await.unwrap();

        let state = load_sync_state(&pool).await.unwrap();
        assert_eq!(state.synced_at, None);
        assert_eq!(state.cache_revision, 0);
        assert!(!state.cache_has_unsynced_writes());
        assert!(state.file_hashes.is_empty());
    }

    #[tokio::test]
    async fn test_record_sync_captures_revision() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_cache(&temp_dir.path().join("data.db")).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        sqlx::query("INSERT INTO vocabulary (key) VALUES ('the dog')")
            .execute(&mut *tx)
            .await
            .unwrap();
        let mut hashes = BTreeMap::new();
        hashes.insert("625_words-pictures.csv".to_string(), "abc".to_string());
        record_sync(&mut *tx, &hashes).await.unwrap();
        tx.commit().await.unwrap();

        let state = load_sync_state(&pool).await.unwrap();
        assert!(state.synced_at.is_some());
        assert_eq!(state.cache_revision, 1);
        assert_eq!(state.synced_revision, 1);
        assert!(!state.cache_has_unsynced_writes());
        assert_eq!(state.file_hashes, hashes);

        sqlx::query("UPDATE vocabulary SET clarification = 'pet' WHERE key = 'the dog'")
            .execute(&pool)
            .await
            .unwrap();
        let state = load_sync_state(&pool).await.unwrap();
        assert!(state.cache_has_unsynced_writes());
    }

    #[tokio::test]
    async fn test_rolled_back_sync_leaves_metadata_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_cache(&temp_dir.path().join("data.db")).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        record_sync(&mut *tx, &BTreeMap::new()).await.unwrap();
        tx.rollback().await.unwrap();

        let state = load_sync_state(&pool).await.unwrap();
        assert_eq!(state.synced_at, None);
    }
}

//! Cache initialization (Schema Manager)
//!
//! Creates every table, index and bookkeeping trigger with
//! `CREATE ... IF NOT EXISTS`, so opening an existing cache is harmless.
//! The schema is fixed: an existing cache whose tables drifted from the
//! declarations in `table_schemas` is rejected rather than migrated.

use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};

/// Data tables in truncation order (dependents before `vocabulary`)
pub const DATA_TABLES: &[&str] = &[
    "translation_pair",
    "base_language",
    "pictures",
    "tts_overrides",
    "vocabulary",
    "minimal_pairs",
    "i18n_language_names",
    "i18n_ui_strings",
    "i18n_card_types",
];

/// Open the cache, creating the file and schema if needed
pub async fn open_cache(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = connect(db_path, true).await?;

    if newly_created {
        info!("Initialized new cache: {}", db_path.display());
    } else {
        info!("Opened existing cache: {}", db_path.display());
    }

    create_schema(&pool).await?;
    crate::db::table_schemas::verify_all_table_schemas(&pool).await?;

    Ok(pool)
}

/// Open a cache that must already exist
pub async fn open_existing_cache(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::CacheMissing(db_path.to_path_buf()));
    }
    open_cache(db_path).await
}

/// Single-connection pool: one writer, and foreign keys stay enabled on
/// the only connection there is
async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(create)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create all tables, indexes and triggers (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_vocabulary_table(pool).await?;
    create_base_language_table(pool).await?;
    create_translation_pair_table(pool).await?;
    create_pictures_table(pool).await?;
    create_tts_overrides_table(pool).await?;
    create_minimal_pairs_table(pool).await?;
    create_localization_tables(pool).await?;
    create_sync_tables(pool).await?;

    for table in DATA_TABLES {
        create_revision_triggers(pool, table).await?;
    }

    debug!("Cache schema ensured");
    Ok(())
}

async fn create_vocabulary_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vocabulary (
            key TEXT PRIMARY KEY NOT NULL,
            clarification TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_base_language_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS base_language (
            key TEXT NOT NULL REFERENCES vocabulary(key),
            locale TEXT NOT NULL,
            text TEXT NOT NULL DEFAULT '',
            ipa TEXT,
            audio TEXT,
            audio_source TEXT,
            PRIMARY KEY (key, locale)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_base_language_locale ON base_language(locale)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Translation pairs carry the learner-facing hints
///
/// `guid` is indexed but not unique: duplicates must survive import so the
/// duplicate check can report them.
async fn create_translation_pair_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS translation_pair (
            key TEXT NOT NULL REFERENCES vocabulary(key),
            source_locale TEXT NOT NULL,
            target_locale TEXT NOT NULL,
            guid TEXT NOT NULL,
            pronunciation_hint TEXT,
            spelling_hint TEXT,
            reading_hint TEXT,
            listening_hint TEXT,
            notes TEXT,
            PRIMARY KEY (key, source_locale, target_locale)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_translation_pair_guid ON translation_pair(guid)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_pictures_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pictures (
            key TEXT PRIMARY KEY NOT NULL REFERENCES vocabulary(key),
            picture TEXT,
            picture_source TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tts_overrides_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tts_overrides (
            key TEXT NOT NULL REFERENCES vocabulary(key),
            locale TEXT NOT NULL,
            tts_text TEXT,
            is_ssml INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            PRIMARY KEY (key, locale),
            CHECK (is_ssml IN (0, 1))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_minimal_pairs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS minimal_pairs (
            guid TEXT PRIMARY KEY NOT NULL,
            source_locale TEXT NOT NULL,
            target_locale TEXT NOT NULL,
            text1 TEXT,
            audio1 TEXT,
            ipa1 TEXT,
            meaning1 TEXT,
            text2 TEXT,
            audio2 TEXT,
            ipa2 TEXT,
            meaning2 TEXT,
            tags TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_localization_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS i18n_language_names (
            source_locale TEXT NOT NULL,
            target_locale TEXT NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY (source_locale, target_locale)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS i18n_ui_strings (
            locale TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (locale, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS i18n_card_types (
            locale TEXT NOT NULL,
            card_type TEXT NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY (locale, card_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Sync bookkeeping: last-sync evidence for both stores
async fn create_sync_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_metadata (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_file_hashes (
            file_name TEXT PRIMARY KEY NOT NULL,
            sha256 TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO sync_metadata (key, value) VALUES ('cache_revision', '0')")
        .execute(pool)
        .await?;

    Ok(())
}

/// Every write to a data table bumps `cache_revision`
///
/// Collaborators that edit the cache directly (audio generation, review
/// import, manual SQL) are tracked without having to cooperate.
async fn create_revision_triggers(pool: &SqlitePool, table: &str) -> Result<()> {
    for operation in ["INSERT", "UPDATE", "DELETE"] {
        let sql = format!(
            r#"
            CREATE TRIGGER IF NOT EXISTS {table}_{suffix}_revision
            AFTER {operation} ON {table}
            BEGIN
                UPDATE sync_metadata
                SET value = CAST(value AS INTEGER) + 1
                WHERE key = 'cache_revision';
            END
            "#,
            table = table,
            suffix = operation.to_lowercase(),
            operation = operation,
        );
        sqlx::query(&sql).execute(pool).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_cache_creates_all_tables() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_cache(&temp_dir.path().join("data.db")).await.unwrap();

        for table in DATA_TABLES.iter().chain(["sync_metadata", "sync_file_hashes"].iter()) {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert!(exists, "table {} missing", table);
        }
    }

    #[tokio::test]
    async fn test_open_cache_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.db");

        let pool = open_cache(&path).await.unwrap();
        sqlx::query("INSERT INTO vocabulary (key) VALUES ('the cat')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let pool = open_cache(&path).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vocabulary")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_writes_bump_cache_revision() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_cache(&temp_dir.path().join("data.db")).await.unwrap();

        sqlx::query("INSERT INTO vocabulary (key) VALUES ('the cat')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE vocabulary SET clarification = 'animal' WHERE key = 'the cat'")
            .execute(&pool)
            .await
            .unwrap();

        let revision: String =
            sqlx::query_scalar("SELECT value FROM sync_metadata WHERE key = 'cache_revision'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(revision, "2");
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_cache(&temp_dir.path().join("data.db")).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO base_language (key, locale, text) VALUES ('missing', 'en_us', 'x')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_open_existing_cache_requires_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = open_existing_cache(&temp_dir.path().join("absent.db")).await;
        assert!(matches!(result, Err(Error::CacheMissing(_))));
    }
}

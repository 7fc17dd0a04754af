//! Importer (CSV -> cache)
//!
//! Full reload in two phases:
//! 1. Read every file of the data directory into memory. Naming and header
//!    errors abort here, before the cache is touched.
//! 2. In one transaction: truncate every table, insert every family, check
//!    foreign keys, record the sync. Any failure rolls the whole load back,
//!    sync metadata included.

use crate::context::SyncContext;
use crate::services::freshness::{check_before_import, resolve, Decision, Outcome, SyncOptions};
use chrono::{DateTime, Utc};
use deckdata_common::db::{record_sync, DATA_TABLES};
use deckdata_common::tabular::{read_file, DataLayout, FileRows, LoadedFile};
use deckdata_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// What an import loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub files_read: Vec<String>,
    /// Table name -> row count after the load
    pub table_rows: BTreeMap<String, i64>,
    /// Rows dropped because a later row had the same identity
    pub collapsed_duplicates: usize,
    pub synced_at: DateTime<Utc>,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Imported {} file(s)", self.files_read.len())?;
        for (table, rows) in &self.table_rows {
            writeln!(f, "  {}: {} row(s)", table, rows)?;
        }
        if self.collapsed_duplicates > 0 {
            writeln!(
                f,
                "  {} duplicate row(s) collapsed (last one kept)",
                self.collapsed_duplicates
            )?;
        }
        Ok(())
    }
}

/// Import the CSV files of `data_dir` into the configured cache
pub async fn import(
    ctx: &SyncContext,
    data_dir: &Path,
    options: &SyncOptions,
) -> Result<Outcome<ImportSummary>> {
    // Naming errors must surface before the cache file is even created
    require_data_dir(data_dir)?;
    ctx.layout.scan(data_dir)?;
    let pool = ctx.open_cache().await?;
    let outcome = import_with_pool(&pool, &ctx.layout, data_dir, options).await;
    pool.close().await;
    outcome
}

/// Import into an already open cache
pub async fn import_with_pool(
    pool: &SqlitePool,
    layout: &DataLayout,
    data_dir: &Path,
    options: &SyncOptions,
) -> Result<Outcome<ImportSummary>> {
    require_data_dir(data_dir)?;
    let files = layout.scan(data_dir)?;

    if options.force {
        debug!("Import forced, skipping freshness check");
    } else {
        let report = check_before_import(pool, data_dir, layout).await?;
        if let Decision::Skip(conflict) = resolve(report.conflict, options, true)? {
            return Ok(Outcome::Skipped(conflict));
        }
    }

    // Phase 1: read everything
    let loaded = files.iter().map(read_file).collect::<Result<Vec<LoadedFile>>>()?;
    info!("Read {} CSV file(s) from {}", loaded.len(), data_dir.display());

    let collapsed_duplicates = count_collapsed_duplicates(&loaded);

    // Phase 2: replace the cache contents
    let mut tx = pool.begin().await?;

    for table in DATA_TABLES {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *tx)
            .await?;
    }

    // Vocabulary first so clarifications are set before any placeholder key
    let mut ordered: Vec<&LoadedFile> = loaded.iter().collect();
    ordered.sort_by_key(|f| !matches!(f.rows, FileRows::Vocabulary(_)));

    for file in &ordered {
        insert_rows(&mut *tx, &file.rows).await?;
        debug!("Loaded {} row(s) from {}", file.rows.len(), file.file.name);
    }

    check_foreign_keys(&mut *tx).await?;

    let mut table_rows = BTreeMap::new();
    for table in DATA_TABLES {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&mut *tx)
            .await?;
        table_rows.insert(table.to_string(), count);
    }

    let hashes: BTreeMap<String, String> = loaded
        .iter()
        .map(|f| (f.file.name.clone(), f.sha256.clone()))
        .collect();
    let synced_at = record_sync(&mut *tx, &hashes).await?;

    tx.commit().await?;

    info!(
        "Import complete: {} file(s), {} vocabulary key(s)",
        loaded.len(),
        table_rows.get("vocabulary").copied().unwrap_or_default()
    );

    Ok(Outcome::Done(ImportSummary {
        files_read: loaded.iter().map(|f| f.file.name.clone()).collect(),
        table_rows,
        collapsed_duplicates,
        synced_at,
    }))
}

/// An absent directory would otherwise import as an empty dataset
fn require_data_dir(data_dir: &Path) -> Result<()> {
    if data_dir.is_dir() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Data directory {} does not exist",
            data_dir.display()
        )))
    }
}

/// Rows that insert-or-replace will silently drop, per file
fn count_collapsed_duplicates(files: &[LoadedFile]) -> usize {
    let mut total = 0;
    for file in files {
        let identities = file.rows.identities();
        let unique: HashSet<&Vec<&str>> = identities.iter().collect();
        let collapsed = identities.len() - unique.len();
        if collapsed > 0 {
            warn!(
                "{}: {} row(s) share an identity with a later row and will be collapsed",
                file.file.name, collapsed
            );
            total += collapsed;
        }
    }
    total
}

async fn ensure_vocabulary_key(conn: &mut SqliteConnection, key: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO vocabulary (key) VALUES (?)")
        .bind(key)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn insert_rows(conn: &mut SqliteConnection, rows: &FileRows) -> Result<()> {
    match rows {
        FileRows::Vocabulary(rows) => {
            for row in rows {
                sqlx::query(
                    r#"
                    INSERT INTO vocabulary (key, clarification) VALUES (?, ?)
                    ON CONFLICT(key) DO UPDATE SET clarification = excluded.clarification
                    "#,
                )
                .bind(&row.key)
                .bind(&row.clarification)
                .execute(&mut *conn)
                .await?;
            }
        }
        FileRows::BaseLanguage(rows) => {
            for row in rows {
                ensure_vocabulary_key(conn, &row.key).await?;
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO base_language (key, locale, text, ipa, audio, audio_source)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&row.key)
                .bind(row.locale.as_str())
                .bind(&row.text)
                .bind(&row.ipa)
                .bind(&row.audio)
                .bind(&row.audio_source)
                .execute(&mut *conn)
                .await?;
            }
        }
        FileRows::TranslationPair(rows) => {
            for row in rows {
                ensure_vocabulary_key(conn, &row.key).await?;
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO translation_pair (
                        key, source_locale, target_locale, guid,
                        pronunciation_hint, spelling_hint, reading_hint, listening_hint, notes
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&row.key)
                .bind(row.source_locale.as_str())
                .bind(row.target_locale.as_str())
                .bind(&row.guid)
                .bind(&row.pronunciation_hint)
                .bind(&row.spelling_hint)
                .bind(&row.reading_hint)
                .bind(&row.listening_hint)
                .bind(&row.notes)
                .execute(&mut *conn)
                .await?;
            }
        }
        FileRows::Pictures(rows) => {
            for row in rows {
                ensure_vocabulary_key(conn, &row.key).await?;
                sqlx::query(
                    "INSERT OR REPLACE INTO pictures (key, picture, picture_source) VALUES (?, ?, ?)",
                )
                .bind(&row.key)
                .bind(&row.picture)
                .bind(&row.picture_source)
                .execute(&mut *conn)
                .await?;
            }
        }
        FileRows::TtsOverrides(rows) => {
            for row in rows {
                ensure_vocabulary_key(conn, &row.key).await?;
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO tts_overrides (key, locale, tts_text, is_ssml, notes)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&row.key)
                .bind(row.locale.as_str())
                .bind(&row.tts_text)
                .bind(row.is_ssml)
                .bind(&row.notes)
                .execute(&mut *conn)
                .await?;
            }
        }
        FileRows::MinimalPairs(rows) => {
            for row in rows {
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO minimal_pairs (
                        guid, source_locale, target_locale,
                        text1, audio1, ipa1, meaning1, text2, audio2, ipa2, meaning2, tags
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&row.guid)
                .bind(row.source_locale.as_str())
                .bind(row.target_locale.as_str())
                .bind(&row.text1)
                .bind(&row.audio1)
                .bind(&row.ipa1)
                .bind(&row.meaning1)
                .bind(&row.text2)
                .bind(&row.audio2)
                .bind(&row.ipa2)
                .bind(&row.meaning2)
                .bind(&row.tags)
                .execute(&mut *conn)
                .await?;
            }
        }
        FileRows::LanguageNames(rows) => {
            for row in rows {
                sqlx::query(
                    "INSERT OR REPLACE INTO i18n_language_names (source_locale, target_locale, name) VALUES (?, ?, ?)",
                )
                .bind(row.source_locale.as_str())
                .bind(row.target_locale.as_str())
                .bind(&row.name)
                .execute(&mut *conn)
                .await?;
            }
        }
        FileRows::UiStrings(rows) => {
            for row in rows {
                sqlx::query("INSERT OR REPLACE INTO i18n_ui_strings (locale, key, value) VALUES (?, ?, ?)")
                    .bind(row.locale.as_str())
                    .bind(&row.key)
                    .bind(&row.value)
                    .execute(&mut *conn)
                    .await?;
            }
        }
        FileRows::CardTypes(rows) => {
            for row in rows {
                sqlx::query(
                    "INSERT OR REPLACE INTO i18n_card_types (locale, card_type, name) VALUES (?, ?, ?)",
                )
                .bind(row.locale.as_str())
                .bind(&row.card_type)
                .bind(&row.name)
                .execute(&mut *conn)
                .await?;
            }
        }
    }

    Ok(())
}

/// Fail when any row references a missing parent
async fn check_foreign_keys(conn: &mut SqliteConnection) -> Result<()> {
    let violations = sqlx::query("PRAGMA foreign_key_check")
        .fetch_all(&mut *conn)
        .await?;

    if violations.is_empty() {
        return Ok(());
    }

    let mut per_table: BTreeMap<String, usize> = BTreeMap::new();
    for row in &violations {
        let table: String = row.try_get(0)?;
        *per_table.entry(table).or_default() += 1;
    }

    let details = per_table
        .iter()
        .map(|(table, count)| format!("{} ({} row(s))", table, count))
        .collect::<Vec<_>>()
        .join(", ");

    Err(Error::Integrity(format!(
        "rows reference missing vocabulary keys: {}",
        details
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckdata_common::db::open_cache;
    use std::fs;
    use tempfile::TempDir;

    fn write_dataset(dir: &Path) {
        fs::write(
            dir.join("625_words-base-en_us.csv"),
            "key,text:en,ipa:en,audio:en,audio source:en,tags:en\n\
             the cat,the cat,/ðə kæt/,,,AnkiLangs::EN\n\
             the dog,the dog,/ðə dɒɡ/,,,AnkiLangs::EN\n",
        )
        .unwrap();
        fs::write(
            dir.join("625_words-vocabulary.csv"),
            "key,clarification\nthe cat,\nthe dog,domestic animal\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_import_loads_rows_and_records_sync() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        fs::create_dir(&data_dir).unwrap();
        write_dataset(&data_dir);

        let pool = open_cache(&temp_dir.path().join("data.db")).await.unwrap();
        let summary = import_with_pool(&pool, &DataLayout::default(), &data_dir, &SyncOptions::default())
            .await
            .unwrap()
            .done()
            .unwrap();

        assert_eq!(summary.files_read.len(), 2);
        assert_eq!(summary.table_rows["vocabulary"], 2);
        assert_eq!(summary.table_rows["base_language"], 2);
        assert_eq!(summary.collapsed_duplicates, 0);

        let clarification: Option<String> =
            sqlx::query_scalar("SELECT clarification FROM vocabulary WHERE key = 'the dog'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(clarification.as_deref(), Some("domestic animal"));

        let state = deckdata_common::db::load_sync_state(&pool).await.unwrap();
        assert!(!state.cache_has_unsynced_writes());
        assert_eq!(state.file_hashes.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicates_are_counted() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        fs::create_dir(&data_dir).unwrap();
        fs::write(
            data_dir.join("625_words-pictures.csv"),
            "key,picture,picture source\nthe cat,a.jpg,\nthe cat,b.jpg,\n",
        )
        .unwrap();

        let pool = open_cache(&temp_dir.path().join("data.db")).await.unwrap();
        let summary = import_with_pool(&pool, &DataLayout::default(), &data_dir, &SyncOptions::default())
            .await
            .unwrap()
            .done()
            .unwrap();

        assert_eq!(summary.collapsed_duplicates, 1);
        let picture: Option<String> = sqlx::query_scalar("SELECT picture FROM pictures")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(picture.as_deref(), Some("b.jpg"));
    }

    #[tokio::test]
    async fn test_header_error_leaves_cache_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        fs::create_dir(&data_dir).unwrap();
        write_dataset(&data_dir);

        let pool = open_cache(&temp_dir.path().join("data.db")).await.unwrap();
        import_with_pool(&pool, &DataLayout::default(), &data_dir, &SyncOptions::default())
            .await
            .unwrap();

        fs::write(
            data_dir.join("625_words-base-es_es.csv"),
            "key,ipa:es\nthe cat,/el ˈɣato/\n",
        )
        .unwrap();
        let result =
            import_with_pool(&pool, &DataLayout::default(), &data_dir, &SyncOptions::default()).await;
        assert!(matches!(result, Err(Error::Schema { .. })));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM base_language")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_missing_data_dir_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_cache(&temp_dir.path().join("data.db")).await.unwrap();
        let result = import_with_pool(
            &pool,
            &DataLayout::default(),
            &temp_dir.path().join("absent"),
            &SyncOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}

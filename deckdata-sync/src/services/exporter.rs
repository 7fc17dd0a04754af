//! Exporter (cache -> CSV)
//!
//! Regenerates every file family from the cache. A family file is written
//! when the cache holds rows for it, or when the file already exists in the
//! output directory (it is then rewritten, possibly header-only). The
//! vocabulary file lists every key, including keys only implied by
//! dependent rows. Output bytes depend only on the cache contents.

use crate::context::SyncContext;
use crate::services::freshness::{check_before_export, resolve, Decision, Outcome, SyncOptions};
use chrono::{DateTime, Utc};
use deckdata_common::db::models::{
    BaseLanguageRow, CardTypeRow, LanguageNameRow, MinimalPairRow, PictureRow, TranslationPairRow,
    TtsOverrideRow, UiStringRow, VocabularyRow,
};
use deckdata_common::db::record_sync;
use deckdata_common::tabular::{render_file, sha256_bytes, DataLayout, FileKind, FileRows, StagedWrite};
use deckdata_common::{Locale, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// What an export wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub files_written: Vec<String>,
    pub rows_written: usize,
    pub synced_at: DateTime<Utc>,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Exported {} row(s) to {} file(s)",
            self.rows_written,
            self.files_written.len()
        )?;
        for name in &self.files_written {
            writeln!(f, "  {}", name)?;
        }
        Ok(())
    }
}

/// Export the configured cache to `out_dir`
pub async fn export(
    ctx: &SyncContext,
    out_dir: &Path,
    options: &SyncOptions,
) -> Result<Outcome<ExportSummary>> {
    let pool = ctx.open_existing_cache().await?;
    let outcome =
        export_with_pool(&pool, &ctx.layout, &ctx.settings.tag_prefix, out_dir, options).await;
    pool.close().await;
    outcome
}

/// Export from an already open cache
pub async fn export_with_pool(
    pool: &SqlitePool,
    layout: &DataLayout,
    tag_prefix: &str,
    out_dir: &Path,
    options: &SyncOptions,
) -> Result<Outcome<ExportSummary>> {
    let existing = layout.scan(out_dir)?;

    if options.force {
        debug!("Export forced, skipping freshness check");
    } else {
        let report = check_before_export(pool, out_dir, layout).await?;
        if let Decision::Skip(conflict) = resolve(report.conflict, options, true)? {
            return Ok(Outcome::Skipped(conflict));
        }
    }

    let mut files = load_families(pool).await?;

    // Existing files are always rewritten so a family emptied in the cache
    // does not leave stale rows behind
    for file in existing {
        files.entry(file.kind.clone()).or_insert_with(|| empty_rows(&file.kind));
    }

    let mut staged = StagedWrite::new();
    let mut hashes = BTreeMap::new();
    let mut rows_written = 0;

    for (kind, rows) in &files {
        let path = layout.file_path(out_dir, kind);
        let bytes = render_file(kind, rows, tag_prefix)?;
        staged.stage(&path, &bytes)?;
        hashes.insert(layout.file_name(kind), sha256_bytes(&bytes));
        rows_written += rows.len();
        debug!("Rendered {} row(s) for {}", rows.len(), kind);
    }

    let committed = staged.commit()?;
    info!("Wrote {} file(s) to {}", committed.len(), out_dir.display());

    let mut tx = pool.begin().await?;
    let synced_at = record_sync(&mut *tx, &hashes).await?;
    tx.commit().await?;

    Ok(Outcome::Done(ExportSummary {
        files_written: hashes.into_keys().collect(),
        rows_written,
        synced_at,
    }))
}

fn empty_rows(kind: &FileKind) -> FileRows {
    match kind {
        FileKind::BaseLanguage { .. } => FileRows::BaseLanguage(Vec::new()),
        FileKind::TranslationPair { .. } => FileRows::TranslationPair(Vec::new()),
        FileKind::Vocabulary => FileRows::Vocabulary(Vec::new()),
        FileKind::Pictures => FileRows::Pictures(Vec::new()),
        FileKind::TtsOverrides => FileRows::TtsOverrides(Vec::new()),
        FileKind::MinimalPairs { .. } => FileRows::MinimalPairs(Vec::new()),
        FileKind::LanguageNames => FileRows::LanguageNames(Vec::new()),
        FileKind::UiStrings => FileRows::UiStrings(Vec::new()),
        FileKind::CardTypes => FileRows::CardTypes(Vec::new()),
    }
}

/// Every family the cache holds rows for
async fn load_families(pool: &SqlitePool) -> Result<BTreeMap<FileKind, FileRows>> {
    let mut files = BTreeMap::new();

    let base: Vec<BaseLanguageRow> = sqlx::query_as(
        "SELECT key, locale, text, ipa, audio, audio_source FROM base_language",
    )
    .fetch_all(pool)
    .await?;
    let mut by_locale: BTreeMap<Locale, Vec<BaseLanguageRow>> = BTreeMap::new();
    for row in base {
        by_locale.entry(row.locale.clone()).or_default().push(row);
    }
    for (locale, rows) in by_locale {
        files.insert(FileKind::BaseLanguage { locale }, FileRows::BaseLanguage(rows));
    }

    let pairs: Vec<TranslationPairRow> = sqlx::query_as(
        r#"
        SELECT key, source_locale, target_locale, guid,
               pronunciation_hint, spelling_hint, reading_hint, listening_hint, notes
        FROM translation_pair
        "#,
    )
    .fetch_all(pool)
    .await?;
    let mut by_pair: BTreeMap<(Locale, Locale), Vec<TranslationPairRow>> = BTreeMap::new();
    for row in pairs {
        by_pair
            .entry((row.source_locale.clone(), row.target_locale.clone()))
            .or_default()
            .push(row);
    }
    for ((source, target), rows) in by_pair {
        files.insert(
            FileKind::TranslationPair { source, target },
            FileRows::TranslationPair(rows),
        );
    }

    // Every key, including those only implied by dependent rows
    let vocabulary: Vec<VocabularyRow> =
        sqlx::query_as("SELECT key, clarification FROM vocabulary")
            .fetch_all(pool)
            .await?;
    if !vocabulary.is_empty() {
        files.insert(FileKind::Vocabulary, FileRows::Vocabulary(vocabulary));
    }

    let pictures: Vec<PictureRow> =
        sqlx::query_as("SELECT key, picture, picture_source FROM pictures")
            .fetch_all(pool)
            .await?;
    if !pictures.is_empty() {
        files.insert(FileKind::Pictures, FileRows::Pictures(pictures));
    }

    let tts: Vec<TtsOverrideRow> =
        sqlx::query_as("SELECT key, locale, tts_text, is_ssml, notes FROM tts_overrides")
            .fetch_all(pool)
            .await?;
    if !tts.is_empty() {
        files.insert(FileKind::TtsOverrides, FileRows::TtsOverrides(tts));
    }

    let minimal_pairs: Vec<MinimalPairRow> = sqlx::query_as(
        r#"
        SELECT guid, source_locale, target_locale,
               text1, audio1, ipa1, meaning1, text2, audio2, ipa2, meaning2, tags
        FROM minimal_pairs
        "#,
    )
    .fetch_all(pool)
    .await?;
    let mut by_pair: BTreeMap<(Locale, Locale), Vec<MinimalPairRow>> = BTreeMap::new();
    for row in minimal_pairs {
        by_pair
            .entry((row.source_locale.clone(), row.target_locale.clone()))
            .or_default()
            .push(row);
    }
    for ((source, target), rows) in by_pair {
        files.insert(
            FileKind::MinimalPairs { source, target },
            FileRows::MinimalPairs(rows),
        );
    }

    let names: Vec<LanguageNameRow> =
        sqlx::query_as("SELECT source_locale, target_locale, name FROM i18n_language_names")
            .fetch_all(pool)
            .await?;
    if !names.is_empty() {
        files.insert(FileKind::LanguageNames, FileRows::LanguageNames(names));
    }

    let ui_strings: Vec<UiStringRow> =
        sqlx::query_as("SELECT locale, key, value FROM i18n_ui_strings")
            .fetch_all(pool)
            .await?;
    if !ui_strings.is_empty() {
        files.insert(FileKind::UiStrings, FileRows::UiStrings(ui_strings));
    }

    let card_types: Vec<CardTypeRow> =
        sqlx::query_as("SELECT locale, card_type, name FROM i18n_card_types")
            .fetch_all(pool)
            .await?;
    if !card_types.is_empty() {
        files.insert(FileKind::CardTypes, FileRows::CardTypes(card_types));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckdata_common::db::{load_sync_state, open_cache};
    use std::fs;
    use tempfile::TempDir;

    async fn seeded_pool(temp_dir: &TempDir) -> SqlitePool {
        let pool = open_cache(&temp_dir.path().join("data.db")).await.unwrap();
        for sql in [
            "INSERT INTO vocabulary (key) VALUES ('the cat'), ('The dog')",
            "INSERT INTO base_language (key, locale, text) VALUES ('the cat', 'en_us', 'the cat')",
            "INSERT INTO base_language (key, locale, text) VALUES ('The dog', 'en_us', 'The dog')",
            "INSERT INTO base_language (key, locale, text) VALUES ('the cat', 'es_es', 'el gato')",
            "INSERT INTO translation_pair (key, source_locale, target_locale, guid) VALUES ('the cat', 'en_us', 'es_es', 'g1')",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_export_writes_families_and_records_sync() {
        let temp_dir = TempDir::new().unwrap();
        let pool = seeded_pool(&temp_dir).await;
        let out_dir = temp_dir.path().join("out");

        let summary = export_with_pool(
            &pool,
            &DataLayout::default(),
            "AnkiLangs",
            &out_dir,
            &SyncOptions::default(),
        )
        .await
        .unwrap()
        .done()
        .unwrap();

        assert_eq!(
            summary.files_written,
            vec![
                "625_words-base-en_us.csv".to_string(),
                "625_words-base-es_es.csv".to_string(),
                "625_words-from-en_us-to-es_es.csv".to_string(),
                "625_words-vocabulary.csv".to_string(),
            ]
        );
        assert_eq!(summary.rows_written, 6);
        assert_eq!(
            fs::read_to_string(out_dir.join("625_words-base-en_us.csv")).unwrap(),
            "key,text:en,ipa:en,audio:en,audio source:en,tags:en\n\
             the cat,the cat,,,,AnkiLangs::EN\n\
             The dog,The dog,,,,AnkiLangs::EN\n"
        );
        assert_eq!(
            fs::read_to_string(out_dir.join("625_words-vocabulary.csv")).unwrap(),
            "key,clarification\nthe cat,\nThe dog,\n"
        );

        let state = load_sync_state(&pool).await.unwrap();
        assert!(!state.cache_has_unsynced_writes());
        assert_eq!(state.file_hashes.len(), 4);
    }

    #[tokio::test]
    async fn test_existing_file_without_rows_is_rewritten_header_only() {
        let temp_dir = TempDir::new().unwrap();
        let pool = seeded_pool(&temp_dir).await;
        let out_dir = temp_dir.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(out_dir.join("625_words-pictures.csv"), "key,picture,picture source\nold,x,\n").unwrap();

        export_with_pool(
            &pool,
            &DataLayout::default(),
            "AnkiLangs",
            &out_dir,
            &SyncOptions::forced(),
        )
        .await
        .unwrap();

        assert_eq!(
            fs::read_to_string(out_dir.join("625_words-pictures.csv")).unwrap(),
            "key,picture,picture source\n"
        );
    }

    #[tokio::test]
    async fn test_edited_csv_aborts_export() {
        let temp_dir = TempDir::new().unwrap();
        let pool = seeded_pool(&temp_dir).await;
        let out_dir = temp_dir.path().join("out");
        let layout = DataLayout::default();

        export_with_pool(&pool, &layout, "AnkiLangs", &out_dir, &SyncOptions::default())
            .await
            .unwrap();

        let edited = out_dir.join("625_words-base-es_es.csv");
        fs::write(&edited, "key,text:es\nthe cat,el gatito\n").unwrap();

        let outcome = export_with_pool(&pool, &layout, "AnkiLangs", &out_dir, &SyncOptions::default())
            .await
            .unwrap();
        assert!(outcome.is_skipped());
        assert_eq!(
            fs::read_to_string(&edited).unwrap(),
            "key,text:es\nthe cat,el gatito\n"
        );
    }
}

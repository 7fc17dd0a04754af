//! Table Schema Definitions
//!
//! Declared columns for every cache table. `init` creates the tables; these
//! declarations are what an opened cache is verified against.

use crate::db::schema_check::{ColumnDefinition, SchemaVerifier, TableSchema};
use crate::Result;
use sqlx::SqlitePool;
use tracing::debug;

pub struct VocabularyTableSchema;

impl TableSchema for VocabularyTableSchema {
    fn table_name() -> &'static str {
        "vocabulary"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("key", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("clarification", "TEXT"),
        ]
    }
}

pub struct BaseLanguageTableSchema;

impl TableSchema for BaseLanguageTableSchema {
    fn table_name() -> &'static str {
        "base_language"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("key", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("locale", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("text", "TEXT").not_null(),
            ColumnDefinition::new("ipa", "TEXT"),
            ColumnDefinition::new("audio", "TEXT"),
            ColumnDefinition::new("audio_source", "TEXT"),
        ]
    }
}

pub struct TranslationPairTableSchema;

impl TableSchema for TranslationPairTableSchema {
    fn table_name() -> &'static str {
        "translation_pair"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("key", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("source_locale", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("target_locale", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("guid", "TEXT").not_null(),
            ColumnDefinition::new("pronunciation_hint", "TEXT"),
            ColumnDefinition::new("spelling_hint", "TEXT"),
            ColumnDefinition::new("reading_hint", "TEXT"),
            ColumnDefinition::new("listening_hint", "TEXT"),
            ColumnDefinition::new("notes", "TEXT"),
        ]
    }
}

pub struct PicturesTableSchema;

impl TableSchema for PicturesTableSchema {
    fn table_name() -> &'static str {
        "pictures"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("key", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("picture", "TEXT"),
            ColumnDefinition::new("picture_source", "TEXT"),
        ]
    }
}

pub struct TtsOverridesTableSchema;

impl TableSchema for TtsOverridesTableSchema {
    fn table_name() -> &'static str {
        "tts_overrides"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("key", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("locale", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("tts_text", "TEXT"),
            ColumnDefinition::new("is_ssml", "INTEGER").not_null(),
            ColumnDefinition::new("notes", "TEXT"),
        ]
    }
}

pub struct MinimalPairsTableSchema;

impl TableSchema for MinimalPairsTableSchema {
    fn table_name() -> &'static str {
        "minimal_pairs"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        let mut columns = vec![
            ColumnDefinition::new("guid", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("source_locale", "TEXT").not_null(),
            ColumnDefinition::new("target_locale", "TEXT").not_null(),
        ];
        for side in ["1", "2"] {
            for field in ["text", "audio", "ipa", "meaning"] {
                columns.push(ColumnDefinition::new(format!("{}{}", field, side), "TEXT"));
            }
        }
        columns.push(ColumnDefinition::new("tags", "TEXT"));
        columns
    }
}

pub struct LanguageNamesTableSchema;

impl TableSchema for LanguageNamesTableSchema {
    fn table_name() -> &'static str {
        "i18n_language_names"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("source_locale", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("target_locale", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("name", "TEXT").not_null(),
        ]
    }
}

pub struct UiStringsTableSchema;

impl TableSchema for UiStringsTableSchema {
    fn table_name() -> &'static str {
        "i18n_ui_strings"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("locale", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("key", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("value", "TEXT").not_null(),
        ]
    }
}

pub struct CardTypesTableSchema;

impl TableSchema for CardTypesTableSchema {
    fn table_name() -> &'static str {
        "i18n_card_types"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("locale", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("card_type", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("name", "TEXT").not_null(),
        ]
    }
}

pub struct SyncMetadataTableSchema;

impl TableSchema for SyncMetadataTableSchema {
    fn table_name() -> &'static str {
        "sync_metadata"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("key", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("value", "TEXT"),
        ]
    }
}

pub struct SyncFileHashesTableSchema;

impl TableSchema for SyncFileHashesTableSchema {
    fn table_name() -> &'static str {
        "sync_file_hashes"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("file_name", "TEXT").primary_key().not_null(),
            ColumnDefinition::new("sha256", "TEXT").not_null(),
        ]
    }
}

/// Verify every cache table against its declaration
pub async fn verify_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    SchemaVerifier::verify_table::<VocabularyTableSchema>(pool).await?;
    SchemaVerifier::verify_table::<BaseLanguageTableSchema>(pool).await?;
    SchemaVerifier::verify_table::<TranslationPairTableSchema>(pool).await?;
    SchemaVerifier::verify_table::<PicturesTableSchema>(pool).await?;
    SchemaVerifier::verify_table::<TtsOverridesTableSchema>(pool).await?;
    SchemaVerifier::verify_table::<MinimalPairsTableSchema>(pool).await?;
    SchemaVerifier::verify_table::<LanguageNamesTableSchema>(pool).await?;
    SchemaVerifier::verify_table::<UiStringsTableSchema>(pool).await?;
    SchemaVerifier::verify_table::<CardTypesTableSchema>(pool).await?;
    SchemaVerifier::verify_table::<SyncMetadataTableSchema>(pool).await?;
    SchemaVerifier::verify_table::<SyncFileHashesTableSchema>(pool).await?;

    debug!("All cache tables match their declarations");
    Ok(())
}

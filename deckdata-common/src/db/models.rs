//! Cache row models
//!
//! One struct per table. The CSV reader produces these, the importer binds
//! them, the exporter reads them back with `FromRow` and the CSV writer
//! renders them. Optional columns are `None` when the CSV cell is empty.

use crate::Locale;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct VocabularyRow {
    pub key: String,
    pub clarification: Option<String>,
}

/// Realization of a vocabulary item in one locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct BaseLanguageRow {
    pub key: String,
    #[sqlx(try_from = "String")]
    pub locale: Locale,
    /// Empty for placeholder rows
    pub text: String,
    pub ipa: Option<String>,
    /// `[sound:<file>]` pointer
    pub audio: Option<String>,
    pub audio_source: Option<String>,
}

/// A vocabulary item paired between two locales
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TranslationPairRow {
    pub key: String,
    #[sqlx(try_from = "String")]
    pub source_locale: Locale,
    #[sqlx(try_from = "String")]
    pub target_locale: Locale,
    /// Stable across re-imports; the join key for card generation and review
    pub guid: String,
    pub pronunciation_hint: Option<String>,
    pub spelling_hint: Option<String>,
    pub reading_hint: Option<String>,
    pub listening_hint: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PictureRow {
    pub key: String,
    pub picture: Option<String>,
    pub picture_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TtsOverrideRow {
    pub key: String,
    #[sqlx(try_from = "String")]
    pub locale: Locale,
    pub tts_text: Option<String>,
    /// `tts_text` is an SSML directive rather than plain text
    pub is_ssml: bool,
    pub notes: Option<String>,
}

/// A pair of near-homophones; keyed by its own guid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct MinimalPairRow {
    pub guid: String,
    #[sqlx(try_from = "String")]
    pub source_locale: Locale,
    #[sqlx(try_from = "String")]
    pub target_locale: Locale,
    pub text1: Option<String>,
    pub audio1: Option<String>,
    pub ipa1: Option<String>,
    pub meaning1: Option<String>,
    pub text2: Option<String>,
    pub audio2: Option<String>,
    pub ipa2: Option<String>,
    pub meaning2: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LanguageNameRow {
    #[sqlx(try_from = "String")]
    pub source_locale: Locale,
    #[sqlx(try_from = "String")]
    pub target_locale: Locale,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UiStringRow {
    #[sqlx(try_from = "String")]
    pub locale: Locale,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CardTypeRow {
    #[sqlx(try_from = "String")]
    pub locale: Locale,
    pub card_type: String,
    pub name: String,
}

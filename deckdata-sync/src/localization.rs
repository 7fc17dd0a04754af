//! Localization lookup tables
//!
//! Language names, UI strings and card-type names are loaded from the cache
//! into memory once. Lookups fall back to the `en_us` entry; the handle only
//! changes through an explicit [`LocalizationTables::reload`].

use deckdata_common::db::models::{CardTypeRow, LanguageNameRow, UiStringRow};
use deckdata_common::{Locale, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::debug;

/// Locale used when a translation is missing
pub const FALLBACK_LOCALE: &str = "en_us";

#[derive(Debug, Clone, Default)]
pub struct LocalizationTables {
    /// (locale the name is written in, locale named) -> name
    language_names: HashMap<(String, String), String>,
    /// (locale, key) -> value
    ui_strings: HashMap<(String, String), String>,
    /// (locale, card type) -> name
    card_types: HashMap<(String, String), String>,
}

impl LocalizationTables {
    /// Load all three tables from the cache
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let language_names: Vec<LanguageNameRow> =
            sqlx::query_as("SELECT source_locale, target_locale, name FROM i18n_language_names")
                .fetch_all(pool)
                .await?;
        let ui_strings: Vec<UiStringRow> =
            sqlx::query_as("SELECT locale, key, value FROM i18n_ui_strings")
                .fetch_all(pool)
                .await?;
        let card_types: Vec<CardTypeRow> =
            sqlx::query_as("SELECT locale, card_type, name FROM i18n_card_types")
                .fetch_all(pool)
                .await?;

        let tables = Self {
            language_names: language_names
                .into_iter()
                .map(|r| ((String::from(r.source_locale), String::from(r.target_locale)), r.name))
                .collect(),
            ui_strings: ui_strings
                .into_iter()
                .map(|r| ((String::from(r.locale), r.key), r.value))
                .collect(),
            card_types: card_types
                .into_iter()
                .map(|r| ((String::from(r.locale), r.card_type), r.name))
                .collect(),
        };

        debug!(
            "Loaded localization: {} language names, {} UI strings, {} card types",
            tables.language_names.len(),
            tables.ui_strings.len(),
            tables.card_types.len()
        );
        Ok(tables)
    }

    /// Replace the contents with the cache's current tables
    pub async fn reload(&mut self, pool: &SqlitePool) -> Result<()> {
        *self = Self::load(pool).await?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.language_names.is_empty() && self.ui_strings.is_empty() && self.card_types.is_empty()
    }

    /// Name of `named` written in `locale`
    pub fn language_name(&self, locale: &Locale, named: &Locale) -> Option<&str> {
        lookup(&self.language_names, locale, named.as_str())
    }

    pub fn ui_string(&self, locale: &Locale, key: &str) -> Option<&str> {
        lookup(&self.ui_strings, locale, key)
    }

    pub fn card_type_name(&self, locale: &Locale, card_type: &str) -> Option<&str> {
        lookup(&self.card_types, locale, card_type)
    }
}

fn lookup<'a>(
    table: &'a HashMap<(String, String), String>,
    locale: &Locale,
    key: &str,
) -> Option<&'a str> {
    table
        .get(&(locale.as_str().to_string(), key.to_string()))
        .or_else(|| table.get(&(FALLBACK_LOCALE.to_string(), key.to_string())))
        .map(String::as_str)
}

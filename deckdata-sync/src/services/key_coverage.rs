//! Key coverage
//!
//! Every vocabulary key should have a row in every base-language locale and
//! every translation pair present in the cache, so translators see the gap
//! as an empty cell. Missing rows are computed first, then inserted in one
//! transaction.

use deckdata_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::fmt;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverageSummary {
    /// Base-language rows added with empty text
    pub placeholders_added: usize,
    /// Translation-pair rows added with a fresh guid
    pub pairs_added: usize,
}

impl fmt::Display for CoverageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Added {} placeholder base row(s) and {} translation pair row(s)",
            self.placeholders_added, self.pairs_added
        )
    }
}

/// Fill in missing base-language and translation-pair rows
pub async fn ensure_key_coverage(pool: &SqlitePool) -> Result<CoverageSummary> {
    let missing_base: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT v.key, l.locale
        FROM vocabulary v
        CROSS JOIN (SELECT DISTINCT locale FROM base_language) l
        WHERE NOT EXISTS (
            SELECT 1 FROM base_language b WHERE b.key = v.key AND b.locale = l.locale
        )
        ORDER BY l.locale, v.key
        "#,
    )
    .fetch_all(pool)
    .await?;

    let missing_pairs: Vec<(String, String, String)> = sqlx::query_as(
        r#"
        SELECT v.key, p.source_locale, p.target_locale
        FROM vocabulary v
        CROSS JOIN (SELECT DISTINCT source_locale, target_locale FROM translation_pair) p
        WHERE NOT EXISTS (
            SELECT 1 FROM translation_pair tp
            WHERE tp.key = v.key
              AND tp.source_locale = p.source_locale
              AND tp.target_locale = p.target_locale
        )
        ORDER BY p.source_locale, p.target_locale, v.key
        "#,
    )
    .fetch_all(pool)
    .await?;

    if missing_base.is_empty() && missing_pairs.is_empty() {
        info!("Key coverage complete, nothing to add");
        return Ok(CoverageSummary::default());
    }

    let mut tx = pool.begin().await?;

    for (key, locale) in &missing_base {
        sqlx::query("INSERT INTO base_language (key, locale, text) VALUES (?, ?, '')")
            .bind(key)
            .bind(locale)
            .execute(&mut *tx)
            .await?;
    }

    for (key, source, target) in &missing_pairs {
        sqlx::query(
            "INSERT INTO translation_pair (key, source_locale, target_locale, guid) VALUES (?, ?, ?, ?)",
        )
        .bind(key)
        .bind(source)
        .bind(target)
        .bind(Uuid::new_v4().to_string())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let summary = CoverageSummary {
        placeholders_added: missing_base.len(),
        pairs_added: missing_pairs.len(),
    };
    info!(
        "Key coverage: added {} placeholder(s), {} pair row(s)",
        summary.placeholders_added, summary.pairs_added
    );
    Ok(summary)
}

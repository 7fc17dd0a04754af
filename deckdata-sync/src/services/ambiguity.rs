//! Lexical-ambiguity check
//!
//! Within one translation pair, two keys whose source texts are identical
//! cannot be told apart on the source side of a card unless a
//! pronunciation hint distinguishes them. Identical target texts likewise
//! need reading and listening hints. A group is flagged for a hint only
//! when every member lacks it; one hinted member is enough to disambiguate.
//! Spelling hints are never required.

use deckdata_common::tabular::{collate, DataLayout, FileKind};
use deckdata_common::{Locale, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::fmt;
use tracing::{debug, info};

/// Side of the pair whose text is shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSide {
    Source,
    Target,
}

impl fmt::Display for TextSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextSide::Source => write!(f, "source"),
            TextSide::Target => write!(f, "target"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    Pronunciation,
    Reading,
    Listening,
}

impl fmt::Display for HintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HintKind::Pronunciation => write!(f, "pronunciation hint"),
            HintKind::Reading => write!(f, "reading hint"),
            HintKind::Listening => write!(f, "listening hint"),
        }
    }
}

/// A homonym group with at least one missing hint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ambiguity {
    pub text: String,
    pub side: TextSide,
    /// In export collation order
    pub keys: Vec<String>,
    pub missing: Vec<HintKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairAmbiguities {
    /// Translation-pair file name
    pub file: String,
    pub source: Locale,
    pub target: Locale,
    pub ambiguities: Vec<Ambiguity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AmbiguityReport {
    /// Only pairs with at least one ambiguity
    pub pairs: Vec<PairAmbiguities>,
}

impl AmbiguityReport {
    pub fn is_clean(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn total(&self) -> usize {
        self.pairs.iter().map(|p| p.ambiguities.len()).sum()
    }
}

impl fmt::Display for AmbiguityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return writeln!(f, "No ambiguous texts");
        }
        for pair in &self.pairs {
            writeln!(f, "{}:", pair.file)?;
            for ambiguity in &pair.ambiguities {
                let missing = ambiguity
                    .missing
                    .iter()
                    .map(|m| m.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    f,
                    "  {} text '{}' shared by {}; missing {}",
                    ambiguity.side,
                    ambiguity.text,
                    ambiguity.keys.join(", "),
                    missing
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SourceGroup {
    text: String,
    keys: String,
    members: i64,
    without_pronunciation: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct TargetGroup {
    text: String,
    keys: String,
    members: i64,
    without_reading: i64,
    without_listening: i64,
}

/// Find homonym groups lacking hints, for every pair in the cache
pub async fn find_ambiguities(pool: &SqlitePool, layout: &DataLayout) -> Result<AmbiguityReport> {
    let pairs: Vec<(String, String)> = sqlx::query_as(
        "SELECT DISTINCT source_locale, target_locale FROM translation_pair ORDER BY 1, 2",
    )
    .fetch_all(pool)
    .await?;

    let mut report = AmbiguityReport::default();

    for (source, target) in pairs {
        let source: Locale = source.parse()?;
        let target: Locale = target.parse()?;
        let ambiguities = find_pair_ambiguities(pool, &source, &target).await?;

        let file = layout.file_name(&FileKind::TranslationPair {
            source: source.clone(),
            target: target.clone(),
        });
        debug!("{}: {} ambiguous group(s)", file, ambiguities.len());

        if !ambiguities.is_empty() {
            report.pairs.push(PairAmbiguities {
                file,
                source,
                target,
                ambiguities,
            });
        }
    }

    info!(
        "Ambiguity check: {} group(s) in {} pair(s)",
        report.total(),
        report.pairs.len()
    );
    Ok(report)
}

/// Homonym groups lacking hints within one pair
pub async fn find_pair_ambiguities(
    pool: &SqlitePool,
    source: &Locale,
    target: &Locale,
) -> Result<Vec<Ambiguity>> {
    let source_groups: Vec<SourceGroup> = sqlx::query_as(
        r#"
        SELECT
            b.text AS text,
            json_group_array(tp.key) AS keys,
            COUNT(*) AS members,
            SUM(CASE WHEN COALESCE(tp.pronunciation_hint, '') = '' THEN 1 ELSE 0 END)
                AS without_pronunciation
        FROM translation_pair tp
        JOIN base_language b ON b.key = tp.key AND b.locale = tp.source_locale
        WHERE tp.source_locale = ? AND tp.target_locale = ?
          AND b.text IS NOT NULL AND b.text <> ''
        GROUP BY b.text
        HAVING COUNT(*) > 1
        "#,
    )
    .bind(source.as_str())
    .bind(target.as_str())
    .fetch_all(pool)
    .await?;

    let target_groups: Vec<TargetGroup> = sqlx::query_as(
        r#"
        SELECT
            b.text AS text,
            json_group_array(tp.key) AS keys,
            COUNT(*) AS members,
            SUM(CASE WHEN COALESCE(tp.reading_hint, '') = '' THEN 1 ELSE 0 END)
                AS without_reading,
            SUM(CASE WHEN COALESCE(tp.listening_hint, '') = '' THEN 1 ELSE 0 END)
                AS without_listening
        FROM translation_pair tp
        JOIN base_language b ON b.key = tp.key AND b.locale = tp.target_locale
        WHERE tp.source_locale = ? AND tp.target_locale = ?
          AND b.text IS NOT NULL AND b.text <> ''
        GROUP BY b.text
        HAVING COUNT(*) > 1
        "#,
    )
    .bind(source.as_str())
    .bind(target.as_str())
    .fetch_all(pool)
    .await?;

    let mut ambiguities = Vec::new();

    for group in source_groups {
        if group.without_pronunciation == group.members {
            ambiguities.push(Ambiguity {
                text: group.text,
                side: TextSide::Source,
                keys: sorted_keys(&group.keys)?,
                missing: vec![HintKind::Pronunciation],
            });
        }
    }

    for group in target_groups {
        let mut missing = Vec::new();
        if group.without_reading == group.members {
            missing.push(HintKind::Reading);
        }
        if group.without_listening == group.members {
            missing.push(HintKind::Listening);
        }
        if !missing.is_empty() {
            ambiguities.push(Ambiguity {
                text: group.text,
                side: TextSide::Target,
                keys: sorted_keys(&group.keys)?,
                missing,
            });
        }
    }

    ambiguities.sort_by(|a, b| a.side.cmp(&b.side).then_with(|| collate(&a.text, &b.text)));
    Ok(ambiguities)
}

fn sorted_keys(json: &str) -> Result<Vec<String>> {
    let mut keys: Vec<String> =
        serde_json::from_str(json).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    keys.sort_by(|a, b| collate(a, b));
    Ok(keys)
}

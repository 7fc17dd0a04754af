//! Analysis orchestration
//!
//! Analyses run on the cache, so the cache must first exist and reflect the
//! CSV files. A missing cache is imported; a stale one is re-imported
//! unless that would discard unsynced cache writes, in which case the
//! caller's options decide.

use crate::context::SyncContext;
use crate::services::ambiguity::{find_ambiguities, AmbiguityReport};
use crate::services::audio_consistency::{check_audio, AudioReport};
use crate::services::duplicates::{find_duplicate_identities, DuplicateReport};
use crate::services::freshness::{
    check_before_import, resolve, ConflictResolution, Decision, FreshnessReport, Outcome,
    SyncOptions,
};
use crate::services::importer::import_with_pool;
use deckdata_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::fmt;
use tracing::{info, warn};

/// How the cache was brought up to date before analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePreparation {
    /// Cache matched the CSV files
    UpToDate,
    /// Cache did not exist and was imported
    Imported,
    /// CSV files changed and were re-imported
    Reimported,
    /// CSV files changed but the conflict was ignored; results reflect the
    /// cache as it was
    Stale,
}

impl fmt::Display for CachePreparation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachePreparation::UpToDate => write!(f, "cache up to date"),
            CachePreparation::Imported => write!(f, "cache created from CSV files"),
            CachePreparation::Reimported => write!(f, "cache refreshed from changed CSV files"),
            CachePreparation::Stale => write!(f, "cache is stale, CSV changes not analysed"),
        }
    }
}

/// Combined analysis results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub cache: CachePreparation,
    /// Freshness as found before any re-import
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<FreshnessReport>,
    pub duplicates: DuplicateReport,
    pub ambiguities: AmbiguityReport,
    /// None when no media directory exists
    pub audio: Option<AudioReport>,
}

impl CheckReport {
    /// No finding in any analysis
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_clean()
            && self.ambiguities.is_clean()
            && self.audio.as_ref().map_or(true, AudioReport::is_consistent)
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Cache: {}", self.cache)?;
        writeln!(f)?;
        writeln!(f, "== Duplicate identities")?;
        write!(f, "{}", self.duplicates)?;
        writeln!(f)?;
        writeln!(f, "== Ambiguous texts")?;
        write!(f, "{}", self.ambiguities)?;
        writeln!(f)?;
        writeln!(f, "== Audio references")?;
        match &self.audio {
            Some(audio) => write!(f, "{}", audio)?,
            None => writeln!(f, "Skipped: no media directory")?,
        }
        Ok(())
    }
}

/// Bring the cache up to date, then run every analysis
pub async fn run_checks(
    ctx: &SyncContext,
    options: &SyncOptions,
    auto_fix: bool,
) -> Result<Outcome<CheckReport>> {
    let settings = &ctx.settings;
    if !settings.data_dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "Data directory {} does not exist",
            settings.data_dir.display()
        )));
    }

    let cache_existed = settings.cache_path.exists();
    let pool = ctx.open_cache().await?;

    let outcome = run_checks_with_pool(ctx, &pool, cache_existed, options, auto_fix).await;
    pool.close().await;
    outcome
}

async fn run_checks_with_pool(
    ctx: &SyncContext,
    pool: &SqlitePool,
    cache_existed: bool,
    options: &SyncOptions,
    auto_fix: bool,
) -> Result<Outcome<CheckReport>> {
    let data_dir = &ctx.settings.data_dir;

    let (cache, freshness) = if !cache_existed {
        info!("No cache yet, importing {}", data_dir.display());
        import_with_pool(pool, &ctx.layout, data_dir, &SyncOptions::forced()).await?;
        (CachePreparation::Imported, None)
    } else {
        let report = check_before_import(pool, data_dir, &ctx.layout).await?;
        let preparation = if report.changed_files.is_empty() {
            CachePreparation::UpToDate
        } else if options.force || report.conflict.is_none() {
            import_with_pool(pool, &ctx.layout, data_dir, &SyncOptions::forced()).await?;
            CachePreparation::Reimported
        } else {
            match resolve(report.conflict.clone(), options, true)? {
                Decision::Proceed => {
                    import_with_pool(pool, &ctx.layout, data_dir, &SyncOptions::forced()).await?;
                    CachePreparation::Reimported
                }
                Decision::Skip(_) if options.on_conflict == ConflictResolution::Ignore => {
                    CachePreparation::Stale
                }
                Decision::Skip(conflict) => return Ok(Outcome::Skipped(conflict)),
            }
        };
        (preparation, Some(report))
    };

    let duplicates = find_duplicate_identities(&ctx.layout, data_dir)?;
    let ambiguities = find_ambiguities(pool, &ctx.layout).await?;

    let media_dir = &ctx.settings.media_dir;
    let audio = if media_dir.is_dir() {
        Some(check_audio(pool, media_dir, auto_fix).await?)
    } else {
        warn!(
            "Media directory {} not found, skipping audio check",
            media_dir.display()
        );
        None
    };

    let report = CheckReport {
        cache,
        freshness,
        duplicates,
        ambiguities,
        audio,
    };
    info!("Checks complete: {}", if report.is_clean() { "clean" } else { "findings reported" });
    Ok(Outcome::Done(report))
}

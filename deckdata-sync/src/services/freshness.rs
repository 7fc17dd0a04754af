//! Freshness and conflict detection
//!
//! Import overwrites the cache and export overwrites the CSV files. Before
//! either runs, the recorded evidence of the last sync is compared with the
//! current state of the store about to be overwritten:
//! - import: `cache_revision` advanced past `synced_revision`
//! - export: a CSV file's SHA-256 differs from the recorded one
//!
//! Resolution is a caller decision expressed as [`SyncOptions`]; nothing
//! here prompts.

use chrono::{DateTime, Utc};
use deckdata_common::db::load_sync_state;
use deckdata_common::tabular::{sha256_file, DataLayout};
use deckdata_common::{ConflictSide, Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// What to do when a conflict is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Leave both stores untouched
    #[default]
    Abort,
    /// Proceed, discarding the other side's unsaved state
    Overwrite,
    /// Correct nothing: mutating operations are skipped, analyses run on
    /// the cache as it is
    Ignore,
}

/// Caller intent for a sync operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOptions {
    /// Skip detection entirely (same as choosing overwrite)
    pub force: bool,
    /// A conflict is an error, whatever `on_conflict` says
    pub strict: bool,
    pub on_conflict: ConflictResolution,
}

impl SyncOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn resolving(on_conflict: ConflictResolution) -> Self {
        Self {
            on_conflict,
            ..Self::default()
        }
    }
}

/// How a CSV file differs from the last sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Modified,
    /// Not part of the last sync
    Added,
    /// Recorded at the last sync, now absent
    Removed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Added => write!(f, "added"),
            FileStatus::Removed => write!(f, "removed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub name: String,
    pub status: FileStatus,
}

/// A detected divergence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncConflict {
    /// The store holding the edits that would be lost
    pub side: ConflictSide,
    pub details: String,
}

impl fmt::Display for SyncConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsaved changes in {} ({})", self.side, self.details)
    }
}

impl From<SyncConflict> for Error {
    fn from(conflict: SyncConflict) -> Self {
        Error::SyncConflict {
            side: conflict.side,
            details: conflict.details,
        }
    }
}

/// Result of a freshness check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreshnessReport {
    pub synced_at: Option<DateTime<Utc>>,
    /// CSV files that differ from the last sync
    pub changed_files: Vec<FileChange>,
    /// Writes to the cache since the last sync
    pub unsynced_cache_writes: i64,
    pub conflict: Option<SyncConflict>,
}

impl FreshnessReport {
    pub fn is_fresh(&self) -> bool {
        self.changed_files.is_empty() && self.unsynced_cache_writes == 0
    }
}

impl fmt::Display for FreshnessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.synced_at {
            Some(at) => writeln!(f, "Last sync: {}", at.to_rfc3339())?,
            None => writeln!(f, "Last sync: never")?,
        }
        if self.unsynced_cache_writes > 0 {
            writeln!(
                f,
                "Cache: {} write(s) since last sync",
                self.unsynced_cache_writes
            )?;
        }
        for change in &self.changed_files {
            writeln!(f, "  {} ({})", change.name, change.status)?;
        }
        if self.is_fresh() {
            writeln!(f, "CSV files and cache are in sync")?;
        }
        if let Some(conflict) = &self.conflict {
            writeln!(f, "Conflict: {}", conflict)?;
        }
        Ok(())
    }
}

/// Result of an operation that may have been skipped by a conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Outcome<T> {
    Done(T),
    Skipped(SyncConflict),
}

impl<T> Outcome<T> {
    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }
}

/// Whether to go ahead after a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Skip(SyncConflict),
}

/// Apply the caller's options to a detected conflict
///
/// `mutating` operations are skipped under `Ignore`; analyses proceed.
pub fn resolve(
    conflict: Option<SyncConflict>,
    options: &SyncOptions,
    mutating: bool,
) -> Result<Decision> {
    let Some(conflict) = conflict else {
        return Ok(Decision::Proceed);
    };

    if options.strict {
        return Err(conflict.into());
    }

    match options.on_conflict {
        ConflictResolution::Abort => {
            warn!("Aborted: {}", conflict);
            Ok(Decision::Skip(conflict))
        }
        ConflictResolution::Overwrite => {
            warn!("Overwriting despite conflict: {}", conflict);
            Ok(Decision::Proceed)
        }
        ConflictResolution::Ignore if mutating => {
            warn!("Ignored conflict, nothing changed: {}", conflict);
            Ok(Decision::Skip(conflict))
        }
        ConflictResolution::Ignore => {
            warn!("Ignored conflict, using the cache as it is: {}", conflict);
            Ok(Decision::Proceed)
        }
    }
}

/// Compare the CSV files of `dir` with the hashes recorded at the last sync
async fn changed_files(pool: &SqlitePool, dir: &Path, layout: &DataLayout) -> Result<Vec<FileChange>> {
    let state = load_sync_state(pool).await?;
    let files = layout.scan(dir)?;

    let mut changes = Vec::new();
    let mut present = BTreeSet::new();

    for file in &files {
        present.insert(file.name.as_str());
        let current = sha256_file(&file.path)?;
        match state.file_hashes.get(&file.name) {
            Some(recorded) if *recorded == current => {}
            Some(_) => changes.push(FileChange {
                name: file.name.clone(),
                status: FileStatus::Modified,
            }),
            None => changes.push(FileChange {
                name: file.name.clone(),
                status: FileStatus::Added,
            }),
        }
    }

    for name in state.file_hashes.keys() {
        if !present.contains(name.as_str()) {
            changes.push(FileChange {
                name: name.clone(),
                status: FileStatus::Removed,
            });
        }
    }

    changes.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("{} CSV file(s) differ from the last sync", changes.len());
    Ok(changes)
}

/// Check before replacing the cache with the CSV files of `data_dir`
///
/// Changed CSV files are reported but are not a conflict: they are what the
/// import is for. Writes to the cache since the last sync are.
pub async fn check_before_import(
    pool: &SqlitePool,
    data_dir: &Path,
    layout: &DataLayout,
) -> Result<FreshnessReport> {
    let state = load_sync_state(pool).await?;
    let changed_files = changed_files(pool, data_dir, layout).await?;
    let unsynced = (state.cache_revision - state.synced_revision).max(0);

    let conflict = state.cache_has_unsynced_writes().then(|| SyncConflict {
        side: ConflictSide::Cache,
        details: match state.synced_at {
            Some(at) => format!(
                "{} write(s) to the cache since the last sync at {}",
                unsynced,
                at.to_rfc3339()
            ),
            None => format!("{} write(s) to a cache that was never synced", unsynced),
        },
    });

    info!(
        "Pre-import check: {} changed file(s), {} unsynced cache write(s)",
        changed_files.len(),
        unsynced
    );

    Ok(FreshnessReport {
        synced_at: state.synced_at,
        changed_files,
        unsynced_cache_writes: unsynced,
        conflict,
    })
}

/// Check before overwriting the CSV files of `out_dir` from the cache
///
/// Any recognized file that was edited, or never recorded, is a conflict. A
/// recorded file that was deleted also is, unless the directory holds no
/// deck files at all (a fresh export target).
pub async fn check_before_export(
    pool: &SqlitePool,
    out_dir: &Path,
    layout: &DataLayout,
) -> Result<FreshnessReport> {
    let state = load_sync_state(pool).await?;
    let changed_files = changed_files(pool, out_dir, layout).await?;
    let unsynced = (state.cache_revision - state.synced_revision).max(0);

    let target_is_empty = layout.scan(out_dir)?.is_empty();

    let conflicting: Vec<&FileChange> = if target_is_empty {
        Vec::new()
    } else {
        changed_files.iter().collect()
    };

    let conflict = (!conflicting.is_empty()).then(|| SyncConflict {
        side: ConflictSide::Tabular,
        details: conflicting
            .iter()
            .map(|c| format!("{} {}", c.name, c.status))
            .collect::<Vec<_>>()
            .join(", "),
    });

    info!(
        "Pre-export check: {} changed file(s) in {}",
        conflicting.len(),
        out_dir.display()
    );

    Ok(FreshnessReport {
        synced_at: state.synced_at,
        changed_files,
        unsynced_cache_writes: unsynced,
        conflict,
    })
}

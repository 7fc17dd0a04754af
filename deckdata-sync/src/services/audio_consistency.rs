//! Audio-reference consistency
//!
//! Audio lives under `<media_dir>/<lang_REGION>/<file>` and is referenced
//! from the cache as `[sound:<file>]`. Two kinds of drift are detected:
//! pointers whose file is absent, and audio files no row references.
//!
//! Problems with individual items (unreadable directory, malformed pointer)
//! are reported alongside the findings; they never abort the check.

use deckdata_common::{Error, Locale, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File extensions treated as audio
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "wav", "m4a", "flac"];

const POINTER_PREFIX: &str = "[sound:";
const POINTER_SUFFIX: &str = "]";

/// A `[sound:<file>]` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AudioPointer {
    file_name: String,
}

impl AudioPointer {
    /// Pointer to a bare file name; path separators and `..` are rejected
    pub fn new(file_name: impl Into<String>) -> Option<Self> {
        let file_name = file_name.into();
        let valid = !file_name.trim().is_empty()
            && !file_name.contains('/')
            && !file_name.contains('\\')
            && !file_name.contains("..");
        valid.then_some(Self { file_name })
    }

    /// Parse the stored form
    pub fn parse(value: &str) -> Option<Self> {
        value
            .trim()
            .strip_prefix(POINTER_PREFIX)?
            .strip_suffix(POINTER_SUFFIX)
            .and_then(Self::new)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl fmt::Display for AudioPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", POINTER_PREFIX, self.file_name, POINTER_SUFFIX)
    }
}

/// Row holding an audio pointer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum AudioOwner {
    BaseLanguage { locale: Locale, key: String },
    /// Minimal-pair audio belongs to the pair's target locale
    MinimalPair { locale: Locale, guid: String, slot: u8 },
}

impl AudioOwner {
    pub fn locale(&self) -> &Locale {
        match self {
            AudioOwner::BaseLanguage { locale, .. } | AudioOwner::MinimalPair { locale, .. } => locale,
        }
    }
}

impl fmt::Display for AudioOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioOwner::BaseLanguage { locale, key } => write!(f, "'{}' ({})", key, locale),
            AudioOwner::MinimalPair { locale, guid, slot } => {
                write!(f, "minimal pair {} audio{} ({})", guid, slot, locale)
            }
        }
    }
}

/// A pointer whose file is absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingAudio {
    pub owner: AudioOwner,
    pub pointer: AudioPointer,
    /// Cell value as stored, which may differ from the canonical pointer
    pub stored: String,
    pub expected_path: PathBuf,
}

/// An audio file no row references
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanedAudio {
    pub locale: Locale,
    pub file_name: String,
    pub path: PathBuf,
}

impl OrphanedAudio {
    fn display_name(&self) -> String {
        format!("{}/{}", self.locale.directory_name(), self.file_name)
    }
}

/// An item the check could not evaluate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioProblem {
    pub subject: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FixAction {
    ClearedPointer { owner: AudioOwner, pointer: AudioPointer },
    DeletedFile { path: PathBuf, name: String },
}

impl fmt::Display for FixAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixAction::ClearedPointer {
                owner: AudioOwner::BaseLanguage { key, .. },
                ..
            } => write!(f, "Cleared audio for '{}'", key),
            FixAction::ClearedPointer { owner, .. } => write!(f, "Cleared audio for {}", owner),
            FixAction::DeletedFile { name, .. } => write!(f, "Deleted {}", name),
        }
    }
}

/// Outcome of one auto-fix item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixResult {
    pub action: FixAction,
    /// None on success
    pub error: Option<String>,
}

impl FixResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudioReport {
    pub missing: Vec<MissingAudio>,
    pub orphaned: Vec<OrphanedAudio>,
    pub problems: Vec<AudioProblem>,
    /// Empty unless auto-fix was requested
    pub fixes: Vec<FixResult>,
}

impl AudioReport {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty() && self.problems.is_empty()
    }
}

impl fmt::Display for AudioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_consistent() && self.fixes.is_empty() {
            return writeln!(f, "Audio references are consistent");
        }

        if !self.missing.is_empty() {
            writeln!(f, "AUDIO FILES IN DATABASE BUT NOT ON DISK ({})", self.missing.len())?;
            for missing in &self.missing {
                writeln!(f, "  {} -> {}", missing.owner, missing.pointer)?;
            }
        }

        if !self.orphaned.is_empty() {
            writeln!(f, "AUDIO FILES ON DISK BUT NOT IN DATABASE ({})", self.orphaned.len())?;
            for orphan in &self.orphaned {
                writeln!(f, "  {}", orphan.display_name())?;
            }
        }

        if !self.problems.is_empty() {
            writeln!(f, "PROBLEMS ({})", self.problems.len())?;
            for problem in &self.problems {
                writeln!(f, "  {}: {}", problem.subject, problem.reason)?;
            }
        }

        for fix in &self.fixes {
            match &fix.error {
                None => writeln!(f, "{}", fix.action)?,
                Some(error) => writeln!(f, "FAILED: {}: {}", fix.action, error)?,
            }
        }
        Ok(())
    }
}

/// Compare the cache's audio pointers with the files under `media_dir`
pub async fn check_audio(pool: &SqlitePool, media_dir: &Path, auto_fix: bool) -> Result<AudioReport> {
    if !media_dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "Media directory {} does not exist",
            media_dir.display()
        )));
    }

    let mut report = AudioReport::default();
    let mut referenced: HashSet<(Locale, String)> = HashSet::new();

    for (owner, value) in load_references(pool).await? {
        let Some(pointer) = AudioPointer::parse(&value) else {
            report.problems.push(AudioProblem {
                subject: owner.to_string(),
                reason: format!("malformed audio pointer '{}'", value),
            });
            continue;
        };

        let expected_path = media_dir
            .join(owner.locale().directory_name())
            .join(pointer.file_name());
        referenced.insert((owner.locale().clone(), pointer.file_name().to_string()));

        if !expected_path.is_file() {
            report.missing.push(MissingAudio {
                owner,
                pointer,
                stored: value,
                expected_path,
            });
        }
    }

    scan_orphans(media_dir, &referenced, &mut report);

    report
        .orphaned
        .sort_by(|a, b| (&a.locale, &a.file_name).cmp(&(&b.locale, &b.file_name)));

    info!(
        "Audio check: {} missing, {} orphaned, {} problem(s)",
        report.missing.len(),
        report.orphaned.len(),
        report.problems.len()
    );

    if auto_fix {
        report.fixes = apply_fixes(pool, &report).await;
    }

    Ok(report)
}

/// Every non-NULL pointer, in a stable order
async fn load_references(pool: &SqlitePool) -> Result<Vec<(AudioOwner, String)>> {
    let mut references = Vec::new();

    let base: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT locale, key, audio FROM base_language WHERE audio IS NOT NULL AND audio <> '' ORDER BY locale, key",
    )
    .fetch_all(pool)
    .await?;
    for (locale, key, audio) in base {
        references.push((
            AudioOwner::BaseLanguage {
                locale: locale.parse()?,
                key,
            },
            audio,
        ));
    }

    let pairs: Vec<(String, String, Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT target_locale, guid, audio1, audio2 FROM minimal_pairs ORDER BY target_locale, guid",
    )
    .fetch_all(pool)
    .await?;
    for (locale, guid, audio1, audio2) in pairs {
        let locale: Locale = locale.parse()?;
        for (slot, audio) in [(1u8, audio1), (2u8, audio2)] {
            if let Some(audio) = audio.filter(|a| !a.is_empty()) {
                references.push((
                    AudioOwner::MinimalPair {
                        locale: locale.clone(),
                        guid: guid.clone(),
                        slot,
                    },
                    audio,
                ));
            }
        }
    }

    Ok(references)
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Audio files one level below `media_dir`, in locale directories only
fn scan_orphans(media_dir: &Path, referenced: &HashSet<(Locale, String)>, report: &mut AudioReport) {
    let walker = WalkDir::new(media_dir)
        .follow_links(false)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let subject = e
                    .path()
                    .unwrap_or(media_dir)
                    .display()
                    .to_string();
                warn!("Cannot read {}: {}", subject, e);
                report.problems.push(AudioProblem {
                    subject,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || !is_audio_file(path) {
            continue;
        }

        let Some(locale) = path
            .parent()
            .and_then(|dir| dir.file_name())
            .and_then(|n| n.to_str())
            .and_then(Locale::from_directory_name)
        else {
            debug!("Skipping {} outside a locale directory", path.display());
            continue;
        };

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            report.problems.push(AudioProblem {
                subject: path.display().to_string(),
                reason: "file name is not valid UTF-8".to_string(),
            });
            continue;
        };

        if !referenced.contains(&(locale.clone(), file_name.clone())) {
            report.orphaned.push(OrphanedAudio {
                locale,
                file_name,
                path: path.to_path_buf(),
            });
        }
    }
}

/// Clear each dangling pointer and delete each orphan, independently
async fn apply_fixes(pool: &SqlitePool, report: &AudioReport) -> Vec<FixResult> {
    let mut fixes = Vec::new();

    for missing in &report.missing {
        let error = clear_pointer(pool, &missing.owner, &missing.stored)
            .await
            .err()
            .map(|e| e.to_string());
        fixes.push(FixResult {
            action: FixAction::ClearedPointer {
                owner: missing.owner.clone(),
                pointer: missing.pointer.clone(),
            },
            error,
        });
    }

    for orphan in &report.orphaned {
        let error = fs::remove_file(&orphan.path).err().map(|e| e.to_string());
        fixes.push(FixResult {
            action: FixAction::DeletedFile {
                path: orphan.path.clone(),
                name: orphan.display_name(),
            },
            error,
        });
    }

    let failed = fixes.iter().filter(|f| !f.succeeded()).count();
    if failed > 0 {
        warn!("Audio auto-fix: {} of {} item(s) failed", failed, fixes.len());
    } else {
        info!("Audio auto-fix: {} item(s) fixed", fixes.len());
    }
    fixes
}

/// Clear one pointer, matching the stored cell exactly so a row edited
/// since the check is left alone
async fn clear_pointer(pool: &SqlitePool, owner: &AudioOwner, stored: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    let result = match owner {
        AudioOwner::BaseLanguage { locale, key } => {
            sqlx::query(
                "UPDATE base_language SET audio = NULL, audio_source = NULL WHERE key = ? AND locale = ? AND audio = ?",
            )
            .bind(key)
            .bind(locale.as_str())
            .bind(stored)
            .execute(&mut *tx)
            .await?
        }
        AudioOwner::MinimalPair { guid, slot, .. } => {
            let sql = match slot {
                1 => "UPDATE minimal_pairs SET audio1 = NULL WHERE guid = ? AND audio1 = ?",
                _ => "UPDATE minimal_pairs SET audio2 = NULL WHERE guid = ? AND audio2 = ?",
            };
            sqlx::query(sql)
                .bind(guid)
                .bind(stored)
                .execute(&mut *tx)
                .await?
        }
    };

    if result.rows_affected() != 1 {
        return Err(Error::Integrity(format!(
            "expected to clear one audio pointer for {}, cleared {}",
            owner,
            result.rows_affected()
        )));
    }

    tx.commit().await?;
    Ok(())
}

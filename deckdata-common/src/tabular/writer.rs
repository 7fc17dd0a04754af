//! CSV writer
//!
//! Output is a pure function of the rows: canonical header, rows sorted by
//! identity, `\n` line endings, quoting only where needed, UTF-8. Base
//! language files get their tags column regenerated from the locale.
//!
//! Files are written as `<name>.tmp` siblings first and only renamed into
//! place once every file of the export has been staged.

use crate::tabular::layout::FileKind;
use crate::tabular::reader::{canonical_header, FileRows};
use crate::tabular::{sort_rows, TabularRow};
use crate::{Error, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn cell(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// Render a file's rows in export form
pub fn render_file(kind: &FileKind, rows: &FileRows, tag_prefix: &str) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(canonical_header(kind))?;

    match rows {
        FileRows::BaseLanguage(rows) => {
            let tag = match kind {
                FileKind::BaseLanguage { locale } => locale.tag(tag_prefix),
                _ => String::new(),
            };
            for row in &sorted(rows) {
                writer.write_record([
                    row.key.as_str(),
                    row.text.as_str(),
                    cell(&row.ipa),
                    cell(&row.audio),
                    cell(&row.audio_source),
                    tag.as_str(),
                ])?;
            }
        }
        FileRows::TranslationPair(rows) => {
            for row in &sorted(rows) {
                writer.write_record([
                    row.key.as_str(),
                    row.guid.as_str(),
                    cell(&row.pronunciation_hint),
                    cell(&row.spelling_hint),
                    cell(&row.reading_hint),
                    cell(&row.listening_hint),
                    cell(&row.notes),
                ])?;
            }
        }
        FileRows::Vocabulary(rows) => {
            for row in &sorted(rows) {
                writer.write_record([row.key.as_str(), cell(&row.clarification)])?;
            }
        }
        FileRows::Pictures(rows) => {
            for row in &sorted(rows) {
                writer.write_record([
                    row.key.as_str(),
                    cell(&row.picture),
                    cell(&row.picture_source),
                ])?;
            }
        }
        FileRows::TtsOverrides(rows) => {
            for row in &sorted(rows) {
                writer.write_record([
                    row.key.as_str(),
                    row.locale.as_str(),
                    cell(&row.tts_text),
                    if row.is_ssml { "1" } else { "0" },
                    cell(&row.notes),
                ])?;
            }
        }
        FileRows::MinimalPairs(rows) => {
            for row in &sorted(rows) {
                writer.write_record([
                    row.guid.as_str(),
                    cell(&row.text1),
                    cell(&row.audio1),
                    cell(&row.ipa1),
                    cell(&row.meaning1),
                    cell(&row.text2),
                    cell(&row.audio2),
                    cell(&row.ipa2),
                    cell(&row.meaning2),
                    cell(&row.tags),
                ])?;
            }
        }
        FileRows::LanguageNames(rows) => {
            for row in &sorted(rows) {
                writer.write_record([
                    row.source_locale.as_str(),
                    row.target_locale.as_str(),
                    row.name.as_str(),
                ])?;
            }
        }
        FileRows::UiStrings(rows) => {
            for row in &sorted(rows) {
                writer.write_record([row.locale.as_str(), row.key.as_str(), row.value.as_str()])?;
            }
        }
        FileRows::CardTypes(rows) => {
            for row in &sorted(rows) {
                writer.write_record([row.locale.as_str(), row.card_type.as_str(), row.name.as_str()])?;
            }
        }
    }

    writer
        .into_inner()
        .map_err(|e| Error::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
}

fn sorted<T: TabularRow + Clone>(rows: &[T]) -> Vec<T> {
    let mut rows = rows.to_vec();
    sort_rows(&mut rows);
    rows
}

/// A set of files written to temporary siblings, pending rename
///
/// Dropping an uncommitted set removes its temporary files.
#[derive(Debug, Default)]
pub struct StagedWrite {
    /// (temporary path, final path)
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagedWrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Write `bytes` to a temporary sibling of `path`
    pub fn stage(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| Error::InvalidInput(format!("Not a file path: {}", path.display())))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.flush()?;
            file.sync_all()?;
        }

        debug!("Staged {}", tmp.display());
        self.staged.push((tmp, path.to_path_buf()));
        Ok(())
    }

    /// Move every staged file into place
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let staged = std::mem::take(&mut self.staged);
        let mut committed = Vec::with_capacity(staged.len());

        for (i, (tmp, dest)) in staged.iter().enumerate() {
            if let Err(e) = atomic_rename(tmp, dest) {
                self.staged = staged[i..].to_vec();
                return Err(e);
            }
            committed.push(dest.clone());
        }

        Ok(committed)
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        for (tmp, _) in &self.staged {
            if let Err(e) = fs::remove_file(tmp) {
                warn!("Failed to remove staged file {}: {}", tmp.display(), e);
            }
        }
    }
}

fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to)?;
    sync_parent_dir(to)?;
    Ok(())
}

fn sync_parent_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            let dir = fs::File::open(parent)?;
            dir.sync_all()?;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

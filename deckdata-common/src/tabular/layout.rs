//! Data directory layout
//!
//! File names embed the family and its locales. Each file is classified
//! once per scan into a [`TabularFile`]; readers and writers work from the
//! resulting [`FileKind`] and never inspect names again.

use crate::{Error, Locale, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Sub-directory holding the localization tables
pub const I18N_DIR: &str = "i18n";

const TTS_OVERRIDES_FILE: &str = "tts_overrides.csv";
const MINIMAL_PAIRS_PREFIX: &str = "minimal_pairs-from-";
const LANGUAGE_NAMES_FILE: &str = "language_names.csv";
const UI_STRINGS_FILE: &str = "ui_strings.csv";
const CARD_TYPES_FILE: &str = "card_types.csv";

/// File family, with the locales encoded in the file name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum FileKind {
    BaseLanguage { locale: Locale },
    TranslationPair { source: Locale, target: Locale },
    Vocabulary,
    Pictures,
    TtsOverrides,
    MinimalPairs { source: Locale, target: Locale },
    LanguageNames,
    UiStrings,
    CardTypes,
}

impl FileKind {
    /// Identity column names, as reported by the duplicate check
    pub fn identity_columns(&self) -> &'static [&'static str] {
        match self {
            FileKind::TtsOverrides => &["key", "locale"],
            FileKind::MinimalPairs { .. } => &["guid"],
            FileKind::LanguageNames => &["source_locale", "target_locale"],
            FileKind::UiStrings => &["locale", "key"],
            FileKind::CardTypes => &["locale", "card_type"],
            _ => &["key"],
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::BaseLanguage { locale } => write!(f, "base language {}", locale),
            FileKind::TranslationPair { source, target } => {
                write!(f, "translation pair {} -> {}", source, target)
            }
            FileKind::Vocabulary => write!(f, "vocabulary"),
            FileKind::Pictures => write!(f, "pictures"),
            FileKind::TtsOverrides => write!(f, "TTS overrides"),
            FileKind::MinimalPairs { source, target } => {
                write!(f, "minimal pairs {} -> {}", source, target)
            }
            FileKind::LanguageNames => write!(f, "language names"),
            FileKind::UiStrings => write!(f, "UI strings"),
            FileKind::CardTypes => write!(f, "card types"),
        }
    }
}

/// A classified CSV file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularFile {
    pub kind: FileKind,
    pub path: PathBuf,
    /// Path relative to the data directory, `/` separated
    pub name: String,
}

/// Naming conventions of one deck's data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    deck_name: String,
}

impl DataLayout {
    pub fn new(deck_name: impl Into<String>) -> Self {
        Self {
            deck_name: deck_name.into(),
        }
    }

    pub fn deck_name(&self) -> &str {
        &self.deck_name
    }

    /// Relative file name for a family (`/` separated)
    pub fn file_name(&self, kind: &FileKind) -> String {
        match kind {
            FileKind::BaseLanguage { locale } => format!("{}-base-{}.csv", self.deck_name, locale),
            FileKind::TranslationPair { source, target } => {
                format!("{}-from-{}-to-{}.csv", self.deck_name, source, target)
            }
            FileKind::Vocabulary => format!("{}-vocabulary.csv", self.deck_name),
            FileKind::Pictures => format!("{}-pictures.csv", self.deck_name),
            FileKind::TtsOverrides => TTS_OVERRIDES_FILE.to_string(),
            FileKind::MinimalPairs { source, target } => {
                format!("{}{}_to_{}.csv", MINIMAL_PAIRS_PREFIX, source, target)
            }
            FileKind::LanguageNames => format!("{}/{}", I18N_DIR, LANGUAGE_NAMES_FILE),
            FileKind::UiStrings => format!("{}/{}", I18N_DIR, UI_STRINGS_FILE),
            FileKind::CardTypes => format!("{}/{}", I18N_DIR, CARD_TYPES_FILE),
        }
    }

    /// Path of a family's file under `data_dir`
    pub fn file_path(&self, data_dir: &Path, kind: &FileKind) -> PathBuf {
        self.file_name(kind)
            .split('/')
            .fold(data_dir.to_path_buf(), |path, part| path.join(part))
    }

    /// Typed handle for a family's file under `data_dir`
    pub fn tabular_file(&self, data_dir: &Path, kind: FileKind) -> TabularFile {
        TabularFile {
            path: self.file_path(data_dir, &kind),
            name: self.file_name(&kind),
            kind,
        }
    }

    /// Classify a relative file name
    ///
    /// `Ok(None)` for files outside the deck's families. A name that starts
    /// like a family but does not parse is a schema error.
    pub fn classify(&self, name: &str) -> Result<Option<FileKind>> {
        if let Some(file) = name.strip_prefix(&format!("{}/", I18N_DIR)) {
            return Ok(match file {
                LANGUAGE_NAMES_FILE => Some(FileKind::LanguageNames),
                UI_STRINGS_FILE => Some(FileKind::UiStrings),
                CARD_TYPES_FILE => Some(FileKind::CardTypes),
                _ => None,
            });
        }

        if name.contains('/') {
            return Ok(None);
        }

        let Some(stem) = name.strip_suffix(".csv") else {
            return Ok(None);
        };

        if name == TTS_OVERRIDES_FILE {
            return Ok(Some(FileKind::TtsOverrides));
        }

        if let Some(pair) = stem.strip_prefix(MINIMAL_PAIRS_PREFIX) {
            let (source, target) = pair
                .split_once("_to_")
                .ok_or_else(|| Error::schema(name, "expected minimal_pairs-from-<src>_to_<tgt>.csv"))?;
            return Ok(Some(FileKind::MinimalPairs {
                source: parse_file_locale(name, source)?,
                target: parse_file_locale(name, target)?,
            }));
        }

        let Some(rest) = stem.strip_prefix(&format!("{}-", self.deck_name)) else {
            return Ok(None);
        };

        if let Some(locale) = rest.strip_prefix("base-") {
            return Ok(Some(FileKind::BaseLanguage {
                locale: parse_file_locale(name, locale)?,
            }));
        }

        if let Some(pair) = rest.strip_prefix("from-") {
            let (source, target) = pair
                .split_once("-to-")
                .ok_or_else(|| Error::schema(name, "expected <deck>-from-<src>-to-<tgt>.csv"))?;
            return Ok(Some(FileKind::TranslationPair {
                source: parse_file_locale(name, source)?,
                target: parse_file_locale(name, target)?,
            }));
        }

        Ok(match rest {
            "vocabulary" => Some(FileKind::Vocabulary),
            "pictures" => Some(FileKind::Pictures),
            _ => None,
        })
    }

    /// Classify every CSV file of a data directory
    ///
    /// Files are returned sorted by name. A missing directory scans as empty.
    pub fn scan(&self, data_dir: &Path) -> Result<Vec<TabularFile>> {
        if !data_dir.exists() {
            debug!("Data directory {} does not exist", data_dir.display());
            return Ok(Vec::new());
        }

        let mut by_kind: BTreeMap<FileKind, TabularFile> = BTreeMap::new();

        for entry in WalkDir::new(data_dir).min_depth(1).max_depth(2) {
            // An unreadable entry could hide a data file: abort rather than skip
            let entry = entry.map_err(std::io::Error::from)?;

            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(data_dir) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            match self.classify(&name)? {
                Some(kind) => {
                    if let Some(existing) = by_kind.get(&kind) {
                        return Err(Error::schema(
                            &name,
                            format!("same family as '{}'", existing.name),
                        ));
                    }
                    by_kind.insert(
                        kind.clone(),
                        TabularFile {
                            kind,
                            path: entry.path().to_path_buf(),
                            name,
                        },
                    );
                }
                None => debug!("Skipping unrelated file {}", name),
            }
        }

        let mut files: Vec<TabularFile> = by_kind.into_values().collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("625_words")
    }
}

/// Locales in file names must use the lowercase data spelling
fn parse_file_locale(file: &str, code: &str) -> Result<Locale> {
    let locale: Locale = code
        .parse()
        .map_err(|_| Error::schema(file, format!("invalid locale '{}' in file name", code)))?;
    if locale.as_str() != code {
        return Err(Error::schema(
            file,
            format!("locale '{}' in file name must be lowercase", code),
        ));
    }
    Ok(locale)
}

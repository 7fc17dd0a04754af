//! CSV source of truth
//!
//! - `layout`: classifies the files of a data directory into typed families
//! - `reader`: binds headers once per file and yields typed rows
//! - `writer`: renders rows deterministically and stages files for an
//!   all-or-nothing rename

pub mod layout;
pub mod reader;
pub mod writer;

pub use layout::{DataLayout, FileKind, TabularFile};
pub use reader::{read_file, FileRows, LoadedFile};
pub use writer::{render_file, StagedWrite};

use crate::db::models::{
    BaseLanguageRow, CardTypeRow, LanguageNameRow, MinimalPairRow, PictureRow, TranslationPairRow,
    TtsOverrideRow, UiStringRow, VocabularyRow,
};
use crate::Result;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::path::Path;

/// Row with an identity within its file
pub trait TabularRow {
    /// Identity column values, most significant first
    fn identity(&self) -> Vec<&str>;
}

impl TabularRow for VocabularyRow {
    fn identity(&self) -> Vec<&str> {
        vec![self.key.as_str()]
    }
}

impl TabularRow for BaseLanguageRow {
    fn identity(&self) -> Vec<&str> {
        vec![self.key.as_str()]
    }
}

impl TabularRow for TranslationPairRow {
    fn identity(&self) -> Vec<&str> {
        vec![self.key.as_str()]
    }
}

impl TabularRow for PictureRow {
    fn identity(&self) -> Vec<&str> {
        vec![self.key.as_str()]
    }
}

impl TabularRow for TtsOverrideRow {
    fn identity(&self) -> Vec<&str> {
        vec![self.key.as_str(), self.locale.as_str()]
    }
}

impl TabularRow for MinimalPairRow {
    fn identity(&self) -> Vec<&str> {
        vec![self.guid.as_str()]
    }
}

impl TabularRow for LanguageNameRow {
    fn identity(&self) -> Vec<&str> {
        vec![self.source_locale.as_str(), self.target_locale.as_str()]
    }
}

impl TabularRow for UiStringRow {
    fn identity(&self) -> Vec<&str> {
        vec![self.locale.as_str(), self.key.as_str()]
    }
}

impl TabularRow for CardTypeRow {
    fn identity(&self) -> Vec<&str> {
        vec![self.locale.as_str(), self.card_type.as_str()]
    }
}

/// Export collation: case-folded comparison, exact bytes as tiebreak
pub fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Collate two identities column by column
pub fn compare_identity(a: &[&str], b: &[&str]) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| collate(x, y))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

/// Sort rows into export order
pub fn sort_rows<T: TabularRow>(rows: &mut [T]) {
    rows.sort_by(|a, b| compare_identity(&a.identity(), &b.identity()));
}

/// Hex SHA-256 of a byte slice
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hex SHA-256 of a file's content
pub fn sha256_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(sha256_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collate_case_folded_then_bytes() {
        let mut keys = vec!["the dog", "The cat", "the cat", "a horse"];
        keys.sort_by(|a, b| collate(a, b));
        assert_eq!(keys, vec!["a horse", "The cat", "the cat", "the dog"]);
    }

    #[test]
    fn test_compare_identity_component_wise() {
        assert_eq!(
            compare_identity(&["the cat", "es_es"], &["the cat", "de_de"]),
            Ordering::Greater
        );
        assert_eq!(
            compare_identity(&["The cat", "zz_zz"], &["the cat", "aa_aa"]),
            Ordering::Less
        );
    }

    #[test]
    fn test_sha256_bytes_known_value() {
        assert_eq!(
            sha256_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

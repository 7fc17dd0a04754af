//! Duplicate-identity check
//!
//! Reads the CSV files directly: the cache cannot show duplicates, the
//! importer has already collapsed them.

use deckdata_common::tabular::{read_file, DataLayout, FileKind};
use deckdata_common::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// One identity value occurring more than once
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateIdentity {
    pub identity: Vec<String>,
    pub count: usize,
}

/// Duplicates found in one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDuplicates {
    pub file: String,
    pub identity_columns: Vec<String>,
    /// In order of first occurrence
    pub duplicates: Vec<DuplicateIdentity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    /// Only files with at least one duplicate
    pub files: Vec<FileDuplicates>,
}

impl DuplicateReport {
    pub fn is_clean(&self) -> bool {
        self.files.is_empty()
    }
}

impl fmt::Display for DuplicateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return writeln!(f, "No duplicate identities");
        }
        for file in &self.files {
            writeln!(f, "{} ({}):", file.file, file.identity_columns.join(", "))?;
            for duplicate in &file.duplicates {
                writeln!(
                    f,
                    "  '{}' appears {} times",
                    duplicate.identity.join("', '"),
                    duplicate.count
                )?;
            }
        }
        Ok(())
    }
}

fn is_checked(kind: &FileKind) -> bool {
    !matches!(
        kind,
        FileKind::LanguageNames | FileKind::UiStrings | FileKind::CardTypes
    )
}

/// Find identity values occurring more than once in the files of `data_dir`
pub fn find_duplicate_identities(layout: &DataLayout, data_dir: &Path) -> Result<DuplicateReport> {
    let mut report = DuplicateReport::default();

    for file in layout.scan(data_dir)? {
        if !is_checked(&file.kind) {
            continue;
        }

        let loaded = read_file(&file)?;
        let identities = loaded.rows.identities();

        let mut counts: HashMap<&Vec<&str>, usize> = HashMap::new();
        let mut order: Vec<&Vec<&str>> = Vec::new();
        for identity in &identities {
            let count = counts.entry(identity).or_insert(0);
            if *count == 0 {
                order.push(identity);
            }
            *count += 1;
        }

        let duplicates: Vec<DuplicateIdentity> = order
            .into_iter()
            .filter_map(|identity| {
                let count = counts[identity];
                (count > 1).then(|| DuplicateIdentity {
                    identity: identity.iter().map(|v| v.to_string()).collect(),
                    count,
                })
            })
            .collect();

        debug!("{}: {} duplicate identities", file.name, duplicates.len());

        if !duplicates.is_empty() {
            report.files.push(FileDuplicates {
                file: file.name.clone(),
                identity_columns: file
                    .kind
                    .identity_columns()
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                duplicates,
            });
        }
    }

    info!(
        "Duplicate check: {} file(s) with duplicate identities",
        report.files.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_reports_duplicates_in_first_seen_order() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("625_words-pictures.csv"),
            "key,picture,picture source\nb,1,\na,2,\nb,3,\na,4,\nb,5,\nc,6,\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("tts_overrides.csv"),
            "key,locale,tts_text,is_ssml,notes\nx,en_us,a,0,\nx,es_es,b,0,\n",
        )
        .unwrap();

        let report = find_duplicate_identities(&DataLayout::default(), temp_dir.path()).unwrap();

        assert_eq!(report.files.len(), 1);
        let file = &report.files[0];
        assert_eq!(file.file, "625_words-pictures.csv");
        assert_eq!(file.identity_columns, vec!["key".to_string()]);
        assert_eq!(
            file.duplicates,
            vec![
                DuplicateIdentity {
                    identity: vec!["b".to_string()],
                    count: 3
                },
                DuplicateIdentity {
                    identity: vec!["a".to_string()],
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn test_i18n_files_are_not_checked() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("i18n")).unwrap();
        fs::write(
            temp_dir.path().join("i18n").join("ui_strings.csv"),
            "locale,key,value\nen_us,a,x\nen_us,a,y\n",
        )
        .unwrap();

        let report = find_duplicate_identities(&DataLayout::default(), temp_dir.path()).unwrap();
        assert!(report.is_clean());
    }
}

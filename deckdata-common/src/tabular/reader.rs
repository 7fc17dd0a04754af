//! CSV reader
//!
//! Each family has a fixed column list. The header row is bound to column
//! indices once per file; rows are then decoded into the typed models of
//! `db::models`. The SHA-256 of the exact bytes read is returned with the
//! rows so the importer can record what it loaded.

use crate::db::models::{
    BaseLanguageRow, CardTypeRow, LanguageNameRow, MinimalPairRow, PictureRow, TranslationPairRow,
    TtsOverrideRow, UiStringRow, VocabularyRow,
};
use crate::tabular::layout::{FileKind, TabularFile};
use crate::tabular::{sha256_bytes, TabularRow};
use crate::{Error, Locale, Result};
use csv::StringRecord;
use tracing::{debug, warn};

/// Column of a family's fixed layout
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    /// Canonical header carries the language suffix (`text:en`)
    pub suffixed: bool,
    pub required: bool,
}

const fn column(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        suffixed: false,
        required: false,
    }
}

const fn required(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        suffixed: false,
        required: true,
    }
}

const fn suffixed(name: &'static str, required: bool) -> ColumnSpec {
    ColumnSpec {
        name,
        suffixed: true,
        required,
    }
}

const BASE_LANGUAGE_COLUMNS: &[ColumnSpec] = &[
    required("key"),
    suffixed("text", true),
    suffixed("ipa", false),
    suffixed("audio", false),
    suffixed("audio source", false),
    suffixed("tags", false),
];

const TRANSLATION_PAIR_COLUMNS: &[ColumnSpec] = &[
    required("key"),
    required("guid"),
    column("pronunciation hint"),
    column("spelling hint"),
    column("reading hint"),
    column("listening hint"),
    column("notes"),
];

const VOCABULARY_COLUMNS: &[ColumnSpec] = &[required("key"), column("clarification")];

const PICTURES_COLUMNS: &[ColumnSpec] =
    &[required("key"), column("picture"), column("picture source")];

const TTS_OVERRIDES_COLUMNS: &[ColumnSpec] = &[
    required("key"),
    required("locale"),
    column("tts_text"),
    column("is_ssml"),
    column("notes"),
];

const MINIMAL_PAIRS_COLUMNS: &[ColumnSpec] = &[
    required("guid"),
    column("text1"),
    column("audio1"),
    column("ipa1"),
    column("meaning1"),
    column("text2"),
    column("audio2"),
    column("ipa2"),
    column("meaning2"),
    column("tags"),
];

const LANGUAGE_NAMES_COLUMNS: &[ColumnSpec] = &[
    required("source_locale"),
    required("target_locale"),
    required("name"),
];

const UI_STRINGS_COLUMNS: &[ColumnSpec] = &[required("locale"), required("key"), required("value")];

const CARD_TYPES_COLUMNS: &[ColumnSpec] =
    &[required("locale"), required("card_type"), required("name")];

/// Fixed column list of a family
pub fn columns_for(kind: &FileKind) -> &'static [ColumnSpec] {
    match kind {
        FileKind::BaseLanguage { .. } => BASE_LANGUAGE_COLUMNS,
        FileKind::TranslationPair { .. } => TRANSLATION_PAIR_COLUMNS,
        FileKind::Vocabulary => VOCABULARY_COLUMNS,
        FileKind::Pictures => PICTURES_COLUMNS,
        FileKind::TtsOverrides => TTS_OVERRIDES_COLUMNS,
        FileKind::MinimalPairs { .. } => MINIMAL_PAIRS_COLUMNS,
        FileKind::LanguageNames => LANGUAGE_NAMES_COLUMNS,
        FileKind::UiStrings => UI_STRINGS_COLUMNS,
        FileKind::CardTypes => CARD_TYPES_COLUMNS,
    }
}

/// Canonical header row of a family
pub fn canonical_header(kind: &FileKind) -> Vec<String> {
    let language = match kind {
        FileKind::BaseLanguage { locale } => Some(locale.language()),
        _ => None,
    };

    columns_for(kind)
        .iter()
        .map(|spec| match (spec.suffixed, language) {
            (true, Some(lang)) => format!("{}:{}", spec.name, lang),
            _ => spec.name.to_string(),
        })
        .collect()
}

/// Header bound to column indices
#[derive(Debug, Clone)]
pub struct BoundHeader {
    /// Index per `ColumnSpec`, `None` when an optional column is absent
    indices: Vec<Option<usize>>,
}

impl BoundHeader {
    /// Bind a header row against a family's columns
    ///
    /// Suffixed columns accept `name:<lang>` for the file's language or the
    /// bare `name`. More than one candidate for a column, a suffix for a
    /// different language, or a missing required column is a schema error.
    pub fn bind(file: &str, kind: &FileKind, header: &StringRecord) -> Result<Self> {
        let language = match kind {
            FileKind::BaseLanguage { locale } => Some(locale.language()),
            _ => None,
        };
        let cells: Vec<&str> = header
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let cell = if i == 0 { cell.trim_start_matches('\u{feff}') } else { cell };
                cell.trim()
            })
            .collect();

        let specs = columns_for(kind);
        let mut indices = Vec::with_capacity(specs.len());

        for spec in specs {
            let mut candidates = Vec::new();
            for (i, cell) in cells.iter().enumerate() {
                if *cell == spec.name {
                    candidates.push(i);
                    continue;
                }
                if !spec.suffixed {
                    continue;
                }
                let Some(suffix) = cell
                    .strip_prefix(spec.name)
                    .and_then(|rest| rest.strip_prefix(':'))
                else {
                    continue;
                };
                if Some(suffix) != language {
                    return Err(Error::schema(
                        file,
                        format!(
                            "column '{}' does not match the file's language '{}'",
                            cell,
                            language.unwrap_or_default()
                        ),
                    ));
                }
                candidates.push(i);
            }

            match candidates.as_slice() {
                [] if spec.required => {
                    return Err(Error::schema(
                        file,
                        format!("missing required column '{}'", spec.name),
                    ));
                }
                [] => indices.push(None),
                [index] => indices.push(Some(*index)),
                _ => {
                    let names: Vec<&str> = candidates.iter().map(|i| cells[*i]).collect();
                    return Err(Error::schema(
                        file,
                        format!(
                            "ambiguous column '{}': matched {}",
                            spec.name,
                            names.join(", ")
                        ),
                    ));
                }
            }
        }

        let bound = indices.iter().flatten().count();
        if bound < cells.len() {
            warn!(
                "{}: {} unrecognized column(s) ignored",
                file,
                cells.len() - bound
            );
        }

        Ok(Self { indices })
    }

    /// Cell of the i-th column spec; empty when the column is absent
    fn cell<'r>(&self, record: &'r StringRecord, spec_index: usize) -> &'r str {
        self.indices
            .get(spec_index)
            .copied()
            .flatten()
            .and_then(|i| record.get(i))
            .unwrap_or("")
    }
}

/// One record with its bound header
struct BoundRecord<'a> {
    header: &'a BoundHeader,
    record: &'a StringRecord,
    file: &'a str,
    line: u64,
}

impl BoundRecord<'_> {
    fn text(&self, spec_index: usize) -> String {
        self.header.cell(self.record, spec_index).to_string()
    }

    fn optional(&self, spec_index: usize) -> Option<String> {
        let value = self.header.cell(self.record, spec_index);
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    /// Identity cells must not be empty
    fn identity(&self, spec_index: usize, column: &str) -> Result<String> {
        let value = self.header.cell(self.record, spec_index);
        if value.is_empty() {
            return Err(self.error(format!("empty '{}'", column)));
        }
        Ok(value.to_string())
    }

    fn locale(&self, spec_index: usize, column: &str) -> Result<Locale> {
        let value = self.identity(spec_index, column)?;
        value
            .parse()
            .map_err(|_| self.error(format!("invalid locale '{}' in '{}'", value, column)))
    }

    fn flag(&self, spec_index: usize, column: &str) -> Result<bool> {
        match self.header.cell(self.record, spec_index).trim() {
            "" | "0" | "false" | "False" | "FALSE" => Ok(false),
            "1" | "true" | "True" | "TRUE" => Ok(true),
            other => Err(self.error(format!("invalid boolean '{}' in '{}'", other, column))),
        }
    }

    fn error(&self, reason: String) -> Error {
        Error::schema(self.file, format!("line {}: {}", self.line, reason))
    }
}

/// Typed rows of one file
#[derive(Debug, Clone, PartialEq)]
pub enum FileRows {
    BaseLanguage(Vec<BaseLanguageRow>),
    TranslationPair(Vec<TranslationPairRow>),
    Vocabulary(Vec<VocabularyRow>),
    Pictures(Vec<PictureRow>),
    TtsOverrides(Vec<TtsOverrideRow>),
    MinimalPairs(Vec<MinimalPairRow>),
    LanguageNames(Vec<LanguageNameRow>),
    UiStrings(Vec<UiStringRow>),
    CardTypes(Vec<CardTypeRow>),
}

impl FileRows {
    pub fn len(&self) -> usize {
        match self {
            FileRows::BaseLanguage(rows) => rows.len(),
            FileRows::TranslationPair(rows) => rows.len(),
            FileRows::Vocabulary(rows) => rows.len(),
            FileRows::Pictures(rows) => rows.len(),
            FileRows::TtsOverrides(rows) => rows.len(),
            FileRows::MinimalPairs(rows) => rows.len(),
            FileRows::LanguageNames(rows) => rows.len(),
            FileRows::UiStrings(rows) => rows.len(),
            FileRows::CardTypes(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identity of every row, in file order
    pub fn identities(&self) -> Vec<Vec<&str>> {
        fn collect<T: TabularRow>(rows: &[T]) -> Vec<Vec<&str>> {
            rows.iter().map(|r| r.identity()).collect()
        }

        match self {
            FileRows::BaseLanguage(rows) => collect(rows),
            FileRows::TranslationPair(rows) => collect(rows),
            FileRows::Vocabulary(rows) => collect(rows),
            FileRows::Pictures(rows) => collect(rows),
            FileRows::TtsOverrides(rows) => collect(rows),
            FileRows::MinimalPairs(rows) => collect(rows),
            FileRows::LanguageNames(rows) => collect(rows),
            FileRows::UiStrings(rows) => collect(rows),
            FileRows::CardTypes(rows) => collect(rows),
        }
    }
}

/// A file read into memory
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub file: TabularFile,
    /// Hex SHA-256 of the bytes read
    pub sha256: String,
    pub rows: FileRows,
}

/// Read and decode one file
pub fn read_file(file: &TabularFile) -> Result<LoadedFile> {
    let bytes = std::fs::read(&file.path)?;
    let sha256 = sha256_bytes(&bytes);
    let rows = parse_rows(&file.name, &file.kind, &bytes)?;

    debug!("Read {} rows from {}", rows.len(), file.name);

    Ok(LoadedFile {
        file: file.clone(),
        sha256,
        rows,
    })
}

/// Decode CSV content of a given family
pub fn parse_rows(name: &str, kind: &FileKind, bytes: &[u8]) -> Result<FileRows> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let header = reader.headers()?.clone();
    let bound = BoundHeader::bind(name, kind, &header)?;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        records.push(record);
    }

    let bound_records = records.iter().map(|record| BoundRecord {
        header: &bound,
        record,
        file: name,
        line: record.position().map(|p| p.line()).unwrap_or_default(),
    });

    let rows = match kind {
        FileKind::BaseLanguage { locale } => FileRows::BaseLanguage(
            bound_records
                .map(|r| {
                    Ok(BaseLanguageRow {
                        key: r.identity(0, "key")?,
                        locale: locale.clone(),
                        text: r.text(1),
                        ipa: r.optional(2),
                        audio: r.optional(3),
                        audio_source: r.optional(4),
                    })
                })
                .collect::<Result<_>>()?,
        ),
        FileKind::TranslationPair { source, target } => FileRows::TranslationPair(
            bound_records
                .map(|r| {
                    Ok(TranslationPairRow {
                        key: r.identity(0, "key")?,
                        source_locale: source.clone(),
                        target_locale: target.clone(),
                        guid: r.text(1),
                        pronunciation_hint: r.optional(2),
                        spelling_hint: r.optional(3),
                        reading_hint: r.optional(4),
                        listening_hint: r.optional(5),
                        notes: r.optional(6),
                    })
                })
                .collect::<Result<_>>()?,
        ),
        FileKind::Vocabulary => FileRows::Vocabulary(
            bound_records
                .map(|r| {
                    Ok(VocabularyRow {
                        key: r.identity(0, "key")?,
                        clarification: r.optional(1),
                    })
                })
                .collect::<Result<_>>()?,
        ),
        FileKind::Pictures => FileRows::Pictures(
            bound_records
                .map(|r| {
                    Ok(PictureRow {
                        key: r.identity(0, "key")?,
                        picture: r.optional(1),
                        picture_source: r.optional(2),
                    })
                })
                .collect::<Result<_>>()?,
        ),
        FileKind::TtsOverrides => FileRows::TtsOverrides(
            bound_records
                .map(|r| {
                    Ok(TtsOverrideRow {
                        key: r.identity(0, "key")?,
                        locale: r.locale(1, "locale")?,
                        tts_text: r.optional(2),
                        is_ssml: r.flag(3, "is_ssml")?,
                        notes: r.optional(4),
                    })
                })
                .collect::<Result<_>>()?,
        ),
        FileKind::MinimalPairs { source, target } => FileRows::MinimalPairs(
            bound_records
                .map(|r| {
                    Ok(MinimalPairRow {
                        guid: r.identity(0, "guid")?,
                        source_locale: source.clone(),
                        target_locale: target.clone(),
                        text1: r.optional(1),
                        audio1: r.optional(2),
                        ipa1: r.optional(3),
                        meaning1: r.optional(4),
                        text2: r.optional(5),
                        audio2: r.optional(6),
                        ipa2: r.optional(7),
                        meaning2: r.optional(8),
                        tags: r.optional(9),
                    })
                })
                .collect::<Result<_>>()?,
        ),
        FileKind::LanguageNames => FileRows::LanguageNames(
            bound_records
                .map(|r| {
                    Ok(LanguageNameRow {
                        source_locale: r.locale(0, "source_locale")?,
                        target_locale: r.locale(1, "target_locale")?,
                        name: r.text(2),
                    })
                })
                .collect::<Result<_>>()?,
        ),
        FileKind::UiStrings => FileRows::UiStrings(
            bound_records
                .map(|r| {
                    Ok(UiStringRow {
                        locale: r.locale(0, "locale")?,
                        key: r.identity(1, "key")?,
                        value: r.text(2),
                    })
                })
                .collect::<Result<_>>()?,
        ),
        FileKind::CardTypes => FileRows::CardTypes(
            bound_records
                .map(|r| {
                    Ok(CardTypeRow {
                        locale: r.locale(0, "locale")?,
                        card_type: r.identity(1, "card_type")?,
                        name: r.text(2),
                    })
                })
                .collect::<Result<_>>()?,
        ),
    };

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_kind(code: &str) -> FileKind {
        FileKind::BaseLanguage {
            locale: code.parse().unwrap(),
        }
    }

    #[test]
    fn test_canonical_base_header() {
        assert_eq!(
            canonical_header(&base_kind("en_us")),
            vec!["key", "text:en", "ipa:en", "audio:en", "audio source:en", "tags:en"]
        );
    }

    #[test]
    fn test_reads_base_language_rows() {
        let csv = "key,text:en,ipa:en,audio:en,audio source:en,tags:en\n\
                   the cat,the cat,/ðə kæt/,[sound:al_en_us_the_cat.mp3],Google TTS,AnkiLangs::EN\n\
                   the dog,the dog,,,,AnkiLangs::EN\n";

        let rows = parse_rows("625_words-base-en_us.csv", &base_kind("en_us"), csv.as_bytes()).unwrap();
        let FileRows::BaseLanguage(rows) = rows else {
            panic!("wrong family");
        };

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text, "the cat");
        assert_eq!(rows[0].ipa.as_deref(), Some("/ðə kæt/"));
        assert_eq!(rows[0].audio.as_deref(), Some("[sound:al_en_us_the_cat.mp3]"));
        assert_eq!(rows[1].ipa, None);
        assert_eq!(rows[1].locale.as_str(), "en_us");
    }

    #[test]
    fn test_unsuffixed_text_column_tolerated() {
        let csv = "key,text\nthe cat,le chat\n";
        let rows = parse_rows("f.csv", &base_kind("fr_fr"), csv.as_bytes()).unwrap();
        let FileRows::BaseLanguage(rows) = rows else {
            panic!("wrong family");
        };
        assert_eq!(rows[0].text, "le chat");
        assert_eq!(rows[0].audio, None);
    }

    #[test]
    fn test_missing_text_column_is_schema_error() {
        let csv = "key,ipa:en\nthe cat,/kæt/\n";
        let result = parse_rows("625_words-base-en_us.csv", &base_kind("en_us"), csv.as_bytes());
        match result {
            Err(Error::Schema { file, reason }) => {
                assert_eq!(file, "625_words-base-en_us.csv");
                assert!(reason.contains("text"), "{}", reason);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_two_text_columns_is_schema_error() {
        let csv = "key,text:en,text\nthe cat,the cat,cat\n";
        let result = parse_rows("f.csv", &base_kind("en_us"), csv.as_bytes());
        assert!(matches!(result, Err(Error::Schema { reason, .. }) if reason.contains("ambiguous")));
    }

    #[test]
    fn test_foreign_language_suffix_is_schema_error() {
        let csv = "key,text:de\nthe cat,die Katze\n";
        let result = parse_rows("f.csv", &base_kind("en_us"), csv.as_bytes());
        assert!(matches!(result, Err(Error::Schema { .. })));
    }

    #[test]
    fn test_tts_override_flag_parsing() {
        let csv = "key,locale,tts_text,is_ssml,notes\n\
                   the cat,es_es,el gáto,0,\n\
                   the dog,es_es,<speak>perro</speak>,true,ssml\n\
                   the fox,es_es,zorro,,\n";
        let rows = parse_rows("tts_overrides.csv", &FileKind::TtsOverrides, csv.as_bytes()).unwrap();
        let FileRows::TtsOverrides(rows) = rows else {
            panic!("wrong family");
        };
        let flags: Vec<bool> = rows.iter().map(|r| r.is_ssml).collect();
        assert_eq!(flags, vec![false, true, false]);

        let bad = "key,locale,tts_text,is_ssml,notes\nthe cat,es_es,x,maybe,\n";
        assert!(parse_rows("tts_overrides.csv", &FileKind::TtsOverrides, bad.as_bytes()).is_err());
    }

    #[test]
    fn test_blank_lines_skipped_and_empty_key_rejected() {
        let kind = FileKind::Pictures;
        let csv = "key,picture,picture source\nthe cat,cat.jpg,\n,,\n";
        let rows = parse_rows("625_words-pictures.csv", &kind, csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);

        let csv = "key,picture,picture source\n,cat.jpg,\n";
        let result = parse_rows("625_words-pictures.csv", &kind, csv.as_bytes());
        assert!(matches!(result, Err(Error::Schema { reason, .. }) if reason.contains("line 2")));
    }

    #[test]
    fn test_identities_in_file_order() {
        let csv = "key,locale,tts_text,is_ssml,notes\nthe cat,es_es,,0,\nthe cat,de_de,,0,\n";
        let rows = parse_rows("tts_overrides.csv", &FileKind::TtsOverrides, csv.as_bytes()).unwrap();
        assert_eq!(
            rows.identities(),
            vec![vec!["the cat", "es_es"], vec!["the cat", "de_de"]]
        );
    }
}

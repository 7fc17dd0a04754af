//! Test Helper Utilities
//!
//! A small canonical dataset (already sorted, canonical headers) and a
//! context rooted in a temporary directory.

#![allow(dead_code)]

use deckdata_common::config::Settings;
use deckdata_sync::SyncContext;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const BASE_EN: &str = "625_words-base-en_us.csv";
pub const BASE_DE: &str = "625_words-base-de_de.csv";
pub const PAIR_EN_DE: &str = "625_words-from-en_us-to-de_de.csv";
pub const VOCABULARY: &str = "625_words-vocabulary.csv";
pub const PICTURES: &str = "625_words-pictures.csv";
pub const TTS: &str = "tts_overrides.csv";
pub const MINIMAL_PAIRS: &str = "minimal_pairs-from-en_us_to_de_de.csv";
pub const LANGUAGE_NAMES: &str = "i18n/language_names.csv";
pub const UI_STRINGS: &str = "i18n/ui_strings.csv";
pub const CARD_TYPES: &str = "i18n/card_types.csv";

/// Files in export form: writing them back must reproduce these bytes
pub const CANONICAL: &[(&str, &str)] = &[
    (
        BASE_DE,
        "key,text:de,ipa:de,audio:de,audio source:de,tags:de\n\
         bank (money),Bank,/baŋk/,[sound:de_bank.mp3],,AnkiLangs::DE\n\
         bank (river),Ufer,/ˈuːfɐ/,,,AnkiLangs::DE\n\
         the cat,\"die Katze, klein\",,,,AnkiLangs::DE\n",
    ),
    (
        BASE_EN,
        "key,text:en,ipa:en,audio:en,audio source:en,tags:en\n\
         bank (money),bank,/bæŋk/,[sound:en_bank.mp3],Forvo,AnkiLangs::EN\n\
         bank (river),bank,/bæŋk/,,,AnkiLangs::EN\n\
         the cat,the cat,,,,AnkiLangs::EN\n",
    ),
    (
        PAIR_EN_DE,
        "key,guid,pronunciation hint,spelling hint,reading hint,listening hint,notes\n\
         bank (money),Abc123,,,,,\n\
         bank (river),Xyz789,,,,,\"line one\nline two\"\n\
         the cat,Q1w2e3,,,,,\n",
    ),
    (PICTURES, "key,picture,picture source\nthe cat,\"<img src=\"\"cat.jpg\"\">\",wikimedia\n"),
    (
        VOCABULARY,
        "key,clarification\nbank (money),financial institution\nbank (river),\nthe cat,\n",
    ),
    (
        LANGUAGE_NAMES,
        "source_locale,target_locale,name\nde_de,en_us,Englisch\nen_us,de_de,German\n",
    ),
    (CARD_TYPES, "locale,card_type,name\nen_us,listening,Listening\n"),
    (UI_STRINGS, "locale,key,value\nen_us,deck_title,625 words\n"),
    (
        MINIMAL_PAIRS,
        "guid,text1,audio1,ipa1,meaning1,text2,audio2,ipa2,meaning2,tags\n\
         mp1,Bahn,[sound:bahn.mp3],/baːn/,train,Bann,,/ban/,spell,\n",
    ),
    (TTS, "key,locale,tts_text,is_ssml,notes\nthe cat,de_de,<speak>die Katze</speak>,1,\n"),
];

/// Write `content` at `dir/name`, creating parent directories
pub fn write_file(dir: &Path, name: &str, content: &str) {
    let path = file_path(dir, name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

pub fn read_file(dir: &Path, name: &str) -> String {
    fs::read_to_string(file_path(dir, name)).unwrap()
}

pub fn file_path(dir: &Path, name: &str) -> PathBuf {
    name.split('/').fold(dir.to_path_buf(), |path, part| path.join(part))
}

/// Write the canonical dataset into `dir`
pub fn write_canonical_dataset(dir: &Path) {
    for (name, content) in CANONICAL {
        write_file(dir, name, content);
    }
}

/// Context whose cache, data and media paths live under `root`
pub fn test_context(root: &TempDir) -> SyncContext {
    SyncContext::new(Settings {
        cache_path: root.path().join("data.db"),
        data_dir: root.path().join("data"),
        media_dir: root.path().join("media"),
        deck_name: "625_words".to_string(),
        tag_prefix: "AnkiLangs".to_string(),
        log_level: "info".to_string(),
    })
}

/// Context with the canonical dataset already in its data directory
pub fn canonical_context(root: &TempDir) -> SyncContext {
    let ctx = test_context(root);
    write_canonical_dataset(&ctx.settings.data_dir);
    ctx
}

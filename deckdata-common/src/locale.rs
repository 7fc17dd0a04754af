//! Locale codes
//!
//! Data files and the cache spell locales as lowercase `lang_region`
//! (`en_us`). Audio directories use `lang_REGION` (`en_US`) and CSV column
//! suffixes use the bare language (`text:en`).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A `lang_region` locale, stored lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale {
    code: String,
    separator: usize,
}

impl Locale {
    /// Lowercase data spelling (`en_us`)
    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// Language part (`en` for `en_us`)
    pub fn language(&self) -> &str {
        &self.code[..self.separator]
    }

    /// Region part (`us` for `en_us`)
    pub fn region(&self) -> &str {
        &self.code[self.separator + 1..]
    }

    /// Audio sub-directory name (`en_US`)
    pub fn directory_name(&self) -> String {
        format!("{}_{}", self.language(), self.region().to_uppercase())
    }

    /// Parse an audio sub-directory name (`en_US`) back into a locale
    pub fn from_directory_name(name: &str) -> Option<Self> {
        let (language, region) = name.split_once('_')?;
        if language.chars().any(|c| c.is_ascii_uppercase())
            || region.chars().any(|c| c.is_ascii_lowercase())
        {
            return None;
        }
        name.parse().ok()
    }

    /// Derived card tag (`AnkiLangs::EN`)
    pub fn tag(&self, prefix: &str) -> String {
        format!("{}::{}", prefix, self.language().to_uppercase())
    }
}

impl FromStr for Locale {
    type Err = Error;

    /// Case-insensitive: `en_US`, `EN_us` and `en_us` are the same locale
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("Invalid locale '{}': expected lang_region", s));

        let (language, region) = s.split_once('_').ok_or_else(invalid)?;
        let valid_part = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphabetic());
        if !valid_part(language) || !valid_part(region) {
            return Err(invalid());
        }

        Ok(Self {
            code: s.to_ascii_lowercase(),
            separator: language.len(),
        })
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

impl TryFrom<String> for Locale {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.code
    }
}

impl AsRef<str> for Locale {
    fn as_ref(&self) -> &str {
        &self.code
    }
}

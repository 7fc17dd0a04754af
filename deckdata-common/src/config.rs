//! Configuration loading and path resolution
//!
//! Every setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the cache path
pub const ENV_CACHE_PATH: &str = "DECKDATA_CACHE";
/// Environment variable overriding the CSV data directory
pub const ENV_DATA_DIR: &str = "DECKDATA_DATA_DIR";
/// Environment variable overriding the audio media directory
pub const ENV_MEDIA_DIR: &str = "DECKDATA_MEDIA_DIR";

/// Config file looked up in the working directory
const LOCAL_CONFIG_FILE: &str = "deckdata.toml";

/// Compiled defaults, relative to the deck repository root
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub cache_path: PathBuf,
    pub data_dir: PathBuf,
    pub media_dir: PathBuf,
    pub deck_name: String,
    pub tag_prefix: String,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("data.db"),
            data_dir: PathBuf::from("src/data"),
            media_dir: PathBuf::from("src/media/audio"),
            deck_name: "625_words".to_string(),
            tag_prefix: "AnkiLangs".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Configuration loaded from a TOML file
///
/// All fields are optional; missing fields fall through to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite cache
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    /// Directory holding the CSV source of truth
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding one audio sub-directory per locale
    #[serde(default)]
    pub media_dir: Option<PathBuf>,

    /// File name prefix of the deck's CSV files
    #[serde(default)]
    pub deck_name: Option<String>,

    /// Prefix of the derived tags column
    #[serde(default)]
    pub tag_prefix: Option<String>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the first config file found, or an empty config
    ///
    /// An explicitly requested file must exist. Otherwise `./deckdata.toml`
    /// is tried, then `<config dir>/deckdata/config.toml`.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        let candidates = [
            Some(PathBuf::from(LOCAL_CONFIG_FILE)),
            dirs::config_dir().map(|d| d.join("deckdata").join("config.toml")),
        ];

        for path in candidates.into_iter().flatten() {
            if path.exists() {
                info!("Loading config from {}", path.display());
                return Self::load(&path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }
}

/// Command-line overrides (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub cache_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub media_dir: Option<PathBuf>,
}

/// Fully resolved settings passed to every component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub cache_path: PathBuf,
    pub data_dir: PathBuf,
    pub media_dir: PathBuf,
    pub deck_name: String,
    pub tag_prefix: String,
    pub log_level: String,
}

impl Settings {
    /// Resolve settings from all four tiers
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Self {
        let defaults = CompiledDefaults::default();

        Self {
            cache_path: resolve_path(
                cli.cache_path.as_ref(),
                ENV_CACHE_PATH,
                toml_config.cache_path.as_ref(),
                defaults.cache_path,
            ),
            data_dir: resolve_path(
                cli.data_dir.as_ref(),
                ENV_DATA_DIR,
                toml_config.data_dir.as_ref(),
                defaults.data_dir,
            ),
            media_dir: resolve_path(
                cli.media_dir.as_ref(),
                ENV_MEDIA_DIR,
                toml_config.media_dir.as_ref(),
                defaults.media_dir,
            ),
            deck_name: toml_config.deck_name.clone().unwrap_or(defaults.deck_name),
            tag_prefix: toml_config.tag_prefix.clone().unwrap_or(defaults.tag_prefix),
            log_level: toml_config.logging.level.clone().unwrap_or(defaults.log_level),
        }
    }
}

/// Resolve one path setting following the priority order
pub fn resolve_path(
    cli_arg: Option<&PathBuf>,
    env_var_name: &str,
    toml_value: Option<&PathBuf>,
    default: PathBuf,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.clone();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = toml_value {
        return path.clone();
    }

    // Priority 4: Compiled default
    default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_partial_fields() {
        let config: TomlConfig = toml::from_str(
            r#"
            deck_name = "100_phrases"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.deck_name.as_deref(), Some("100_phrases"));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn test_cli_beats_toml() {
        let toml_config = TomlConfig {
            data_dir: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let cli = CliOverrides {
            data_dir: Some(PathBuf::from("/from/cli")),
            ..Default::default()
        };

        let settings = Settings::resolve(&cli, &toml_config);
        assert_eq!(settings.data_dir, PathBuf::from("/from/cli"));
        assert_eq!(settings.deck_name, "625_words");
        assert_eq!(settings.tag_prefix, "AnkiLangs");
    }
}

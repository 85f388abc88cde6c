use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use crate::error::ConfigError;
use crate::store::DEFAULT_INFO_FILE;

/// Used when no `--config` is given
pub const DEFAULT_CONFIG_PATH: &str = "config/extract_config.toml";

fn default_level() -> String {
    "info".to_string()
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("logs/extract.log"))
}

fn default_extract_dir() -> PathBuf {
    PathBuf::from("extracted")
}

fn default_supported_formats() -> Vec<String> {
    vec![".zip".to_string()]
}

fn default_info_file() -> PathBuf {
    PathBuf::from(DEFAULT_INFO_FILE)
}

/// The empty password tries the archive as unencrypted
fn default_passwords() -> Vec<String> {
    vec![String::new()]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub passwords: PasswordConfig,
    #[serde(default)]
    pub extract_tasks: Vec<ExtractTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_file: default_log_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_extract_dir")]
    pub default_extract_dir: PathBuf,
    /// Only controls the "target not empty" warning; files are always written.
    #[serde(default)]
    pub overwrite_existing: bool,
    /// Lowercase suffixes including the dot, e.g. ".zip" or ".tar.gz"
    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            default_extract_dir: default_extract_dir(),
            overwrite_existing: false,
            supported_formats: default_supported_formats(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_info_file")]
    pub info_file: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            info_file: default_info_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    #[serde(default = "default_passwords")]
    pub default_passwords: Vec<String>,
    /// archive filename -> candidate passwords, tried before the defaults
    #[serde(default)]
    pub file_passwords: HashMap<String, Vec<PasswordEntry>>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            default_passwords: default_passwords(),
            file_passwords: HashMap::new(),
        }
    }
}

/// A configured password: either used verbatim or derived from content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PasswordEntry {
    Plain(String),
    Typed {
        content: String,
        #[serde(rename = "type", default = "PasswordEntry::default_kind")]
        kind: String,
    },
}

impl PasswordEntry {
    fn default_kind() -> String {
        "hash".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractTask {
    #[serde(default)]
    pub archive_path: Option<PathBuf>,
    #[serde(default)]
    pub extract_dir: Option<PathBuf>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        Ok(config)
    }

    /// An explicit path must exist; otherwise the default location is tried
    /// and built-in defaults apply when it is absent.
    ///
    /// Also returns the file the config came from, `None` for built-in
    /// defaults, so the caller can report it once logging is set up.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_from(explicit, Path::new(DEFAULT_CONFIG_PATH))
    }

    fn load_from(explicit: Option<&Path>, default_path: &Path) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = match explicit {
            Some(path) => path,
            None if default_path.exists() => default_path,
            None => return Ok((Self::default(), None)),
        };
        Ok((Self::load(path)?, Some(path.to_path_buf())))
    }
}

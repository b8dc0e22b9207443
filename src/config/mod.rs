//! Optional per-repository settings read from `.inline-review.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::comments::Layout;
use crate::language::Languages;

/// Name of the settings file at the workspace root.
pub const CONFIG_FILE: &str = ".inline-review.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Column limit for rendered comment lines, including indentation and
    /// the comment token.
    pub line_width: usize,
    pub tab_width: usize,
    /// Path of the PR state file, relative to the workspace root.
    pub state_file: PathBuf,
    /// Extra `extension = "token"` entries.
    pub languages: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            line_width: 80,
            tab_width: 4,
            state_file: PathBuf::from(".inline-review.md"),
            languages: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load `<root>/.inline-review.toml`, falling back to defaults when the
    /// file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                log::debug!("loading config from {}", path.display());
                Self::from_toml(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.line_width == 0 {
            return Err(ConfigError::Invalid("line_width must be positive".to_string()));
        }
        if self.tab_width == 0 {
            return Err(ConfigError::Invalid("tab_width must be positive".to_string()));
        }
        if self.state_file.as_os_str().is_empty() || self.state_file.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "state_file must be a relative path, got {:?}",
                self.state_file
            )));
        }
        if let Some((ext, _)) = self.languages.iter().find(|(_, token)| token.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "empty comment token for extension {ext:?}"
            )));
        }
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        Layout {
            line_width: self.line_width,
            tab_width: self.tab_width,
        }
    }

    pub fn languages(&self) -> Languages {
        Languages::with_overrides(self.languages.clone())
    }
}

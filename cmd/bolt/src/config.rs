//! Configuration for the bolt CLI.
//!
//! Configuration is stored in ~/.giztoy/bolt/config.yaml:
//!
//! ```yaml
//! db: /path/to/store.redb
//! cache_size: 67108864
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use giztoy_bolt::Options;
use serde::{Deserialize, Serialize};

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".giztoy";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Default database filename, under the app's data directory.
pub const DEFAULT_DB_FILE: &str = "bolt.redb";

const APP_NAME: &str = "bolt";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<PathBuf>,

    /// Engine options.
    #[serde(flatten)]
    pub options: Options,
}

impl Config {
    /// Gets the default config directory (~/.giztoy/bolt).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(APP_NAME))
    }

    /// Loads the config at `path`, or the default file when `path` is `None`.
    ///
    /// A missing default file yields the default config; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_dir() {
                Some(dir) if dir.join(DEFAULT_CONFIG_FILE).exists() => {
                    dir.join(DEFAULT_CONFIG_FILE)
                }
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Database path: `flag` wins over the config file, which wins over
    /// ~/.giztoy/bolt/data/bolt.redb.
    pub fn db_path(&self, flag: Option<&Path>) -> anyhow::Result<PathBuf> {
        if let Some(path) = flag.or(self.db.as_deref()) {
            return Ok(path.to_path_buf());
        }
        let dir = Self::default_dir()
            .context("could not find home directory; pass --db")?
            .join("data");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(dir.join(DEFAULT_DB_FILE))
    }
}

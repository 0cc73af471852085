use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::sync::supabase::Tables;

pub const CONFIG_VERSION: u64 = 1;

pub const ENV_SUPABASE_URL: &str = "DAYBOOK_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "DAYBOOK_SUPABASE_ANON_KEY";
pub const ENV_GEMINI_API_KEY: &str = "DAYBOOK_GEMINI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("no config directory on this system")]
    NoConfigDir,
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// `~/.config/daybook/config.json` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("daybook").join("config.json"))
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct DaybookConfig {
    pub version: u64,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub goals_table: String,
    pub plans_table: String,
    pub routine_table: String,
    pub http_timeout_secs: u64,
    pub debug_logging: bool,
}

impl Default for DaybookConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".into(),
            goals_table: "marido_tasks".into(),
            plans_table: "marido_planning".into(),
            routine_table: "marido_routine".into(),
            http_timeout_secs: 30,
            debug_logging: false,
        }
    }
}

impl DaybookConfig {
    /// Load from `path` (or the default location), then apply environment overrides.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path().ok_or(ConfigError::NoConfigDir)?,
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override connection settings from the environment (non-empty values only).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(url) = get(ENV_SUPABASE_URL) {
            self.supabase_url = url;
        }
        if let Some(key) = get(ENV_SUPABASE_ANON_KEY) {
            self.supabase_anon_key = key;
        }
        if let Some(key) = get(ENV_GEMINI_API_KEY) {
            self.gemini_api_key = Some(key);
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.prepare(path)?;
        std::fs::write(path, text).map_err(io_error(path))
    }

    /// Write the default settings to `path` unless a file is already there, so a
    /// first run leaves a template to fill in. Returns whether a file was written.
    pub fn write_default_if_missing(path: &Path) -> Result<bool, ConfigError> {
        use std::io::Write;

        let text = Self::default().prepare(path)?;
        let mut file = match std::fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(io_error(path)(e)),
        };
        file.write_all(text.as_bytes()).map_err(io_error(path))?;
        log::info!("Wrote default config to {}", path.display());
        Ok(true)
    }

    /// Serialize, creating the parent directory on the way.
    fn prepare(&self, path: &Path) -> Result<String, ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(path))?;
        }
        serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Both the project URL and its anon key are set.
    pub fn has_backend(&self) -> bool {
        !self.supabase_url.trim().is_empty() && !self.supabase_anon_key.trim().is_empty()
    }

    pub fn tables(&self) -> Tables {
        Tables {
            goals: self.goals_table.clone(),
            plans: self.plans_table.clone(),
            routine: self.routine_table.clone(),
        }
    }
}

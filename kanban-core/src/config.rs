//! Application Configuration
//!
//! Settings come from an optional JSON file, then `KANBAN_*` environment
//! overrides. Everything has a default, so a missing file is fine.

use std::path::{Path, PathBuf};

use rolling_logger::LoggerOptions;
use serde::{Deserialize, Serialize};

use crate::store::Latency;

pub const DB_FILE_NAME: &str = "kanban.db";

/// Where repositories and snapshots live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Sqlite,
    Memory,
}

impl std::str::FromStr for StorageKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageKind::Sqlite),
            "memory" => Ok(StorageKind::Memory),
            other => Err(ConfigError::Invalid {
                key: "KANBAN_STORAGE",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub storage: StorageKind,
    /// Simulated round trip for project and user actions
    pub latency_ms: u64,
    /// Insert demo projects and users into empty repositories
    pub seed_demo_data: bool,
    pub log_filter: String,
    pub log_max_file_bytes: u64,
    pub log_max_files: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let logger = LoggerOptions::default();
        Self {
            data_dir: default_data_dir().unwrap_or_else(|| PathBuf::from(".kanban")),
            storage: StorageKind::default(),
            latency_ms: 500,
            seed_demo_data: false,
            log_filter: logger.filter,
            log_max_file_bytes: logger.max_file_bytes,
            log_max_files: logger.max_files,
        }
    }
}

/// `<local data dir>/kanban`
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("kanban"))
}

impl AppConfig {
    /// Read `path` if given, then apply the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `KANBAN_*` overrides read through `get`
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(dir) = get("KANBAN_DATA_DIR").filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir.trim());
        }
        if let Some(storage) = get("KANBAN_STORAGE") {
            self.storage = storage.parse()?;
        }
        if let Some(ms) = get("KANBAN_LATENCY_MS") {
            self.latency_ms = ms.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "KANBAN_LATENCY_MS",
                value: ms.clone(),
            })?;
        }
        if let Some(seed) = get("KANBAN_SEED_DEMO") {
            self.seed_demo_data = parse_flag(&seed).ok_or(ConfigError::Invalid {
                key: "KANBAN_SEED_DEMO",
                value: seed.clone(),
            })?;
        }
        if let Some(filter) = get("KANBAN_LOG").filter(|v| !v.trim().is_empty()) {
            self.log_filter = filter;
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn latency(&self) -> Latency {
        Latency::from_millis(self.latency_ms)
    }

    pub fn logger_options(&self) -> LoggerOptions {
        LoggerOptions {
            max_file_bytes: self.log_max_file_bytes,
            max_files: self.log_max_files,
            filter: self.log_filter.clone(),
            ..LoggerOptions::default()
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

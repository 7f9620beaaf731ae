//! Persistent configuration model, defaults, and `config.toml` I/O.

use std::path::{Path, PathBuf};

use log::{info, warn};

/// Overrides the directory holding `config.toml`.
pub const CONFIG_DIR_ENV: &str = "TRACKLIST_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no config directory available on this platform")]
    NoConfigDir,
}

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Playlist server connection.
    pub backend: BackendConfig,
    #[serde(default)]
    /// Editing behavior.
    pub editor: EditorConfig,
    #[serde(default)]
    /// Library search behavior.
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Entries requested per page when fetching a playlist.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct EditorConfig {
    /// Undo snapshots kept per playlist.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Ask before removing more than one entry from the command line.
    #[serde(default = "default_true")]
    pub confirm_bulk_remove: bool,
    /// How long the CLI waits for pending saves before exiting.
    #[serde(default = "default_save_timeout_secs")]
    pub save_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            confirm_bulk_remove: true,
            save_timeout_secs: default_save_timeout_secs(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            limit: default_search_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    15
}

fn default_page_size() -> usize {
    100
}

fn default_history_limit() -> usize {
    128
}

fn default_save_timeout_secs() -> u64 {
    10
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_search_limit() -> u32 {
    50
}

/// Clamps numeric knobs into ranges the rest of the crate relies on.
pub fn sanitize_config(config: Config) -> Config {
    let base_url = match config.backend.base_url.trim().trim_end_matches('/') {
        "" => default_base_url(),
        trimmed => trimmed.to_string(),
    };

    Config {
        backend: BackendConfig {
            base_url,
            connect_timeout_secs: config.backend.connect_timeout_secs.clamp(1, 120),
            read_timeout_secs: config.backend.read_timeout_secs.clamp(1, 600),
            page_size: config.backend.page_size.clamp(1, 1_000),
        },
        editor: EditorConfig {
            history_limit: config.editor.history_limit.clamp(2, 10_000),
            confirm_bulk_remove: config.editor.confirm_bulk_remove,
            save_timeout_secs: config.editor.save_timeout_secs.clamp(1, 300),
        },
        search: SearchConfig {
            debounce_ms: config.search.debounce_ms.min(5_000),
            limit: config.search.limit.clamp(1, 500),
        },
        logging: config.logging,
    }
}

/// `$TRACKLIST_CONFIG_DIR`, else the platform config dir plus `tracklist`.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|dir| dir.join("tracklist"))
        .ok_or(ConfigError::NoConfigDir)
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Reads `path`, writing the defaults there first if it does not exist.
/// Unparseable files fall back to defaults and are left untouched.
pub fn load_or_create(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        let config = Config::default();
        save(&config, path)?;
        return Ok(config);
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = match toml::from_str::<Config>(&content) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                "Failed to parse config file {}. Using defaults. error={}",
                path.display(),
                err
            );
            Config::default()
        }
    };
    Ok(sanitize_config(config))
}

pub fn save(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = toml::to_string(config)?;
    std::fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

//! Bootstrap configuration loading and folder resolution
//!
//! The bootstrap TOML file is read once at startup. Everything that may
//! change while running lives in the preferences file instead.
//!
//! Resolution priority for the config file and the event folder:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: the loader warns and
//! continues with compiled defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SCD_CONFIG";

/// Environment variable naming the event folder
pub const EVENT_DIR_ENV_VAR: &str = "SCD_EVENT_DIR";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder the external frontend writes its event files into
    pub event_dir: Option<PathBuf>,

    /// Downloaded media root (`<system>/<folder>/<game>.<ext>`)
    pub media_root: Option<PathBuf>,

    /// Folder holding `<system>.<ext>` logo images
    pub system_logo_dir: Option<PathBuf>,

    /// Folder holding `<system>/gamelist.xml` metadata files
    pub gamelists_root: Option<PathBuf>,

    /// Music root (`generic/` and `systems/<name>/`)
    pub music_root: Option<PathBuf>,

    /// Bundled default background image
    pub default_background: Option<PathBuf>,

    /// JSON file persisting overlay widgets
    pub widget_store: Option<PathBuf>,

    /// Preferences TOML file
    pub preferences: Option<PathBuf>,

    pub logging: LoggingConfig,

    pub ingest: IngestTiming,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Timing constants for event ingestion, all in milliseconds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestTiming {
    /// Signals for the same file within this window collapse to one
    pub coalesce_ms: u64,

    /// Wait after a signal before trusting file contents
    pub settle_ms: u64,

    /// Attempts when a companion file is still blank
    pub retry_attempts: u32,

    /// Spacing between read attempts
    pub retry_spacing_ms: u64,

    /// Scrolls ignored this long after a screensaver "game-start" hand-off
    pub handoff_window_ms: u64,

    /// Game scrolls ignored this long after a game start
    pub post_launch_window_ms: u64,

    /// System scrolls closer than this count as fast scrolling
    pub system_fast_scroll_ms: u64,

    /// Extra delay applied to a fast system scroll
    pub system_fast_delay_ms: u64,

    /// Extra delay applied to an isolated system scroll
    pub system_slow_delay_ms: u64,

    /// Game scrolls closer than this count as fast scrolling
    pub game_fast_scroll_ms: u64,

    /// Extra delay applied to a fast game scroll
    pub game_fast_delay_ms: u64,

    /// Extra delay applied to an isolated game scroll
    pub game_slow_delay_ms: u64,
}

impl Default for IngestTiming {
    fn default() -> Self {
        Self {
            coalesce_ms: 50,
            settle_ms: 50,
            retry_attempts: 5,
            retry_spacing_ms: 50,
            handoff_window_ms: 2000,
            post_launch_window_ms: 500,
            system_fast_scroll_ms: 300,
            system_fast_delay_ms: 250,
            system_slow_delay_ms: 0,
            game_fast_scroll_ms: 150,
            game_fast_delay_ms: 30,
            game_slow_delay_ms: 0,
        }
    }
}

impl IngestTiming {
    pub fn coalesce(&self) -> Duration {
        Duration::from_millis(self.coalesce_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn retry_spacing(&self) -> Duration {
        Duration::from_millis(self.retry_spacing_ms)
    }

    pub fn handoff_window(&self) -> Duration {
        Duration::from_millis(self.handoff_window_ms)
    }

    pub fn post_launch_window(&self) -> Duration {
        Duration::from_millis(self.post_launch_window_ms)
    }
}

impl TomlConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file found by `locate_config_file`, or defaults
    pub fn load(cli_path: Option<&Path>) -> Self {
        match locate_config_file(cli_path) {
            Some(path) => match Self::from_file(&path) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Config file unreadable, using defaults");
                    Self::default()
                }
            },
            None => {
                warn!("No config file found, using compiled defaults");
                Self::default()
            }
        }
    }

    /// Resolve the event folder: CLI, environment, TOML, then OS default
    pub fn resolve_event_dir(&self, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(EVENT_DIR_ENV_VAR) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        if let Some(path) = &self.event_dir {
            return path.clone();
        }
        default_frontend_root().join("logs")
    }

    pub fn media_root(&self) -> PathBuf {
        self.media_root
            .clone()
            .unwrap_or_else(|| default_frontend_root().join("downloaded_media"))
    }

    pub fn gamelists_root(&self) -> PathBuf {
        self.gamelists_root
            .clone()
            .unwrap_or_else(|| default_frontend_root().join("gamelists"))
    }

    pub fn system_logo_dir(&self) -> PathBuf {
        self.system_logo_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join("system_logos"))
    }

    pub fn music_root(&self) -> PathBuf {
        self.music_root
            .clone()
            .unwrap_or_else(|| default_data_dir().join("music"))
    }

    pub fn widget_store(&self) -> PathBuf {
        self.widget_store
            .clone()
            .unwrap_or_else(|| default_data_dir().join("widgets.json"))
    }

    pub fn preferences(&self) -> PathBuf {
        self.preferences
            .clone()
            .unwrap_or_else(|| default_config_dir().join("preferences.toml"))
    }
}

/// Find the config file: CLI path, `SCD_CONFIG`, user config, system config
pub fn locate_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = default_config_dir().join("config.toml");
    if user_config.exists() {
        return Some(user_config);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/scd/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Check that the event folder exists and is a directory
pub fn validate_event_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Event folder does not exist: {}",
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(Error::Config(format!(
            "Event folder is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("scd"))
        .unwrap_or_else(|| PathBuf::from("./scd_config"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("scd"))
        .unwrap_or_else(|| PathBuf::from("./scd_data"))
}

/// Home folder of the external frontend (`~/ES-DE`)
fn default_frontend_root() -> PathBuf {
    dirs::home_dir()
        .map(|d| d.join("ES-DE"))
        .unwrap_or_else(|| PathBuf::from("./ES-DE"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_defaults() {
        let timing = IngestTiming::default();
        assert_eq!(timing.settle(), Duration::from_millis(50));
        assert_eq!(timing.retry_attempts, 5);
        assert!(timing.game_fast_delay_ms < timing.system_fast_delay_ms);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            media_root = "/srv/media"

            [ingest]
            settle_ms = 80
            "#,
        )
        .unwrap();
        assert_eq!(config.media_root(), PathBuf::from("/srv/media"));
        assert_eq!(config.ingest.settle_ms, 80);
        assert_eq!(config.ingest.coalesce_ms, 50);
        assert_eq!(config.logging.level, "info");
    }
}

//! Configuration management for scd-engine
//!
//! Implements two-tier configuration:
//! 1. **TOML Bootstrap** (`scd_common::config::TomlConfig`): folders, logging
//!    and ingestion timing. Static for the process lifetime.
//! 2. **Preferences** (`Preferences`): what to show and play. Read as pure
//!    input from a TOML file; reloadable while running; never written here.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--config, --event-dir)
//! 2. Environment variables (SCD_CONFIG, SCD_EVENT_DIR)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! Missing or invalid preference values fall back to built-in defaults.

use crate::error::{Error, Result};
use scd_common::app_state::StateCategory;
use scd_common::config::{IngestTiming, LoggingConfig, TomlConfig};
use scd_common::display::Color;
use scd_common::fade_curves::FadeCurve;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Background source preferred for a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundSource {
    #[default]
    Fanart,
    Screenshot,
    SolidColor,
    CustomImage,
}

/// What music does while a video plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoMusicBehavior {
    /// Keep playing at full volume
    Continue,
    /// Lower the volume to `duck_volume`
    #[default]
    Duck,
    /// Fade out and pause
    Pause,
}

/// What the screen shows while the frontend's screensaver runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreensaverBehavior {
    /// Follow the screensaver's highlighted game
    #[default]
    GameImages,
    DefaultImage,
    Black,
}

/// What the screen shows while a game runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameLaunchBehavior {
    #[default]
    GameImage,
    DefaultImage,
    Black,
}

/// Video playback preferences
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoPreferences {
    pub enabled: bool,
    /// Delay between a game scroll and video start
    pub delay_ms: u64,
    /// Whether the video's own audio is audible
    pub audio_enabled: bool,
}

impl Default for VideoPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 0,
            audio_enabled: false,
        }
    }
}

impl VideoPreferences {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Ambient music preferences
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MusicPreferences {
    pub enabled: bool,
    pub system_browsing: bool,
    pub game_browsing: bool,
    pub screensaver: bool,
    /// Use per-system folders; when off every state plays generic music
    pub system_specific: bool,
    /// Full playback volume, 0.0-1.0
    pub volume: f32,
    pub crossfade_ms: u64,
    /// Interval between volume ticks during a fade
    pub fade_tick_ms: u64,
    pub curve: FadeCurve,
    pub video_behavior: VideoMusicBehavior,
    /// Volume while ducked under a video, 0.0-1.0
    pub duck_volume: f32,
}

impl Default for MusicPreferences {
    fn default() -> Self {
        Self {
            enabled: false,
            system_browsing: true,
            game_browsing: true,
            screensaver: true,
            system_specific: true,
            volume: 0.8,
            crossfade_ms: 1000,
            fade_tick_ms: 50,
            curve: FadeCurve::Linear,
            video_behavior: VideoMusicBehavior::Duck,
            duck_volume: 0.2,
        }
    }
}

impl MusicPreferences {
    /// Whether music may play for a state category
    pub fn plays_during(&self, category: StateCategory) -> bool {
        match category {
            StateCategory::SystemBrowsing => self.system_browsing,
            StateCategory::GameBrowsing => self.game_browsing,
            StateCategory::Screensaver => self.screensaver,
            StateCategory::GamePlaying => false,
        }
    }

    pub fn crossfade(&self) -> Duration {
        Duration::from_millis(self.crossfade_ms)
    }

    pub fn fade_tick(&self) -> Duration {
        Duration::from_millis(self.fade_tick_ms.max(1))
    }

    pub fn full_volume(&self) -> f32 {
        self.volume.clamp(0.0, 1.0)
    }

    pub fn ducked_volume(&self) -> f32 {
        self.duck_volume.clamp(0.0, 1.0).min(self.full_volume())
    }
}

/// User preferences consumed by the orchestrators
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub system_background: BackgroundSource,
    pub game_background: BackgroundSource,
    pub custom_background: Option<PathBuf>,
    pub solid_color: Color,
    pub video: VideoPreferences,
    pub music: MusicPreferences,
    pub screensaver: ScreensaverBehavior,
    pub game_launch: GameLaunchBehavior,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            system_background: BackgroundSource::Fanart,
            game_background: BackgroundSource::Fanart,
            custom_background: None,
            solid_color: Color::default(),
            video: VideoPreferences::default(),
            music: MusicPreferences::default(),
            screensaver: ScreensaverBehavior::default(),
            game_launch: GameLaunchBehavior::default(),
        }
    }
}

impl Preferences {
    /// Parse preferences from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid preferences: {}", e)))
    }

    /// Load preferences, degrading to defaults when the file is missing or invalid
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(prefs) => {
                    info!(path = %path.display(), "Loaded preferences");
                    prefs
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Preferences invalid, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Preferences not readable, using defaults");
                Self::default()
            }
        }
    }
}

/// Complete application configuration
///
/// Combines bootstrap (TOML) configuration with resolved folders and the
/// initial preferences snapshot.
#[derive(Debug, Clone)]
pub struct Config {
    pub event_dir: PathBuf,
    pub media_root: PathBuf,
    pub system_logo_dir: PathBuf,
    pub gamelists_root: PathBuf,
    pub music_root: PathBuf,
    pub default_background: Option<PathBuf>,
    pub widget_store: PathBuf,
    pub preferences_path: PathBuf,
    pub logging: LoggingConfig,
    pub ingest: IngestTiming,
    pub preferences: Preferences,
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub event_dir: Option<PathBuf>,
    pub preferences_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Config {
    /// Load complete configuration
    ///
    /// Never fails on missing files; only the event folder must exist, which
    /// the caller validates before watching it.
    pub fn load(overrides: ConfigOverrides) -> Self {
        let toml_config = TomlConfig::load(overrides.config_path.as_deref());
        Self::from_toml(toml_config, overrides)
    }

    /// Build configuration from an already parsed TOML config
    pub fn from_toml(toml_config: TomlConfig, overrides: ConfigOverrides) -> Self {
        let event_dir = toml_config.resolve_event_dir(overrides.event_dir.as_deref());
        let preferences_path = overrides
            .preferences_path
            .unwrap_or_else(|| toml_config.preferences());
        let preferences = Preferences::load(&preferences_path);

        let mut logging = toml_config.logging.clone();
        if let Some(level) = overrides.log_level {
            logging.level = level;
        }

        Self {
            event_dir,
            media_root: toml_config.media_root(),
            system_logo_dir: toml_config.system_logo_dir(),
            gamelists_root: toml_config.gamelists_root(),
            music_root: toml_config.music_root(),
            default_background: toml_config.default_background.clone(),
            widget_store: toml_config.widget_store(),
            preferences_path,
            logging,
            ingest: toml_config.ingest.clone(),
            preferences,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_preferences() {
        let prefs = Preferences::default();
        assert_eq!(prefs.game_background, BackgroundSource::Fanart);
        assert!(!prefs.music.enabled);
        assert!(prefs.video.enabled);
        assert_eq!(prefs.music.video_behavior, VideoMusicBehavior::Duck);
    }

    #[test]
    fn test_parse_partial_preferences() {
        let prefs = Preferences::parse(
            r##"
            game_background = "screenshot"
            solid_color = "#202040"
            game_launch = "black"

            [music]
            enabled = true
            screensaver = false
            video_behavior = "pause"
            curve = "equal_power"
            "##,
        )
        .unwrap();

        assert_eq!(prefs.game_background, BackgroundSource::Screenshot);
        assert_eq!(prefs.system_background, BackgroundSource::Fanart);
        assert_eq!(prefs.solid_color, Color(0xFF20_2040));
        assert_eq!(prefs.game_launch, GameLaunchBehavior::Black);
        assert!(prefs.music.enabled);
        assert!(!prefs.music.plays_during(StateCategory::Screensaver));
        assert!(prefs.music.plays_during(StateCategory::GameBrowsing));
        assert_eq!(prefs.music.video_behavior, VideoMusicBehavior::Pause);
        assert_eq!(prefs.music.curve, FadeCurve::EqualPower);
        assert_eq!(prefs.music.crossfade_ms, 1000);
    }

    #[test]
    fn test_gameplay_never_plays_music() {
        let prefs = MusicPreferences::default();
        assert!(!prefs.plays_during(StateCategory::GamePlaying));
    }

    #[test]
    fn test_ducked_volume_never_exceeds_full() {
        let prefs = MusicPreferences {
            volume: 0.3,
            duck_volume: 0.5,
            ..Default::default()
        };
        assert_eq!(prefs.ducked_volume(), 0.3);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let prefs = Preferences::load(&temp.path().join("missing.toml"));
        assert_eq!(prefs.system_background, BackgroundSource::Fanart);
    }

    #[test]
    fn test_load_invalid_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("prefs.toml");
        std::fs::write(&path, "game_background = \"sepia\"").unwrap();
        let prefs = Preferences::load(&path);
        assert_eq!(prefs.game_background, BackgroundSource::Fanart);
    }

    #[test]
    fn test_overrides_apply() {
        let temp = TempDir::new().unwrap();
        let config = Config::from_toml(
            TomlConfig::default(),
            ConfigOverrides {
                event_dir: Some(temp.path().to_path_buf()),
                preferences_path: Some(temp.path().join("prefs.toml")),
                log_level: Some("debug".into()),
                ..Default::default()
            },
        );
        assert_eq!(config.event_dir, temp.path());
        assert_eq!(config.logging.level, "debug");
    }
}

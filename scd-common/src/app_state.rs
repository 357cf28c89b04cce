//! Browsing state model
//!
//! `AppState` is the single "what is the user looking at" value mirrored from
//! the external frontend. The engine's state machine owns the one live
//! instance; everything else receives clones.

use serde::{Deserialize, Serialize};

use crate::widgets::WidgetContext;

/// Game highlighted while the frontend's screensaver browses on its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreensaverGame {
    pub system_name: String,
    pub game_filename: String,
    pub game_name: Option<String>,
}

/// What to restore when the screensaver is cancelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum SavedBrowsingState {
    InSystemView {
        system_name: String,
    },
    InGameView {
        system_name: String,
        game_filename: String,
        game_name: Option<String>,
    },
}

impl SavedBrowsingState {
    /// Browsing state this snapshot restores to
    pub fn restore(&self) -> AppState {
        match self {
            SavedBrowsingState::InSystemView { system_name } => AppState::SystemBrowsing {
                system_name: system_name.clone(),
            },
            SavedBrowsingState::InGameView {
                system_name,
                game_filename,
                game_name,
            } => AppState::GameBrowsing {
                system_name: system_name.clone(),
                game_filename: game_filename.clone(),
                game_name: game_name.clone(),
            },
        }
    }
}

/// Current browsing/playing state of the external frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AppState {
    SystemBrowsing {
        system_name: String,
    },
    GameBrowsing {
        system_name: String,
        game_filename: String,
        game_name: Option<String>,
    },
    GamePlaying {
        system_name: String,
        game_filename: String,
    },
    Screensaver {
        current_game: Option<ScreensaverGame>,
        previous_state: SavedBrowsingState,
    },
}

/// Payload-free discriminant of `AppState`, used for preference lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCategory {
    SystemBrowsing,
    GameBrowsing,
    GamePlaying,
    Screensaver,
}

impl std::fmt::Display for StateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateCategory::SystemBrowsing => write!(f, "system_browsing"),
            StateCategory::GameBrowsing => write!(f, "game_browsing"),
            StateCategory::GamePlaying => write!(f, "game_playing"),
            StateCategory::Screensaver => write!(f, "screensaver"),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState::SystemBrowsing {
            system_name: String::new(),
        }
    }
}

impl AppState {
    pub fn category(&self) -> StateCategory {
        match self {
            AppState::SystemBrowsing { .. } => StateCategory::SystemBrowsing,
            AppState::GameBrowsing { .. } => StateCategory::GameBrowsing,
            AppState::GamePlaying { .. } => StateCategory::GamePlaying,
            AppState::Screensaver { .. } => StateCategory::Screensaver,
        }
    }

    /// System the state refers to, if any
    ///
    /// For the screensaver this is the highlighted game's system.
    pub fn system_name(&self) -> Option<&str> {
        let name = match self {
            AppState::SystemBrowsing { system_name }
            | AppState::GameBrowsing { system_name, .. }
            | AppState::GamePlaying { system_name, .. } => system_name.as_str(),
            AppState::Screensaver { current_game, .. } => {
                current_game.as_ref()?.system_name.as_str()
            }
        };
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Game filename the state refers to, if any
    pub fn game_filename(&self) -> Option<&str> {
        match self {
            AppState::SystemBrowsing { .. } => None,
            AppState::GameBrowsing { game_filename, .. }
            | AppState::GamePlaying { game_filename, .. } => Some(game_filename.as_str()),
            AppState::Screensaver { current_game, .. } => {
                current_game.as_ref().map(|g| g.game_filename.as_str())
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, AppState::GamePlaying { .. })
    }

    pub fn is_screensaver(&self) -> bool {
        matches!(self, AppState::Screensaver { .. })
    }

    /// Widget context whose layout applies to this state
    pub fn widget_context(&self) -> WidgetContext {
        match self {
            AppState::SystemBrowsing { .. } => WidgetContext::System,
            _ => WidgetContext::Game,
        }
    }

    /// Snapshot used as the screensaver's restore point
    ///
    /// A running game has no browsing view of its own, so it is remembered as
    /// the game view of the same game.
    pub fn snapshot(&self) -> SavedBrowsingState {
        match self {
            AppState::SystemBrowsing { system_name } => SavedBrowsingState::InSystemView {
                system_name: system_name.clone(),
            },
            AppState::GameBrowsing {
                system_name,
                game_filename,
                game_name,
            } => SavedBrowsingState::InGameView {
                system_name: system_name.clone(),
                game_filename: game_filename.clone(),
                game_name: game_name.clone(),
            },
            AppState::GamePlaying {
                system_name,
                game_filename,
            } => SavedBrowsingState::InGameView {
                system_name: system_name.clone(),
                game_filename: game_filename.clone(),
                game_name: None,
            },
            AppState::Screensaver { previous_state, .. } => previous_state.clone(),
        }
    }
}

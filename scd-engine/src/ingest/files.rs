//! Event file contract and typed external events
//!
//! The external frontend keeps one small text file per fact in its event
//! folder. Trigger files start an event when they change; companion files are
//! read alongside (a game scroll is a filename plus a system name, written by
//! two separate file operations).

use scd_common::app_state::ScreensaverGame;

/// Known files in the event folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFile {
    SystemName,
    GameFilename,
    GameName,
    GameSystem,
    GameStartFilename,
    GameStartName,
    GameStartSystem,
    GameEndFilename,
    GameEndName,
    GameEndSystem,
    ScreensaverStart,
    ScreensaverEnd,
    ScreensaverGameFilename,
    ScreensaverGameName,
    ScreensaverGameSystem,
}

/// Event kind started by a trigger file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    SystemScroll,
    GameScroll,
    GameStart,
    GameEnd,
    ScreensaverStart,
    ScreensaverEnd,
    ScreensaverGameSelect,
}

/// Scroll categories get their own cancellable dispatch slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollCategory {
    System,
    Game,
}

impl EventFile {
    pub fn all_variants() -> &'static [EventFile] {
        &[
            EventFile::SystemName,
            EventFile::GameFilename,
            EventFile::GameName,
            EventFile::GameSystem,
            EventFile::GameStartFilename,
            EventFile::GameStartName,
            EventFile::GameStartSystem,
            EventFile::GameEndFilename,
            EventFile::GameEndName,
            EventFile::GameEndSystem,
            EventFile::ScreensaverStart,
            EventFile::ScreensaverEnd,
            EventFile::ScreensaverGameFilename,
            EventFile::ScreensaverGameName,
            EventFile::ScreensaverGameSystem,
        ]
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            EventFile::SystemName => "esde_system_name.txt",
            EventFile::GameFilename => "esde_game_filename.txt",
            EventFile::GameName => "esde_game_name.txt",
            EventFile::GameSystem => "esde_game_system.txt",
            EventFile::GameStartFilename => "esde_gamestart_filename.txt",
            EventFile::GameStartName => "esde_gamestart_name.txt",
            EventFile::GameStartSystem => "esde_gamestart_system.txt",
            EventFile::GameEndFilename => "esde_gameend_filename.txt",
            EventFile::GameEndName => "esde_gameend_name.txt",
            EventFile::GameEndSystem => "esde_gameend_system.txt",
            EventFile::ScreensaverStart => "esde_screensaver_start.txt",
            EventFile::ScreensaverEnd => "esde_screensaver_end.txt",
            EventFile::ScreensaverGameFilename => "esde_screensavergameselect_filename.txt",
            EventFile::ScreensaverGameName => "esde_screensavergameselect_name.txt",
            EventFile::ScreensaverGameSystem => "esde_screensavergameselect_system.txt",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::all_variants()
            .iter()
            .copied()
            .find(|f| f.file_name() == name)
    }

    /// Event this file starts, or `None` for companion files
    pub fn trigger(&self) -> Option<Trigger> {
        match self {
            EventFile::SystemName => Some(Trigger::SystemScroll),
            EventFile::GameFilename => Some(Trigger::GameScroll),
            EventFile::GameStartFilename => Some(Trigger::GameStart),
            EventFile::GameEndFilename => Some(Trigger::GameEnd),
            EventFile::ScreensaverStart => Some(Trigger::ScreensaverStart),
            EventFile::ScreensaverEnd => Some(Trigger::ScreensaverEnd),
            EventFile::ScreensaverGameFilename => Some(Trigger::ScreensaverGameSelect),
            _ => None,
        }
    }
}

impl Trigger {
    pub fn scroll_category(&self) -> Option<ScrollCategory> {
        match self {
            Trigger::SystemScroll => Some(ScrollCategory::System),
            Trigger::GameScroll => Some(ScrollCategory::Game),
            _ => None,
        }
    }
}

/// Why the frontend's screensaver ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreensaverEndReason {
    /// User dismissed it; restore the pre-screensaver view
    Cancel,
    /// User jumped to the highlighted game
    GameJump,
    /// User launched the highlighted game; a GameStarted follows
    GameStart,
}

impl ScreensaverEndReason {
    /// Parse the end marker's contents; unknown reasons behave like "cancel"
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "game-jump" => ScreensaverEndReason::GameJump,
            "game-start" => ScreensaverEndReason::GameStart,
            _ => ScreensaverEndReason::Cancel,
        }
    }
}

/// Typed event emitted by the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalEvent {
    SystemScrolled {
        system_name: String,
    },
    GameScrolled {
        system_name: String,
        game_filename: String,
        game_name: Option<String>,
    },
    GameStarted {
        system_name: String,
        game_filename: String,
    },
    GameEnded {
        system_name: String,
        game_filename: String,
        game_name: Option<String>,
    },
    ScreensaverStarted,
    ScreensaverEnded {
        reason: ScreensaverEndReason,
    },
    ScreensaverGameSelected(ScreensaverGame),
}

impl ExternalEvent {
    /// Short event name for log lines
    pub fn name(&self) -> &'static str {
        match self {
            ExternalEvent::SystemScrolled { .. } => "SystemScrolled",
            ExternalEvent::GameScrolled { .. } => "GameScrolled",
            ExternalEvent::GameStarted { .. } => "GameStarted",
            ExternalEvent::GameEnded { .. } => "GameEnded",
            ExternalEvent::ScreensaverStarted => "ScreensaverStarted",
            ExternalEvent::ScreensaverEnded { .. } => "ScreensaverEnded",
            ExternalEvent::ScreensaverGameSelected(_) => "ScreensaverGameSelected",
        }
    }

    pub fn is_scroll(&self) -> bool {
        matches!(
            self,
            ExternalEvent::SystemScrolled { .. } | ExternalEvent::GameScrolled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_round_trip() {
        for file in EventFile::all_variants() {
            assert_eq!(EventFile::from_file_name(file.file_name()), Some(*file));
        }
        assert_eq!(EventFile::from_file_name("esde_unknown.txt"), None);
    }

    #[test]
    fn test_companion_files_do_not_trigger() {
        assert_eq!(EventFile::GameSystem.trigger(), None);
        assert_eq!(EventFile::GameName.trigger(), None);
        assert_eq!(EventFile::GameFilename.trigger(), Some(Trigger::GameScroll));
        assert_eq!(
            Trigger::GameScroll.scroll_category(),
            Some(ScrollCategory::Game)
        );
        assert_eq!(Trigger::GameStart.scroll_category(), None);
    }

    #[test]
    fn test_end_reason_parse() {
        assert_eq!(ScreensaverEndReason::parse("game-start\n"), ScreensaverEndReason::GameStart);
        assert_eq!(ScreensaverEndReason::parse("game-jump"), ScreensaverEndReason::GameJump);
        assert_eq!(ScreensaverEndReason::parse("cancel"), ScreensaverEndReason::Cancel);
        assert_eq!(ScreensaverEndReason::parse("whatever"), ScreensaverEndReason::Cancel);
    }
}

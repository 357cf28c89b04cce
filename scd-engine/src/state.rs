//! Browsing state machine
//!
//! Owns the single live `AppState` and applies external events to it. Side
//! effects are returned as data (`Effect`) instead of being performed here;
//! the engine loop dispatches them to the orchestrators after the new state
//! is committed.

use scd_common::app_state::{AppState, SavedBrowsingState, ScreensaverGame};
use tracing::{debug, info};

use crate::ingest::files::{ExternalEvent, ScreensaverEndReason};

/// Work requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Load the system background
    ShowSystem { system_name: String },
    /// Load the game background and schedule its video
    ShowGame {
        system_name: String,
        game_filename: String,
    },
    /// Apply the game-launch display behavior
    ShowGameLaunch {
        system_name: String,
        game_filename: String,
    },
    /// Apply the screensaver display behavior
    ShowScreensaver,
    /// Follow the screensaver's highlighted game
    ShowScreensaverGame(ScreensaverGame),
    /// Reload the widget layer for the new state
    RefreshWidgets,
    /// Re-resolve game widgets for the highlighted screensaver game only
    RefreshScreensaverWidgets,
    /// Re-evaluate music against the committed state; always last
    ReevaluateMusic,
}

/// Outcome of applying one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Applied {
        previous: AppState,
        current: AppState,
        effects: Vec<Effect>,
    },
    Ignored {
        reason: &'static str,
    },
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }

    pub fn effects(&self) -> &[Effect] {
        match self {
            Transition::Applied { effects, .. } => effects,
            Transition::Ignored { .. } => &[],
        }
    }
}

#[derive(Debug, Default)]
pub struct StateMachine {
    current: AppState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known state (tests, restored sessions)
    pub fn with_state(state: AppState) -> Self {
        Self { current: state }
    }

    pub fn current(&self) -> &AppState {
        &self.current
    }

    /// Apply an event, committing the new state before returning its effects
    pub fn apply(&mut self, event: ExternalEvent) -> Transition {
        let event_name = event.name();
        let outcome = self.next_state(event);

        match outcome {
            Ok((next, mut effects)) => {
                effects.push(Effect::ReevaluateMusic);
                let previous = std::mem::replace(&mut self.current, next);
                info!(
                    event = event_name,
                    from = %previous.category(),
                    to = %self.current.category(),
                    system = self.current.system_name().unwrap_or(""),
                    "State transition"
                );
                Transition::Applied {
                    previous,
                    current: self.current.clone(),
                    effects,
                }
            }
            Err(reason) => {
                debug!(event = event_name, state = %self.current.category(), reason, "Event ignored");
                Transition::Ignored { reason }
            }
        }
    }

    fn next_state(
        &self,
        event: ExternalEvent,
    ) -> std::result::Result<(AppState, Vec<Effect>), &'static str> {
        match event {
            ExternalEvent::SystemScrolled { system_name } => {
                if self.current.is_playing() {
                    return Err("scroll while a game is playing");
                }
                let effects = vec![
                    Effect::ShowSystem {
                        system_name: system_name.clone(),
                    },
                    Effect::RefreshWidgets,
                ];
                Ok((AppState::SystemBrowsing { system_name }, effects))
            }

            ExternalEvent::GameScrolled {
                system_name,
                game_filename,
                game_name,
            } => {
                if self.current.is_playing() {
                    return Err("scroll while a game is playing");
                }
                Ok(browse_game(system_name, game_filename, game_name))
            }

            // Also accepted while already playing: the end of the previous
            // game was missed and the new launch replaces it.
            ExternalEvent::GameStarted {
                system_name,
                game_filename,
            } => {
                let effects = vec![
                    Effect::ShowGameLaunch {
                        system_name: system_name.clone(),
                        game_filename: game_filename.clone(),
                    },
                    Effect::RefreshWidgets,
                ];
                Ok((
                    AppState::GamePlaying {
                        system_name,
                        game_filename,
                    },
                    effects,
                ))
            }

            ExternalEvent::GameEnded {
                system_name,
                game_filename,
                game_name,
            } => {
                if !self.current.is_playing() {
                    return Err("game end without a running game");
                }
                Ok(browse_game(system_name, game_filename, game_name))
            }

            ExternalEvent::ScreensaverStarted => match &self.current {
                AppState::SystemBrowsing { .. } | AppState::GameBrowsing { .. } => Ok((
                    AppState::Screensaver {
                        current_game: None,
                        previous_state: self.current.snapshot(),
                    },
                    vec![Effect::ShowScreensaver, Effect::RefreshWidgets],
                )),
                AppState::Screensaver { .. } => Err("screensaver already running"),
                AppState::GamePlaying { .. } => Err("screensaver while a game is playing"),
            },

            ExternalEvent::ScreensaverGameSelected(game) => match &self.current {
                AppState::Screensaver { previous_state, .. } => Ok((
                    AppState::Screensaver {
                        current_game: Some(game.clone()),
                        previous_state: previous_state.clone(),
                    },
                    vec![
                        Effect::ShowScreensaverGame(game),
                        Effect::RefreshScreensaverWidgets,
                    ],
                )),
                // Start notification was lost; enter the screensaver first
                _ => {
                    debug!("Screensaver selection without start, synthesizing start");
                    Ok((
                        AppState::Screensaver {
                            current_game: Some(game.clone()),
                            previous_state: self.current.snapshot(),
                        },
                        vec![
                            Effect::ShowScreensaver,
                            Effect::RefreshWidgets,
                            Effect::ShowScreensaverGame(game),
                            Effect::RefreshScreensaverWidgets,
                        ],
                    ))
                }
            },

            ExternalEvent::ScreensaverEnded { reason } => match &self.current {
                AppState::Screensaver {
                    current_game,
                    previous_state,
                } => Ok(end_screensaver(reason, current_game.as_ref(), previous_state)),
                _ => Err("screensaver end without a running screensaver"),
            },
        }
    }
}

fn browse_game(
    system_name: String,
    game_filename: String,
    game_name: Option<String>,
) -> (AppState, Vec<Effect>) {
    let effects = vec![
        Effect::ShowGame {
            system_name: system_name.clone(),
            game_filename: game_filename.clone(),
        },
        Effect::RefreshWidgets,
    ];
    (
        AppState::GameBrowsing {
            system_name,
            game_filename,
            game_name,
        },
        effects,
    )
}

fn end_screensaver(
    reason: ScreensaverEndReason,
    current_game: Option<&ScreensaverGame>,
    previous_state: &SavedBrowsingState,
) -> (AppState, Vec<Effect>) {
    match (reason, current_game) {
        (ScreensaverEndReason::GameStart | ScreensaverEndReason::GameJump, Some(game)) => browse_game(
            game.system_name.clone(),
            game.game_filename.clone(),
            game.game_name.clone(),
        ),
        _ => {
            let restored = previous_state.restore();
            let show = match &restored {
                AppState::GameBrowsing {
                    system_name,
                    game_filename,
                    ..
                } => Effect::ShowGame {
                    system_name: system_name.clone(),
                    game_filename: game_filename.clone(),
                },
                other => Effect::ShowSystem {
                    system_name: other.system_name().unwrap_or_default().to_string(),
                },
            };
            (restored, vec![show, Effect::RefreshWidgets])
        }
    }
}

//! End-to-end state tests: event files in, committed transitions out
//!
//! Runs the real engine loop on a paused clock with in-memory collaborators.

mod helpers;

use std::time::Duration;

use helpers::{state_changes, TestEngine};
use scd_common::app_state::{AppState, SavedBrowsingState, ScreensaverGame, StateCategory};
use scd_common::events::CompanionEvent;
use scd_engine::ingest::EventFile;

fn system(name: &str) -> AppState {
    AppState::SystemBrowsing {
        system_name: name.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_system_scroll_commits_state() {
    let mut engine = TestEngine::builder().start();

    engine.scroll_system("snes");
    assert_eq!(
        engine.wait_for_state(StateCategory::SystemBrowsing).await,
        system("snes")
    );

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_last_scroll_wins() {
    let mut engine = TestEngine::builder()
        .options(|o| o.ingest.coalesce_ms = 10)
        .start();

    // Second scroll lands while the first is still settling
    engine.scroll_system("snes");
    tokio::time::sleep(Duration::from_millis(20)).await;
    engine.scroll_system("genesis");

    let events = engine.collect_for(Duration::from_secs(2)).await;
    let states: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CompanionEvent::StateChanged { new_state, .. } => Some(new_state.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![system("genesis")]);

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_game_lifecycle() {
    let mut engine = TestEngine::builder().start();

    engine.scroll_game("snes", "mario.sfc");
    engine.wait_for_state(StateCategory::GameBrowsing).await;

    engine.start_game("snes", "mario.sfc");
    assert_eq!(
        engine.wait_for_state(StateCategory::GamePlaying).await,
        AppState::GamePlaying {
            system_name: "snes".to_string(),
            game_filename: "mario.sfc".to_string(),
        }
    );

    engine.end_game("snes", "mario.sfc");
    let state = engine.wait_for_state(StateCategory::GameBrowsing).await;
    assert_eq!(state.game_filename(), Some("mario.sfc"));

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_scrolls_ignored_while_playing() {
    let mut engine = TestEngine::builder().start();

    engine.start_game("snes", "mario.sfc");
    engine.wait_for_state(StateCategory::GamePlaying).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    engine.scroll_system("nes");
    let events = engine.collect_for(Duration::from_secs(2)).await;
    assert!(state_changes(&events).is_empty());

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_game_end_without_start_ignored() {
    let mut engine = TestEngine::builder().start();

    engine.scroll_system("snes");
    engine.wait_for_state(StateCategory::SystemBrowsing).await;

    engine.end_game("snes", "mario.sfc");
    let events = engine.collect_for(Duration::from_secs(2)).await;
    assert!(state_changes(&events).is_empty());

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_screensaver_cancel_restores_once() {
    let mut engine = TestEngine::builder().start();

    engine.scroll_system("snes");
    engine.wait_for_state(StateCategory::SystemBrowsing).await;

    engine.start_screensaver();
    engine.wait_for_state(StateCategory::Screensaver).await;

    engine.end_screensaver("cancel");
    let events = engine.collect_for(Duration::from_secs(2)).await;
    assert_eq!(state_changes(&events), vec![StateCategory::SystemBrowsing]);
    assert!(events.iter().any(|e| matches!(
        e,
        CompanionEvent::StateChanged { new_state, .. } if *new_state == system("snes")
    )));

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_missed_screensaver_start_is_synthesized() {
    let mut engine = TestEngine::builder().start();

    engine.scroll_system("snes");
    engine.wait_for_state(StateCategory::SystemBrowsing).await;

    engine.select_screensaver_game("nes", "zelda.nes");
    let state = engine.wait_for_state(StateCategory::Screensaver).await;
    assert_eq!(
        state,
        AppState::Screensaver {
            current_game: Some(ScreensaverGame {
                system_name: "nes".to_string(),
                game_filename: "zelda.nes".to_string(),
                game_name: None,
            }),
            previous_state: SavedBrowsingState::InSystemView {
                system_name: "snes".to_string(),
            },
        }
    );

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_screensaver_scrolls_suppressed() {
    let mut engine = TestEngine::builder().start();

    engine.scroll_system("snes");
    engine.wait_for_state(StateCategory::SystemBrowsing).await;
    engine.start_screensaver();
    engine.wait_for_state(StateCategory::Screensaver).await;

    // The frontend's screensaver browsing also rewrites scroll files
    engine.scroll_game("nes", "zelda.nes");
    let events = engine.collect_for(Duration::from_secs(2)).await;
    assert!(state_changes(&events).is_empty());

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_screensaver_game_start_handoff() {
    let mut engine = TestEngine::builder().start();

    engine.scroll_system("snes");
    engine.wait_for_state(StateCategory::SystemBrowsing).await;
    engine.start_screensaver();
    engine.wait_for_state(StateCategory::Screensaver).await;
    engine.select_screensaver_game("nes", "zelda.nes");
    engine
        .wait_for(|e| matches!(
            e,
            CompanionEvent::StateChanged { new_state: AppState::Screensaver { current_game: Some(_), .. }, .. }
        ))
        .await;

    engine.end_screensaver("game-start");
    let state = engine.wait_for_state(StateCategory::GameBrowsing).await;
    assert_eq!(state.game_filename(), Some("zelda.nes"));

    // Scroll noise during the hand-off is dropped, the launch goes through
    engine.scroll_game("nes", "other.nes");
    tokio::time::sleep(Duration::from_millis(200)).await;
    engine.start_game("nes", "zelda.nes");

    let events = engine.collect_for(Duration::from_secs(3)).await;
    assert_eq!(state_changes(&events), vec![StateCategory::GamePlaying]);

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_game_jump_browses_highlighted_game() {
    let mut engine = TestEngine::builder().start();

    engine.scroll_system("snes");
    engine.wait_for_state(StateCategory::SystemBrowsing).await;
    engine.select_screensaver_game("nes", "zelda.nes");
    engine.wait_for_state(StateCategory::Screensaver).await;

    engine.end_screensaver("game-jump");
    let state = engine.wait_for_state(StateCategory::GameBrowsing).await;
    assert_eq!(state.system_name(), Some("nes"));
    assert_eq!(state.game_filename(), Some("zelda.nes"));

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_via_handle() {
    let engine = TestEngine::builder().start();
    let handle = engine.handle.clone();
    engine.stop().await;
    assert!(handle.signal(EventFile::SystemName).is_err());
}

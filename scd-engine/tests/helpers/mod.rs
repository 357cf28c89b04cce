//! Test helpers for scd-engine integration tests
//!
//! Provides in-memory collaborators and a `TestEngine` harness that runs the
//! real engine loop on a paused Tokio clock:
//! - MemoryEventSource: event folder contents, written by the test
//! - FakeMediaResolver: artwork/video/logo hits configured per test
//! - MemoryMusicLibrary: tracks per music source
//! - RecordingAudioBackend: records every player operation
//! - MemoryWidgetStore / StaticMetadata: widget layout and descriptions

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scd_common::app_state::{AppState, StateCategory};
use scd_common::display::MusicSource;
use scd_common::events::CompanionEvent;
use scd_common::widgets::Widget;
use scd_engine::engine::{Collaborators, CompanionEngine, EngineHandle, EngineOptions};
use scd_engine::ingest::{EventFile, EventSource};
use scd_engine::media::{MediaKind, MediaResolver};
use scd_engine::music::{AudioBackend, AudioPlayer, DeckError, MusicLibrary};
use scd_engine::widgets::{GameMetadata, WidgetStore};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Upper bound for waiting on an event (virtual time)
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

// ========================================
// Event folder
// ========================================

#[derive(Default)]
pub struct MemoryEventSource {
    files: Mutex<HashMap<EventFile, String>>,
}

impl MemoryEventSource {
    pub fn set(&self, file: EventFile, value: &str) {
        self.files.lock().unwrap().insert(file, value.to_string());
    }

    pub fn remove(&self, file: EventFile) {
        self.files.lock().unwrap().remove(&file);
    }
}

impl EventSource for MemoryEventSource {
    fn exists(&self, file: EventFile) -> bool {
        self.files.lock().unwrap().contains_key(&file)
    }

    fn read(&self, file: EventFile) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(&file)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

// ========================================
// Media
// ========================================

/// Path the fake resolver returns for a game's media
pub fn game_media(system: &str, game: &str, kind: MediaKind) -> PathBuf {
    PathBuf::from(format!("/media/{}/{}/{}", system, kind.folder_name(), game))
}

/// Path the fake resolver returns for a random folder pick
pub fn random_media(system: &str, kind: MediaKind) -> PathBuf {
    PathBuf::from(format!("/media/{}/{}/random", system, kind.folder_name()))
}

pub fn logo(system: &str) -> PathBuf {
    PathBuf::from(format!("/logos/{}.png", system))
}

#[derive(Default)]
pub struct FakeMediaResolver {
    game: HashSet<(String, String, MediaKind)>,
    random: HashSet<(String, MediaKind)>,
    logos: HashSet<String>,
    files: HashSet<PathBuf>,
    lookups: Mutex<u32>,
}

impl FakeMediaResolver {
    pub fn with_game_media(mut self, system: &str, game: &str, kind: MediaKind) -> Self {
        self.game
            .insert((system.to_string(), game.to_string(), kind));
        self
    }

    pub fn with_random_media(mut self, system: &str, kind: MediaKind) -> Self {
        self.random.insert((system.to_string(), kind));
        self
    }

    pub fn with_logo(mut self, system: &str) -> Self {
        self.logos.insert(system.to_string());
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.insert(path.into());
        self
    }

    pub fn lookups(&self) -> u32 {
        *self.lookups.lock().unwrap()
    }
}

impl MediaResolver for FakeMediaResolver {
    fn find_game_media(
        &self,
        system_name: &str,
        game_filename: &str,
        kind: MediaKind,
    ) -> scd_engine::Result<Option<PathBuf>> {
        *self.lookups.lock().unwrap() += 1;
        let key = (system_name.to_string(), game_filename.to_string(), kind);
        Ok(self
            .game
            .contains(&key)
            .then(|| game_media(system_name, game_filename, kind)))
    }

    fn find_random_media(
        &self,
        system_name: &str,
        kind: MediaKind,
    ) -> scd_engine::Result<Option<PathBuf>> {
        *self.lookups.lock().unwrap() += 1;
        Ok(self
            .random
            .contains(&(system_name.to_string(), kind))
            .then(|| random_media(system_name, kind)))
    }

    fn find_system_logo(&self, system_name: &str) -> scd_engine::Result<Option<PathBuf>> {
        Ok(self.logos.contains(system_name).then(|| logo(system_name)))
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files.contains(path)
    }
}

// ========================================
// Music
// ========================================

#[derive(Default)]
pub struct MemoryMusicLibrary {
    tracks: HashMap<MusicSource, Vec<PathBuf>>,
}

impl MemoryMusicLibrary {
    /// Add `count` tracks named `<source>-<n>.ogg`
    pub fn with_tracks(mut self, source: MusicSource, count: usize) -> Self {
        let tracks = (1..=count)
            .map(|n| PathBuf::from(format!("/music/{}-{}.ogg", source, n)))
            .collect();
        self.tracks.insert(source, tracks);
        self
    }
}

impl MusicLibrary for MemoryMusicLibrary {
    fn tracks(&self, source: &MusicSource) -> Vec<PathBuf> {
        self.tracks.get(source).cloned().unwrap_or_default()
    }
}

/// One recorded player operation
#[derive(Debug, Clone, PartialEq)]
pub enum AudioOp {
    Open(PathBuf),
    Play(PathBuf),
    Pause(PathBuf),
    Volume(PathBuf, f32),
    Release(PathBuf),
}

#[derive(Default)]
pub struct RecordingAudioBackend {
    ops: Arc<Mutex<Vec<AudioOp>>>,
    /// Players opened before this index were invalidated by the backend
    invalidated_before: Arc<Mutex<usize>>,
}

impl RecordingAudioBackend {
    pub fn ops(&self) -> Vec<AudioOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                AudioOp::Open(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.opened().len()
    }

    pub fn release_count(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, AudioOp::Release(_)))
            .count()
    }

    /// Players opened and not yet released
    pub fn live_players(&self) -> usize {
        self.open_count() - self.release_count()
    }

    pub fn paused(&self) -> bool {
        matches!(self.ops().last(), Some(AudioOp::Pause(_)))
    }

    /// Last volume set on `track`
    pub fn volume_of(&self, track: &Path) -> Option<f32> {
        self.ops().iter().rev().find_map(|op| match op {
            AudioOp::Volume(path, volume) if path == track => Some(*volume),
            _ => None,
        })
    }

    /// Make every existing player report `Released` from now on
    pub fn invalidate_players(&self) {
        *self.invalidated_before.lock().unwrap() = self.open_count();
    }
}

impl AudioBackend for RecordingAudioBackend {
    fn open(&self, track: &Path) -> Result<Box<dyn AudioPlayer>, DeckError> {
        let index = self.open_count();
        self.ops.lock().unwrap().push(AudioOp::Open(track.to_path_buf()));
        Ok(Box::new(RecordingPlayer {
            index,
            track: track.to_path_buf(),
            ops: Arc::clone(&self.ops),
            invalidated_before: Arc::clone(&self.invalidated_before),
        }))
    }
}

struct RecordingPlayer {
    index: usize,
    track: PathBuf,
    ops: Arc<Mutex<Vec<AudioOp>>>,
    invalidated_before: Arc<Mutex<usize>>,
}

impl RecordingPlayer {
    fn record(&self, op: AudioOp) -> Result<(), DeckError> {
        if self.index < *self.invalidated_before.lock().unwrap() {
            return Err(DeckError::Released);
        }
        self.ops.lock().unwrap().push(op);
        Ok(())
    }
}

impl AudioPlayer for RecordingPlayer {
    fn play(&mut self) -> Result<(), DeckError> {
        self.record(AudioOp::Play(self.track.clone()))
    }

    fn pause(&mut self) -> Result<(), DeckError> {
        self.record(AudioOp::Pause(self.track.clone()))
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), DeckError> {
        self.record(AudioOp::Volume(self.track.clone(), volume))
    }

    fn release(&mut self) -> Result<(), DeckError> {
        self.record(AudioOp::Release(self.track.clone()))
    }
}

// ========================================
// Widgets
// ========================================

#[derive(Default)]
pub struct MemoryWidgetStore {
    widgets: Mutex<Option<Vec<Widget>>>,
}

impl MemoryWidgetStore {
    /// Store with an existing saved layout
    pub fn with_widgets(widgets: Vec<Widget>) -> Self {
        Self {
            widgets: Mutex::new(Some(widgets)),
        }
    }

    pub fn saved(&self) -> Vec<Widget> {
        self.widgets.lock().unwrap().clone().unwrap_or_default()
    }
}

impl WidgetStore for MemoryWidgetStore {
    fn load_widgets(&self) -> scd_engine::Result<Vec<Widget>> {
        Ok(self.saved())
    }

    fn save_widgets(&self, widgets: &[Widget]) -> scd_engine::Result<()> {
        *self.widgets.lock().unwrap() = Some(widgets.to_vec());
        Ok(())
    }

    fn delete_widget(&self, id: Uuid) -> scd_engine::Result<()> {
        let mut guard = self.widgets.lock().unwrap();
        guard.get_or_insert_with(Vec::new).retain(|w| w.id != id);
        Ok(())
    }

    fn has_saved_layout(&self) -> bool {
        self.widgets.lock().unwrap().is_some()
    }
}

#[derive(Default)]
pub struct StaticMetadata {
    descriptions: HashMap<(String, String), String>,
}

impl StaticMetadata {
    pub fn with_description(mut self, system: &str, game: &str, text: &str) -> Self {
        self.descriptions
            .insert((system.to_string(), game.to_string()), text.to_string());
        self
    }
}

impl GameMetadata for StaticMetadata {
    fn description(&self, system_name: &str, game_filename: &str) -> Option<String> {
        self.descriptions
            .get(&(system_name.to_string(), game_filename.to_string()))
            .cloned()
    }
}

// ========================================
// Engine harness
// ========================================

pub struct TestEngineBuilder {
    options: EngineOptions,
    resolver: FakeMediaResolver,
    library: MemoryMusicLibrary,
    store: MemoryWidgetStore,
    metadata: StaticMetadata,
}

impl TestEngineBuilder {
    pub fn options(mut self, f: impl FnOnce(&mut EngineOptions)) -> Self {
        f(&mut self.options);
        self
    }

    pub fn resolver(mut self, resolver: FakeMediaResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn library(mut self, library: MemoryMusicLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn store(mut self, store: MemoryWidgetStore) -> Self {
        self.store = store;
        self
    }

    pub fn metadata(mut self, metadata: StaticMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Start the engine loop; call from a `start_paused` Tokio test
    pub fn start(self) -> TestEngine {
        let source = Arc::new(MemoryEventSource::default());
        let resolver = Arc::new(self.resolver);
        let audio = Arc::new(RecordingAudioBackend::default());
        let store = Arc::new(self.store);

        let collaborators = Collaborators {
            source: source.clone(),
            resolver: resolver.clone(),
            library: Arc::new(self.library),
            audio: audio.clone(),
            widget_store: store.clone(),
            metadata: Arc::new(self.metadata),
        };
        let (engine, handle) = CompanionEngine::new(self.options, collaborators);
        let events = handle.subscribe();
        let task = tokio::spawn(engine.run());

        TestEngine {
            handle,
            events,
            source,
            resolver,
            audio,
            store,
            task,
        }
    }
}

pub struct TestEngine {
    pub handle: EngineHandle,
    pub events: broadcast::Receiver<CompanionEvent>,
    pub source: Arc<MemoryEventSource>,
    pub resolver: Arc<FakeMediaResolver>,
    pub audio: Arc<RecordingAudioBackend>,
    pub store: Arc<MemoryWidgetStore>,
    task: JoinHandle<scd_engine::Result<()>>,
}

impl TestEngine {
    pub fn builder() -> TestEngineBuilder {
        TestEngineBuilder {
            options: EngineOptions::default(),
            resolver: FakeMediaResolver::default(),
            library: MemoryMusicLibrary::default(),
            // Saved-but-empty layout: no first-launch defaults
            store: MemoryWidgetStore::with_widgets(Vec::new()),
            metadata: StaticMetadata::default(),
        }
    }

    // ---- frontend side: write files, then signal the trigger ----

    pub fn scroll_system(&self, system: &str) {
        self.source.set(EventFile::SystemName, system);
        self.handle.signal(EventFile::SystemName).unwrap();
    }

    pub fn scroll_game(&self, system: &str, game: &str) {
        self.source.set(EventFile::GameSystem, system);
        self.source.set(EventFile::GameName, game);
        self.source.set(EventFile::GameFilename, game);
        self.handle.signal(EventFile::GameFilename).unwrap();
    }

    pub fn start_game(&self, system: &str, game: &str) {
        self.source.set(EventFile::GameStartSystem, system);
        self.source.set(EventFile::GameStartFilename, game);
        self.handle.signal(EventFile::GameStartFilename).unwrap();
    }

    pub fn end_game(&self, system: &str, game: &str) {
        self.source.set(EventFile::GameEndSystem, system);
        self.source.set(EventFile::GameEndFilename, game);
        self.handle.signal(EventFile::GameEndFilename).unwrap();
    }

    pub fn start_screensaver(&self) {
        self.source.set(EventFile::ScreensaverStart, "start");
        self.handle.signal(EventFile::ScreensaverStart).unwrap();
    }

    /// `reason` as the frontend writes it: "cancel", "game-jump", "game-start"
    pub fn end_screensaver(&self, reason: &str) {
        self.source.set(EventFile::ScreensaverEnd, reason);
        self.handle.signal(EventFile::ScreensaverEnd).unwrap();
    }

    pub fn select_screensaver_game(&self, system: &str, game: &str) {
        self.source.set(EventFile::ScreensaverGameSystem, system);
        self.source.set(EventFile::ScreensaverGameFilename, game);
        self.handle
            .signal(EventFile::ScreensaverGameFilename)
            .unwrap();
    }

    // ---- output side ----

    pub async fn next_event(&mut self) -> CompanionEvent {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event bus closed")
    }

    /// Skip events until one matches
    pub async fn wait_for(&mut self, pred: impl Fn(&CompanionEvent) -> bool) -> CompanionEvent {
        loop {
            let event = self.next_event().await;
            if pred(&event) {
                return event;
            }
        }
    }

    /// Wait for the next committed transition into `category`
    pub async fn wait_for_state(&mut self, category: StateCategory) -> AppState {
        let event = self
            .wait_for(|e| {
                matches!(e, CompanionEvent::StateChanged { new_state, .. }
                    if new_state.category() == category)
            })
            .await;
        match event {
            CompanionEvent::StateChanged { new_state, .. } => new_state,
            _ => unreachable!(),
        }
    }

    /// Everything emitted during the next `duration` of virtual time
    pub async fn collect_for(&mut self, duration: Duration) -> Vec<CompanionEvent> {
        let deadline = tokio::time::Instant::now() + duration;
        let mut events = Vec::new();
        while let Ok(Ok(event)) = tokio::time::timeout_at(deadline, self.events.recv()).await {
            events.push(event);
        }
        events
    }

    /// Let pending timers and tasks run for `duration` of virtual time
    pub async fn settle(&mut self, duration: Duration) -> Vec<CompanionEvent> {
        self.collect_for(duration).await
    }

    pub async fn stop(self) {
        self.handle.shutdown().unwrap();
        self.task.await.unwrap().unwrap();
    }
}

// ========================================
// Event matchers
// ========================================

pub fn state_changes(events: &[CompanionEvent]) -> Vec<StateCategory> {
    events
        .iter()
        .filter_map(|e| match e {
            CompanionEvent::StateChanged { new_state, .. } => Some(new_state.category()),
            _ => None,
        })
        .collect()
}

pub fn count(events: &[CompanionEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

//! Event source: the frontend's event folder
//!
//! `EventSource` answers existence and content queries for the known event
//! files. `DirectoryWatcher` turns file-system notifications into
//! `RawSignal`s on the engine channel.

use std::path::{Path, PathBuf};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, trace, warn};

use super::files::EventFile;
use crate::error::Result;
use crate::messages::{EngineMessage, EngineSender, RawSignal};

/// Read access to the event files
///
/// Implementations must be cheap to call repeatedly; the pipeline polls
/// companion files while the frontend is still writing them.
pub trait EventSource: Send + Sync {
    fn exists(&self, file: EventFile) -> bool;

    /// Trimmed file contents, or `None` when missing, unreadable or blank
    fn read(&self, file: EventFile) -> Option<String>;
}

/// `EventSource` backed by a directory on disk
#[derive(Debug, Clone)]
pub struct DirEventSource {
    dir: PathBuf,
}

impl DirEventSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, file: EventFile) -> PathBuf {
        self.dir.join(file.file_name())
    }
}

impl EventSource for DirEventSource {
    fn exists(&self, file: EventFile) -> bool {
        self.path_of(file).is_file()
    }

    fn read(&self, file: EventFile) -> Option<String> {
        let path = self.path_of(file);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let trimmed = content.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                debug!(file = file.file_name(), error = %e, "Event file not readable");
                None
            }
        }
    }
}

/// Watches the event folder and posts one `RawSignal` per trigger-file change
///
/// The watcher stops when dropped.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl DirectoryWatcher {
    pub fn start(dir: &Path, tx: EngineSender) -> Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => forward_event(&event, &tx),
                Err(e) => warn!(error = %e, "Event folder watch error"),
            }
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!(dir = %dir.display(), "Watching event folder");

        Ok(Self {
            _watcher: watcher,
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn forward_event(event: &notify::Event, tx: &EngineSender) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }
    for path in &event.paths {
        let Some(file) = trigger_file(path) else {
            continue;
        };
        trace!(file = file.file_name(), "Trigger file changed");
        // The engine may already be shutting down
        let _ = tx.send(EngineMessage::Signal(RawSignal { file }));
    }
}

/// Map a changed path to a known trigger file
pub fn trigger_file(path: &Path) -> Option<EventFile> {
    let name = path.file_name()?.to_str()?;
    EventFile::from_file_name(name).filter(|f| f.trigger().is_some())
}

//! Music library
//!
//! ```text
//! <music_root>/generic/*
//! <music_root>/systems/<system>/*
//! ```

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use scd_common::display::MusicSource;
use tracing::debug;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "flac", "wav", "m4a", "opus"];

/// Lists playable tracks per music source
pub trait MusicLibrary: Send + Sync {
    fn tracks(&self, source: &MusicSource) -> Vec<PathBuf>;

    fn has_tracks(&self, source: &MusicSource) -> bool {
        !self.tracks(source).is_empty()
    }

    /// Random track, avoiding `previous` when there is a choice
    fn pick_track(&self, source: &MusicSource, previous: Option<&Path>) -> Option<PathBuf> {
        let tracks = self.tracks(source);
        let candidates: Vec<&PathBuf> = tracks
            .iter()
            .filter(|t| Some(t.as_path()) != previous)
            .collect();
        let pool: Vec<&PathBuf> = if candidates.is_empty() {
            tracks.iter().collect()
        } else {
            candidates
        };
        pool.choose(&mut rand::thread_rng()).map(|t| (*t).clone())
    }
}

#[derive(Debug, Clone)]
pub struct FsMusicLibrary {
    root: PathBuf,
}

impl FsMusicLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn folder(&self, source: &MusicSource) -> PathBuf {
        match source {
            MusicSource::Generic => self.root.join("generic"),
            MusicSource::System(name) => self.root.join("systems").join(name),
        }
    }
}

impl MusicLibrary for FsMusicLibrary {
    fn tracks(&self, source: &MusicSource) -> Vec<PathBuf> {
        let folder = self.folder(source);
        let entries = match std::fs::read_dir(&folder) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(folder = %folder.display(), error = %e, "Music folder not readable");
                return Vec::new();
            }
        };

        let mut tracks: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_audio(path))
            .collect();
        tracks.sort();
        tracks
    }
}

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

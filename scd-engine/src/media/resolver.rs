//! Media lookup
//!
//! The orchestrators only know media *kinds*. `MediaResolver` maps a system,
//! game and kind to a file; `FsMediaResolver` implements the frontend's
//! downloaded-media layout:
//!
//! ```text
//! <media_root>/<system>/<folder>/<game path without extension>.<ext>
//! <system_logo_dir>/<system>.<ext>
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use tracing::trace;

use crate::error::Result;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "webm"];
const LOGO_EXTENSIONS: &[&str] = &["png", "svg", "webp", "jpg"];

/// Media folder kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Fanart,
    Screenshot,
    Marquee,
    Box2d,
    Box3d,
    BackCover,
    TitleScreen,
    PhysicalMedia,
    Video,
}

impl MediaKind {
    pub fn folder_name(&self) -> &'static str {
        match self {
            MediaKind::Fanart => "fanart",
            MediaKind::Screenshot => "screenshots",
            MediaKind::Marquee => "marquees",
            MediaKind::Box2d => "covers",
            MediaKind::Box3d => "3dboxes",
            MediaKind::BackCover => "backcovers",
            MediaKind::TitleScreen => "titlescreens",
            MediaKind::PhysicalMedia => "physicalmedia",
            MediaKind::Video => "videos",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Video => VIDEO_EXTENSIONS,
            _ => IMAGE_EXTENSIONS,
        }
    }

    /// Single-level fallback kind; only fanart and screenshots substitute for each other
    pub fn counterpart(&self) -> Option<MediaKind> {
        match self {
            MediaKind::Fanart => Some(MediaKind::Screenshot),
            MediaKind::Screenshot => Some(MediaKind::Fanart),
            _ => None,
        }
    }
}

/// What a lookup is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTarget {
    pub system_name: String,
    /// `None` for system-level lookups, which pick a random file
    pub game_filename: Option<String>,
}

impl MediaTarget {
    pub fn system(system_name: impl Into<String>) -> Self {
        Self {
            system_name: system_name.into(),
            game_filename: None,
        }
    }

    pub fn game(system_name: impl Into<String>, game_filename: impl Into<String>) -> Self {
        Self {
            system_name: system_name.into(),
            game_filename: Some(game_filename.into()),
        }
    }
}

/// Resolves media files
///
/// `Ok(None)` is a miss and lets callers fall through their fallback chain;
/// `Err` is an unexpected failure and callers keep what is already shown.
pub trait MediaResolver: Send + Sync {
    fn find_game_media(
        &self,
        system_name: &str,
        game_filename: &str,
        kind: MediaKind,
    ) -> Result<Option<PathBuf>>;

    fn find_random_media(&self, system_name: &str, kind: MediaKind) -> Result<Option<PathBuf>>;

    fn find_system_logo(&self, system_name: &str) -> Result<Option<PathBuf>>;

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Look up `primary` for a target, then `fallback` if given
///
/// Game targets use per-game lookups, system targets random folder picks.
/// Returns the path and the kind that matched.
pub fn resolve_with_fallback(
    resolver: &dyn MediaResolver,
    target: &MediaTarget,
    primary: MediaKind,
    fallback: Option<MediaKind>,
) -> Result<Option<(PathBuf, MediaKind)>> {
    for kind in std::iter::once(primary).chain(fallback) {
        let found = match &target.game_filename {
            Some(game) => resolver.find_game_media(&target.system_name, game, kind)?,
            None => resolver.find_random_media(&target.system_name, kind)?,
        };
        if let Some(path) = found {
            return Ok(Some((path, kind)));
        }
        trace!(system = %target.system_name, kind = kind.folder_name(), "Media miss");
    }
    Ok(None)
}

/// `MediaResolver` over the frontend's downloaded-media folders
#[derive(Debug, Clone)]
pub struct FsMediaResolver {
    media_root: PathBuf,
    logo_dir: PathBuf,
}

impl FsMediaResolver {
    pub fn new(media_root: impl Into<PathBuf>, logo_dir: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
            logo_dir: logo_dir.into(),
        }
    }

    fn folder(&self, system_name: &str, kind: MediaKind) -> PathBuf {
        self.media_root.join(system_name).join(kind.folder_name())
    }
}

impl MediaResolver for FsMediaResolver {
    fn find_game_media(
        &self,
        system_name: &str,
        game_filename: &str,
        kind: MediaKind,
    ) -> Result<Option<PathBuf>> {
        let relative = game_filename.trim_start_matches("./");
        let base = self
            .folder(system_name, kind)
            .join(Path::new(relative).with_extension(""));
        Ok(first_existing(&base, kind.extensions()))
    }

    fn find_random_media(&self, system_name: &str, kind: MediaKind) -> Result<Option<PathBuf>> {
        let folder = self.folder(system_name, kind);
        let entries = match std::fs::read_dir(&folder) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| has_extension(path, kind.extensions()))
            .collect();
        candidates.sort();

        Ok(candidates.choose(&mut rand::thread_rng()).cloned())
    }

    fn find_system_logo(&self, system_name: &str) -> Result<Option<PathBuf>> {
        Ok(first_existing(&self.logo_dir.join(system_name), LOGO_EXTENSIONS))
    }
}

fn first_existing(base: &Path, extensions: &[&str]) -> Option<PathBuf> {
    extensions.iter().find_map(|ext| {
        let mut candidate = OsString::from(base.as_os_str());
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        candidate.is_file().then_some(candidate)
    })
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
}

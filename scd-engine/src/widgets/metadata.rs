//! Game metadata for text widgets
//!
//! Descriptions come from the frontend's per-system `gamelist.xml`:
//!
//! ```xml
//! <gameList>
//!   <game>
//!     <path>./Super Mario World (USA).sfc</path>
//!     <name>Super Mario World</name>
//!     <desc>Mario and Luigi...</desc>
//!   </game>
//! </gameList>
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::error::Result;

/// Structured text about a game
pub trait GameMetadata: Send + Sync {
    fn description(&self, system_name: &str, game_filename: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameInfo {
    pub name: Option<String>,
    pub description: Option<String>,
}

type Gamelist = HashMap<String, GameInfo>;

/// `GameMetadata` over `<gamelists_root>/<system>/gamelist.xml`, cached per system
pub struct GamelistMetadata {
    root: PathBuf,
    cache: Mutex<HashMap<String, Arc<Gamelist>>>,
}

impl GamelistMetadata {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Drop cached gamelists (after the frontend rescraped)
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn gamelist(&self, system_name: &str) -> Arc<Gamelist> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(list) = cache.get(system_name) {
                return Arc::clone(list);
            }
        }

        let path = self.root.join(system_name).join("gamelist.xml");
        let list = match std::fs::read_to_string(&path) {
            Ok(content) => match parse_gamelist(&content) {
                Ok(list) => {
                    debug!(system = system_name, games = list.len(), "Gamelist loaded");
                    list
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Gamelist invalid");
                    Gamelist::new()
                }
            },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No gamelist");
                Gamelist::new()
            }
        };

        let list = Arc::new(list);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(system_name.to_string(), Arc::clone(&list));
        }
        list
    }
}

impl GameMetadata for GamelistMetadata {
    fn description(&self, system_name: &str, game_filename: &str) -> Option<String> {
        self.gamelist(system_name)
            .get(normalize_path(game_filename))
            .and_then(|info| info.description.clone())
    }
}

fn normalize_path(path: &str) -> &str {
    path.trim().trim_start_matches("./")
}

/// Parse a gamelist into entries keyed by normalized game path
pub fn parse_gamelist(content: &str) -> Result<HashMap<String, GameInfo>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut games = HashMap::new();
    let mut buf = Vec::new();
    let mut in_game = false;
    let mut current_field: Option<String> = None;
    let mut path: Option<String> = None;
    let mut info = GameInfo::default();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().local_name().as_ref()).to_string();
                match name.as_str() {
                    "game" => {
                        in_game = true;
                        path = None;
                        info = GameInfo::default();
                    }
                    "path" | "name" | "desc" if in_game => current_field = Some(name.clone()),
                    _ => {}
                }
            }
            Event::Text(e) => {
                if let Some(field) = current_field.as_deref() {
                    let text = e.unescape()?.to_string();
                    match field {
                        "path" => path = Some(normalize_path(&text).to_string()),
                        "name" => info.name = Some(text),
                        "desc" => info.description = Some(text),
                        _ => {}
                    }
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().local_name().as_ref()).to_string();
                match name.as_str() {
                    "game" => {
                        if let Some(path) = path.take() {
                            games.insert(path, std::mem::take(&mut info));
                        }
                        in_game = false;
                    }
                    "path" | "name" | "desc" => current_field = None,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(games)
}

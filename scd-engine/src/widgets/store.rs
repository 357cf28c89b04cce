//! Widget persistence
//!
//! The store is an atomic read/replace list: callers load everything, modify,
//! and write everything back. Context scoping happens in the coordinator.

use std::path::{Path, PathBuf};

use scd_common::widgets::Widget;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

pub trait WidgetStore: Send + Sync {
    fn load_widgets(&self) -> Result<Vec<Widget>>;

    /// Replace the stored list
    fn save_widgets(&self, widgets: &[Widget]) -> Result<()>;

    fn delete_widget(&self, id: Uuid) -> Result<()>;

    /// Whether a layout was ever saved (false on first launch)
    fn has_saved_layout(&self) -> bool;
}

/// Widgets stored as a JSON array in one file
#[derive(Debug, Clone)]
pub struct JsonWidgetStore {
    path: PathBuf,
}

impl JsonWidgetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "widgets.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl WidgetStore for JsonWidgetStore {
    fn load_widgets(&self) -> Result<Vec<Widget>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| {
            Error::WidgetStore(format!("Invalid widget file {}: {}", self.path.display(), e))
        })
    }

    fn save_widgets(&self, widgets: &[Widget]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(widgets)?;

        // Readers never observe a partially written file
        let temp = self.temp_path();
        std::fs::write(&temp, json)?;
        std::fs::rename(&temp, &self.path)?;

        debug!(path = %self.path.display(), count = widgets.len(), "Widgets saved");
        Ok(())
    }

    fn delete_widget(&self, id: Uuid) -> Result<()> {
        let mut widgets = self.load_widgets()?;
        let before = widgets.len();
        widgets.retain(|w| w.id != id);
        if widgets.len() == before {
            return Err(Error::WidgetStore(format!("Widget not found: {}", id)));
        }
        self.save_widgets(&widgets)
    }

    fn has_saved_layout(&self) -> bool {
        self.path.is_file()
    }
}

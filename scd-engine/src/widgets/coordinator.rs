//! Widget overlay coordinator
//!
//! Keeps the active widget set (one context, paint order) in sync with the
//! committed state, resolves what each widget shows, and applies the user's
//! edits. Saving is context-scoped: widgets of the other context are read
//! back from the store and written unchanged.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use scd_common::app_state::AppState;
use scd_common::events::{CompanionEvent, EventBus};
use scd_common::widgets::{
    PositionPercent, ResolvedWidget, Widget, WidgetContent, WidgetContext, WidgetImageType,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::metadata::GameMetadata;
use super::store::WidgetStore;
use crate::error::{Error, Result};
use crate::media::resolver::{resolve_with_fallback, MediaKind, MediaResolver, MediaTarget};

/// User edits routed through the engine loop
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetCommand {
    Add(Widget),
    /// Move/resize/retype an existing widget
    Update(Widget),
    Delete(Uuid),
    MoveForward(Uuid),
    MoveBackward(Uuid),
    /// Hide all widgets without touching the store
    Clear,
    Save,
}

pub struct WidgetCoordinator {
    store: Arc<dyn WidgetStore>,
    resolver: Arc<dyn MediaResolver>,
    metadata: Arc<dyn GameMetadata>,
    bus: Arc<EventBus>,
    context: WidgetContext,
    /// Widgets of `context`, sorted by z-index (ties keep load order)
    active: Vec<Widget>,
    cleared_without_reload: bool,
    random_picks: HashMap<Uuid, Option<PathBuf>>,
    random_system: Option<String>,
}

impl WidgetCoordinator {
    pub fn new(
        store: Arc<dyn WidgetStore>,
        resolver: Arc<dyn MediaResolver>,
        metadata: Arc<dyn GameMetadata>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            resolver,
            metadata,
            bus,
            context: WidgetContext::System,
            active: Vec::new(),
            cleared_without_reload: false,
            random_picks: HashMap::new(),
            random_system: None,
        }
    }

    pub fn context(&self) -> WidgetContext {
        self.context
    }

    /// Active widgets in paint order
    pub fn active(&self) -> &[Widget] {
        &self.active
    }

    /// Reload the layout for the state's context and publish it
    pub fn refresh(&mut self, state: &AppState) {
        let context = state.widget_context();
        let stored = match self.load_or_create_defaults() {
            Ok(widgets) => widgets,
            Err(e) => {
                warn!(error = %e, "Widget layout not loaded, keeping current widgets");
                return;
            }
        };

        let mut active: Vec<Widget> = stored.into_iter().filter(|w| w.context == context).collect();
        active.sort_by_key(|w| w.z_index);

        debug!(context = %context, count = active.len(), "Widgets loaded");
        self.context = context;
        self.active = active;
        self.cleared_without_reload = false;
        self.publish(state);
    }

    /// Re-resolve the current widgets for a new screensaver game without reloading
    pub fn refresh_content(&mut self, state: &AppState) {
        self.publish(state);
    }

    pub fn handle_command(&mut self, command: WidgetCommand, state: &AppState) -> Result<()> {
        match command {
            WidgetCommand::Add(mut widget) => {
                widget.context = self.context;
                widget.z_index = self
                    .active
                    .iter()
                    .map(|w| w.z_index.saturating_add(1))
                    .max()
                    .unwrap_or(0);
                info!(id = %widget.id, kind = ?widget.image_type, "Widget added");
                self.active.push(widget);
                self.save(state)?;
            }
            WidgetCommand::Update(widget) => {
                let slot = self
                    .active
                    .iter_mut()
                    .find(|w| w.id == widget.id)
                    .ok_or_else(|| not_found(widget.id))?;
                let context = slot.context;
                *slot = widget;
                slot.context = context;
                self.active.sort_by_key(|w| w.z_index);
                self.save(state)?;
            }
            WidgetCommand::Delete(id) => {
                let before = self.active.len();
                self.active.retain(|w| w.id != id);
                if self.active.len() == before {
                    return Err(not_found(id));
                }
                self.random_picks.remove(&id);
                self.store.delete_widget(id)?;
                info!(%id, "Widget deleted");
            }
            WidgetCommand::MoveForward(id) => {
                self.move_by(id, true)?;
                self.save(state)?;
            }
            WidgetCommand::MoveBackward(id) => {
                self.move_by(id, false)?;
                self.save(state)?;
            }
            WidgetCommand::Clear => {
                self.active.clear();
                self.cleared_without_reload = true;
            }
            WidgetCommand::Save => {
                self.save(state)?;
                return Ok(());
            }
        }
        self.publish(state);
        Ok(())
    }

    /// Persist the active context's widgets
    ///
    /// Returns `Ok(false)` when the save was skipped by policy.
    pub fn save(&mut self, state: &AppState) -> Result<bool> {
        if state.is_screensaver() {
            debug!("Widget save skipped during screensaver");
            return Ok(false);
        }
        if self.active.is_empty() && self.cleared_without_reload {
            debug!("Widget save skipped, layout was cleared without reload");
            return Ok(false);
        }

        let mut all = self.store.load_widgets()?;
        all.retain(|w| w.context != self.context);
        all.extend(self.active.iter().cloned());
        self.store.save_widgets(&all)?;
        Ok(true)
    }

    /// Swap z-index with the adjacent widget in paint order
    fn move_by(&mut self, id: Uuid, forward: bool) -> Result<()> {
        let index = self
            .active
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| not_found(id))?;
        let neighbor = if forward {
            index + 1
        } else {
            match index.checked_sub(1) {
                Some(i) => i,
                None => return Ok(()),
            }
        };
        if neighbor >= self.active.len() {
            return Ok(());
        }

        let (mine, theirs) = (self.active[index].z_index, self.active[neighbor].z_index);
        self.active[index].z_index = theirs;
        self.active[neighbor].z_index = mine;
        self.active.swap(index, neighbor);
        if mine == theirs {
            // Equal z: order came from load order, make it explicit
            self.restack_from(index.max(neighbor));
        }
        Ok(())
    }

    /// Raise z from `start` upward until every widget sits strictly above the one below it
    fn restack_from(&mut self, start: usize) {
        for i in start.max(1)..self.active.len() {
            let floor = self.active[i - 1].z_index.saturating_add(1);
            if self.active[i].z_index >= floor {
                break;
            }
            self.active[i].z_index = floor;
        }
    }

    fn load_or_create_defaults(&self) -> Result<Vec<Widget>> {
        if self.store.has_saved_layout() {
            return self.store.load_widgets();
        }
        let defaults = default_widgets();
        info!(count = defaults.len(), "First launch, creating default widgets");
        self.store.save_widgets(&defaults)?;
        Ok(defaults)
    }

    fn publish(&mut self, state: &AppState) {
        let system = state.system_name().map(str::to_string);
        if system != self.random_system {
            self.random_picks.clear();
            self.random_system = system;
        }

        let widgets: Vec<ResolvedWidget> = self
            .active
            .clone()
            .into_iter()
            .map(|widget| {
                let content = self.resolve(&widget, state);
                ResolvedWidget { widget, content }
            })
            .collect();

        self.bus.emit_lossy(CompanionEvent::WidgetsChanged {
            context: self.context,
            widgets,
            timestamp: Utc::now(),
        });
    }

    fn resolve(&mut self, widget: &Widget, state: &AppState) -> WidgetContent {
        match widget.image_type {
            WidgetImageType::ColorBackground => {
                return widget
                    .solid_color
                    .map(|color| WidgetContent::SolidColor { color })
                    .unwrap_or(WidgetContent::Empty)
            }
            WidgetImageType::CustomImage => {
                return widget
                    .image_path
                    .as_ref()
                    .filter(|p| self.resolver.file_exists(p))
                    .map(|path| WidgetContent::Image { path: path.clone() })
                    .unwrap_or(WidgetContent::Empty)
            }
            _ => {}
        }

        let Some(system) = state.system_name() else {
            return WidgetContent::Empty;
        };
        let game = state.game_filename();

        let found = match widget.image_type {
            WidgetImageType::SystemLogo => self.resolver.find_system_logo(system),
            WidgetImageType::GameDescription => {
                return game
                    .and_then(|g| self.metadata.description(system, g))
                    .map(|text| WidgetContent::Text { text })
                    .unwrap_or(WidgetContent::Empty);
            }
            other => {
                let Some(kind) = media_kind(other) else {
                    return WidgetContent::Empty;
                };
                let random = other.is_random() || game.is_none();
                if random {
                    if let Some(pick) = self.random_picks.get(&widget.id) {
                        return image_or_empty(pick.clone());
                    }
                }
                let target = MediaTarget {
                    system_name: system.to_string(),
                    game_filename: if random { None } else { game.map(str::to_string) },
                };
                let found = resolve_with_fallback(
                    self.resolver.as_ref(),
                    &target,
                    kind,
                    kind.counterpart(),
                )
                .map(|hit| hit.map(|(path, _)| path));
                if random {
                    if let Ok(pick) = &found {
                        self.random_picks.insert(widget.id, pick.clone());
                    }
                }
                found
            }
        };

        match found {
            Ok(path) => image_or_empty(path),
            Err(e) => {
                warn!(id = %widget.id, error = %e, "Widget lookup failed");
                WidgetContent::Empty
            }
        }
    }
}

fn image_or_empty(path: Option<PathBuf>) -> WidgetContent {
    path.map(|path| WidgetContent::Image { path })
        .unwrap_or(WidgetContent::Empty)
}

fn not_found(id: Uuid) -> Error {
    Error::WidgetStore(format!("Widget not in active layout: {}", id))
}

/// Media folder for image widgets
fn media_kind(image_type: WidgetImageType) -> Option<MediaKind> {
    match image_type {
        WidgetImageType::Marquee => Some(MediaKind::Marquee),
        WidgetImageType::Box2d => Some(MediaKind::Box2d),
        WidgetImageType::Box3d => Some(MediaKind::Box3d),
        WidgetImageType::BackCover => Some(MediaKind::BackCover),
        WidgetImageType::Fanart | WidgetImageType::RandomFanart => Some(MediaKind::Fanart),
        WidgetImageType::Screenshot | WidgetImageType::RandomScreenshot => {
            Some(MediaKind::Screenshot)
        }
        WidgetImageType::TitleScreen => Some(MediaKind::TitleScreen),
        WidgetImageType::PhysicalMedia => Some(MediaKind::PhysicalMedia),
        WidgetImageType::SystemLogo
        | WidgetImageType::GameDescription
        | WidgetImageType::ColorBackground
        | WidgetImageType::CustomImage => None,
    }
}

/// Layout created on first launch
pub fn default_widgets() -> Vec<Widget> {
    vec![
        Widget::new(
            WidgetImageType::SystemLogo,
            WidgetContext::System,
            PositionPercent::new(25.0, 35.0, 50.0, 30.0),
        ),
        Widget::new(
            WidgetImageType::Marquee,
            WidgetContext::Game,
            PositionPercent::new(20.0, 5.0, 60.0, 20.0),
        ),
    ]
}

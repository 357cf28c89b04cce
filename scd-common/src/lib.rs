//! # SCD Common Library
//!
//! Shared code for the second-screen companion display:
//! - Browsing state model (AppState and its saved/screensaver payloads)
//! - Widget and display models
//! - Event types (CompanionEvent) and the EventBus
//! - Bootstrap configuration loading
//! - Fade curve definitions used by volume ramps

pub mod app_state;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod widgets;

pub use app_state::{AppState, SavedBrowsingState, ScreensaverGame, StateCategory};
pub use display::{ArtSource, Background, Color, MusicSource};
pub use error::{Error, Result};
pub use events::{CompanionEvent, EventBus};
pub use fade_curves::FadeCurve;
pub use widgets::{Widget, WidgetContext, WidgetImageType};

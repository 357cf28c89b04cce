//! # SCD Engine Library (scd-engine)
//!
//! Core of the second-screen companion display.
//!
//! **Purpose:** Mirror the browsing state of an external game frontend from
//! the event files it writes, and decide what the second screen shows
//! (background, video, widgets) and what ambient music plays.
//!
//! **Architecture:** One engine loop owns all state; ingestion reads, media
//! lookups, video delays and volume fades run as cancellable tasks that post
//! their results back to the loop. Output is a stream of `CompanionEvent`s
//! on the `EventBus` for a renderer to draw.

pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod media;
pub mod messages;
pub mod music;
pub mod state;
pub mod tasks;
pub mod widgets;

pub use config::{Config, ConfigOverrides, Preferences};
pub use engine::{Collaborators, CompanionEngine, EngineHandle, EngineOptions};
pub use error::{Error, Result};
pub use state::{Effect, StateMachine, Transition};

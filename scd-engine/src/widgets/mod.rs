//! Widget overlays: persistence, game metadata and the live coordinator

pub mod coordinator;
pub mod metadata;
pub mod store;

pub use coordinator::{default_widgets, WidgetCommand, WidgetCoordinator};
pub use metadata::{parse_gamelist, GameInfo, GameMetadata, GamelistMetadata};
pub use store::{JsonWidgetStore, WidgetStore};

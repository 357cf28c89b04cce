//! Background images and game videos

pub mod background;
pub mod orchestrator;
pub mod resolver;

pub use background::{resolve_background, BackgroundRequest};
pub use orchestrator::{MediaMessage, MediaOrchestrator, VideoChange};
pub use resolver::{resolve_with_fallback, FsMediaResolver, MediaKind, MediaResolver, MediaTarget};

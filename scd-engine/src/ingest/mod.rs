//! Event ingestion: event folder contract, watcher and pipeline

pub mod debounce;
pub mod files;
pub mod pipeline;
pub mod source;

pub use files::{EventFile, ExternalEvent, ScreensaverEndReason, ScrollCategory, Trigger};
pub use pipeline::EventPipeline;
pub use source::{DirEventSource, DirectoryWatcher, EventSource};

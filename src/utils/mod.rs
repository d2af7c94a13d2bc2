//! Shared helpers for logging, timing and feature file discovery

mod discover;
mod logger;
mod timer;

pub use discover::{discover_features, feature_path};
pub use logger::{init_logger, LogLevel};
pub use timer::{format_duration, Timer};

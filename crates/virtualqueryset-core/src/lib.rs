//! # virtualqueryset-core
//!
//! Foundation types shared by every virtualqueryset crate: the error enum,
//! the settings object that configuration-backed querysets read from, the
//! settings loader, and `tracing` setup.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Settings and the global, configure-once instance
//! - [`settings_loader`] - Loading settings from TOML/JSON files and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{VirtualError, VirtualResult};
pub use settings::{Settings, SETTINGS};

//! Configuration Management
//!
//! Two layers:
//! - [`Settings`]: process-wide, hierarchical resolution
//!   1. Built-in defaults
//!   2. Global config (~/.config/repowiki/config.toml)
//!   3. Project config (.repowiki/config.toml)
//!   4. Environment variables (REPOWIKI_*)
//!   5. CLI arguments (highest priority)
//! - [`WikiConfig`]: per-repository YAML describing what to generate

mod loader;
mod types;
mod wiki;

pub use loader::SettingsLoader;
pub use types::*;
pub use wiki::{WikiConfig, WikiTarget};

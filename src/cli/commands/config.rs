//! Config Command
//!
//! Inspect repowiki configuration.
//!
//! Usage:
//!   repowiki config show [-f json]
//!   repowiki config path

use crate::cli::ui::Output;
use crate::config::{Settings, SettingsLoader};
use crate::types::Result;

/// Print the effective settings; secrets are never rendered
pub fn show(settings: &Settings, format: &str) -> Result<()> {
    println!("{}", SettingsLoader::render(settings, format == "json")?);
    Ok(())
}

/// Print where settings are read from
pub fn path() -> Result<()> {
    let output = Output::new();
    output.section("Configuration files");
    match SettingsLoader::global_config_path() {
        Some(global) => output.field("Global", describe(&global)),
        None => output.field("Global", "(cannot determine config directory)"),
    }
    output.field("Project", describe(&SettingsLoader::project_config_path()));
    output.field("Environment", "REPOWIKI_* (use __ for nesting)");
    Ok(())
}

fn describe(path: &std::path::Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found)", path.display())
    }
}

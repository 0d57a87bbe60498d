//! Settings Loader (Figment-based)
//!
//! Loads and merges settings from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/repowiki/config.toml)
//! 3. Project config (.repowiki/config.toml)
//! 4. Environment variables (REPOWIKI_* prefix, `__` separates nesting)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::Settings;
use crate::types::{Result, WikiError};

/// Settings loader
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings with the full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Settings> {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        Self::finish(figment)
    }

    /// Load defaults plus one explicit file plus env vars
    pub fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            return Err(WikiError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path));
        Self::finish(figment)
    }

    fn finish(figment: Figment) -> Result<Settings> {
        // REPOWIKI_PAGES__MAX_CONCURRENCY -> pages.max_concurrency
        let settings: Settings = figment
            .merge(Env::prefixed("REPOWIKI_").split("__").lowercase(true))
            .extract()
            .map_err(|e| WikiError::Config(format!("Configuration error: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Global config directory (~/.config/repowiki/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("repowiki"))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".repowiki/config.toml")
    }

    /// Effective settings rendered as TOML or JSON
    pub fn render(settings: &Settings, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(settings)?)
        } else {
            toml::to_string_pretty(settings).map_err(|e| WikiError::Config(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file_merges_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[pages]
max_concurrency = 5

[generation.page]
model = "openai/gpt-4o-mini"
temperature = 0.3
"#,
        )
        .unwrap();

        let settings = SettingsLoader::load_from_file(&path).unwrap();
        assert_eq!(settings.pages.max_concurrency, 5);
        assert_eq!(
            settings.generation.page.model.as_deref(),
            Some("openai/gpt-4o-mini")
        );
        assert_eq!(settings.agent.step_limit, 10);
    }

    #[test]
    fn test_load_from_file_validates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pages]\nmax_concurrency = 0\n").unwrap();
        assert!(SettingsLoader::load_from_file(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(SettingsLoader::load_from_file(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_render_toml_round_trips() {
        let rendered = SettingsLoader::render(&Settings::default(), false).unwrap();
        let parsed: Settings = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.index.chunk_size, Settings::default().index.chunk_size);
    }
}

//! Per-repository wiki configuration
//!
//! Read from a YAML file shipped with the repository (or passed on the
//! command line). Loading is lenient: a missing or malformed file logs a
//! warning and the defaults are used, so a bad config never blocks a run.
//!
//! ```yaml
//! wiki:
//!   repository: acme/handbook   # defaults to the source repository
//!   branch: main                # defaults to the default branch
//!   directory: /wikis
//! skip: 1w                      # do not regenerate a wiki younger than this
//! language: English
//! model: openai/gpt-4o          # overrides every stage's model
//! ignore_patterns: ["**/*.snap"]
//! tutorial: ["Getting started"]
//! how_to: []
//! reference: []
//! explanation: []
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::constants::repo;
use crate::types::{RepoId, Result, format_duration, parse_duration};

/// Where the generated wiki is published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WikiTarget {
    /// `owner/name` of the wiki repository; `None` publishes into the source repository
    pub repository: Option<String>,

    /// Branch to publish to; `None` uses the default branch
    pub branch: Option<String>,

    /// Directory inside the wiki repository
    pub directory: String,
}

impl Default for WikiTarget {
    fn default() -> Self {
        Self {
            repository: None,
            branch: None,
            directory: repo::DEFAULT_WIKI_DIRECTORY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WikiConfig {
    pub wiki: WikiTarget,

    /// A wiki committed more recently than this is left alone
    #[serde(
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub skip: Duration,

    /// Language pages are written in
    pub language: String,

    /// Model selector overriding every stage
    pub model: Option<String>,

    /// Globs deleted from the checkout before indexing
    pub ignore_patterns: Vec<String>,

    // Content taxonomy hints
    pub tutorial: Vec<String>,
    pub how_to: Vec<String>,
    pub reference: Vec<String>,
    pub explanation: Vec<String>,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            wiki: WikiTarget::default(),
            skip: Duration::from_secs(repo::DEFAULT_SKIP_SECS),
            language: "English".to_string(),
            model: None,
            ignore_patterns: Vec::new(),
            tutorial: Vec::new(),
            how_to: Vec::new(),
            reference: Vec::new(),
            explanation: Vec::new(),
        }
    }
}

impl WikiConfig {
    /// Parse from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load from a file, falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match Self::from_yaml_str(&text) {
                Ok(config) => {
                    debug!("Loaded wiki config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Error loading wiki config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Error loading wiki config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parsed wiki repository id, when it differs from the source repository
    pub fn wiki_repository(&self) -> Result<Option<RepoId>> {
        self.wiki
            .repository
            .as_deref()
            .map(str::parse)
            .transpose()
    }

    /// Taxonomy hints rendered as JSON for the structure prompt
    pub fn hints_json(&self) -> String {
        let hints = serde_json::json!({
            "tutorial": self.tutorial,
            "how_to": self.how_to,
            "reference": self.reference,
            "explanation": self.explanation,
        });
        serde_json::to_string_pretty(&hints).unwrap_or_else(|_| hints.to_string())
    }
}

fn serialize_duration<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*value))
}

fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

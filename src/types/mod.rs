pub mod error;
pub mod utils;
pub mod wiki;

pub use error::{ErrorCategory, ErrorClassifier, LlmError, Result, WikiError};
pub use utils::{
    extension_of, format_duration, log_filter_warn, normalize_path, parse_duration,
    truncate_chars,
};
pub use wiki::{WikiPage, WikiStructure};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;
use std::str::FromStr;

/// Repository identity in `owner/name` form
///
/// Used as the index registry key and the on-disk layout key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `owner/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = WikiError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_end_matches(".git").trim_matches('/');
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(WikiError::InvalidRepository(s.to_string())),
        }
    }
}

//! GitHub REST code search

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::GitHubConfig;
use crate::types::{RepoId, Result, WikiError};

const TEXT_MATCH_MEDIA_TYPE: &str = "application/vnd.github.text-match+json";
const API_VERSION: &str = "2022-11-28";

/// One file matching a code search, with the matched fragments
#[derive(Debug, Clone, PartialEq)]
pub struct CodeSearchHit {
    pub path: String,
    pub score: f64,
    pub fragments: Vec<String>,
}

pub struct GitHubClient {
    api_base: String,
    token: Option<SecretString>,
    client: reqwest::Client,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl GitHubClient {
    /// `config.token` wins over the job's PAT
    pub fn new(config: &GitHubConfig, pat: Option<&SecretString>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("repowiki/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WikiError::GitHub(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config
                .token
                .clone()
                .map(SecretString::from)
                .or_else(|| pat.cloned()),
            client,
        })
    }

    pub(crate) fn search_url(&self, repo: &RepoId, symbol: &str) -> Result<url::Url> {
        let query = format!("{} in:file repo:{}/{}", symbol, repo.owner(), repo.name());
        url::Url::parse_with_params(&format!("{}/search/code", self.api_base), &[("q", query)])
            .map_err(|e| WikiError::GitHub(format!("Invalid search URL: {}", e)))
    }

    /// Search the default branch of `repo` for `symbol`, best score first
    pub async fn code_search(&self, repo: &RepoId, symbol: &str) -> Result<Vec<CodeSearchHit>> {
        let url = self.search_url(repo, symbol)?;
        debug!("GitHub code search: {}", url);

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, TEXT_MATCH_MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| WikiError::GitHub(format!("Request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WikiError::GitHub(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| WikiError::GitHub(format!("Invalid search response: {}", e)))?;
        Ok(parsed.into_hits())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    path: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    text_matches: Vec<TextMatch>,
}

#[derive(Debug, Deserialize)]
struct TextMatch {
    #[serde(default)]
    fragment: String,
}

impl SearchResponse {
    fn into_hits(self) -> Vec<CodeSearchHit> {
        let mut hits: Vec<_> = self
            .items
            .into_iter()
            .map(|item| CodeSearchHit {
                path: item.path,
                score: item.score,
                fragments: item.text_matches.into_iter().map(|m| m.fragment).collect(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits
    }
}

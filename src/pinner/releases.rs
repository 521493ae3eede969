//! Release listings from the hosting site's API.

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::constants::HTTP_TIMEOUT;
use crate::core::PawnpmError;

/// Base URL of the GitHub REST API.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Token sent as a bearer credential when set; raises the API rate limit.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// The subset of a release the pinner looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
}

/// Release lookups for a repository on the hosting site.
///
/// A repository without releases, or one the API does not know, yields an empty list rather
/// than an error.
#[allow(async_fn_in_trait)]
pub trait ReleasesApi {
    /// Releases newest first, as the API orders them.
    async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>>;

    async fn release_by_tag(&self, owner: &str, repo: &str, tag: &str) -> Result<Option<Release>>;
}

/// Tag of the newest published release.
///
/// Prefers the first non-draft, non-prerelease release; falls back to the first non-draft one.
#[must_use]
pub fn select_release(releases: &[Release]) -> Option<&str> {
    let published = |r: &&Release| !r.draft && !r.tag_name.is_empty();
    releases
        .iter()
        .filter(published)
        .find(|r| !r.prerelease)
        .or_else(|| releases.iter().find(published))
        .map(|r| r.tag_name.as_str())
}

/// [`ReleasesApi`] backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubReleases {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubReleases {
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("pawnpm/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Public GitHub, authenticated with `GITHUB_TOKEN` when it is set.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(GITHUB_TOKEN_ENV).ok().filter(|t| !t.is_empty());
        Self::new(GITHUB_API_URL, token)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        debug!("GET {url}");
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| PawnpmError::NetworkError {
            operation: format!("GET {url}"),
            reason: e.to_string(),
        })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(PawnpmError::NetworkError {
                operation: format!("GET {url}"),
                reason: format!("HTTP {}", response.status()),
            }
            .into());
        }
        let body = response
            .json()
            .await
            .with_context(|| format!("Failed to decode response from {url}"))?;
        Ok(Some(body))
    }
}

impl ReleasesApi for GitHubReleases {
    async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>> {
        let url = format!("{}/repos/{owner}/{repo}/releases", self.api_url);
        Ok(self.get(&url).await?.unwrap_or_default())
    }

    async fn release_by_tag(&self, owner: &str, repo: &str, tag: &str) -> Result<Option<Release>> {
        let url = format!("{}/repos/{owner}/{repo}/releases/tags/{tag}", self.api_url);
        self.get(&url).await
    }
}

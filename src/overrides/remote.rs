//! Remote override feed with an on-disk freshness cache.

use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use super::OverrideFile;
use crate::constants::HTTP_TIMEOUT;
use crate::utils::fs::atomic_write;

/// Community-maintained override feed.
pub const DEFAULT_OVERRIDES_URL: &str =
    "https://raw.githubusercontent.com/sampctl/plugins/refs/heads/master/dependency-overrides.json";

/// Environment variable replacing [`DEFAULT_OVERRIDES_URL`].
pub const OVERRIDES_URL_ENV: &str = "PAWNPM_OVERRIDES_URL";

/// Where the remote override document comes from.
///
/// Implementations return the raw JSON body; parsing and caching are handled by
/// [`load_remote_overrides`].
#[allow(async_fn_in_trait)]
pub trait OverrideSource {
    async fn fetch(&self) -> Result<String>;
}

/// Fetches the feed over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpOverrideSource {
    client: reqwest::Client,
    url: String,
}

impl HttpOverrideSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("pawnpm/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Uses `PAWNPM_OVERRIDES_URL` when set, otherwise [`DEFAULT_OVERRIDES_URL`].
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(OVERRIDES_URL_ENV)
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_OVERRIDES_URL.to_string());
        Self::new(url)
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl OverrideSource for HttpOverrideSource {
    async fn fetch(&self) -> Result<String> {
        debug!("Fetching dependency overrides from: {}", self.url);
        let response = tokio::time::timeout(HTTP_TIMEOUT, self.client.get(&self.url).send())
            .await
            .context("Timed out fetching dependency overrides")?
            .context("Failed to fetch dependency overrides")?;

        if !response.status().is_success() {
            bail!("Failed to fetch dependency overrides: HTTP {}", response.status());
        }

        response.text().await.context("Failed to read dependency overrides")
    }
}

fn is_fresh(path: &Path, ttl: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age < ttl)
}

fn read_cache(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: OverrideFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(file.overrides)
}

/// Returns the remote override layer.
///
/// A cache younger than `ttl` is used as-is. Otherwise the feed is fetched and, if it parses,
/// written to `cache_path`. When fetching fails the stale cache is used if it is readable, and
/// an empty layer otherwise. This never fails: the network must not block resolution.
pub async fn load_remote_overrides<S: OverrideSource>(
    cache_path: &Path,
    source: &S,
    ttl: Duration,
) -> BTreeMap<String, String> {
    if is_fresh(cache_path, ttl) {
        match read_cache(cache_path) {
            Ok(overrides) => return overrides,
            Err(e) => debug!("refetching unreadable override cache: {e:#}"),
        }
    }

    let fetched = async {
        let body = source.fetch().await?;
        let file: OverrideFile =
            serde_json::from_str(&body).context("Remote dependency overrides are not valid JSON")?;
        let pretty = serde_json::to_string_pretty(&file)?;
        if let Err(e) = atomic_write(cache_path, pretty.as_bytes()) {
            warn!("Failed to cache remote dependency overrides: {e:#}");
        }
        Ok::<_, anyhow::Error>(file.overrides)
    }
    .await;

    match fetched {
        Ok(overrides) => overrides,
        Err(e) => {
            debug!("remote dependency overrides unavailable: {e:#}");
            read_cache(cache_path).unwrap_or_default()
        }
    }
}

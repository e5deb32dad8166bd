//! Episode catalog
//!
//! The episode list is a flat paginated JSON listing. It is fetched page by
//! page, cached on disk as one JSON document and filtered by season/episode
//! number from there.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

use super::config::{CatalogConfig, DownloadSettings};
use super::models::{AppError, AppResult, EpisodeId, Language};

/// File name of the cached listing inside the cache directory
pub const CACHE_FILE_NAME: &str = "episodes.json";

/// One episode in the listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodeEntry {
    pub season: u32,
    pub episode: u32,
    #[serde(default)]
    pub title: Option<String>,
    /// Page URL per language, keyed `en` / `de`
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
}

impl EpisodeEntry {
    pub fn id(&self) -> EpisodeId {
        EpisodeId::new(self.season, self.episode)
    }

    pub fn url_for(&self, language: Language) -> Option<&str> {
        self.urls
            .get(language.suffix())
            .or_else(|| self.urls.get(language.display_name()))
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
    }
}

/// One page of the listing
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogPage {
    #[serde(default, alias = "items")]
    pub episodes: Vec<EpisodeEntry>,
    #[serde(default)]
    pub next_page: Option<u32>,
}

/// Where listing pages come from
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> AppResult<CatalogPage>;
}

/// Fetches pages with `GET {base_url}?page={n}`
pub struct HttpCatalogSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCatalogSource {
    pub fn new(base_url: &str, config: &CatalogConfig) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid catalog URL {}: {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, base_url })
    }

    fn page_url(&self, page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        url
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_page(&self, page: u32) -> AppResult<CatalogPage> {
        let url = self.page_url(page);
        debug!("Fetching episode list page {}: {}", page, url);

        let page = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<CatalogPage>()
            .await?;
        Ok(page)
    }
}

/// On-disk form of the listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogCache {
    pub fetched_at: DateTime<Utc>,
    pub episodes: Vec<EpisodeEntry>,
}

impl CatalogCache {
    pub fn load(path: &Path) -> AppResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let cache = serde_json::from_str(&content).map_err(|e| {
            AppError::Parse(format!("Invalid catalog cache {}: {}", path.display(), e))
        })?;
        Ok(Some(cache))
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Parse(format!("Failed to serialize catalog cache: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn is_fresh(&self, ttl_hours: u64, now: DateTime<Utc>) -> bool {
        // capped at ~100 years so the duration cannot overflow
        let ttl = Duration::hours(ttl_hours.min(24 * 365 * 100) as i64);
        now.signed_duration_since(self.fetched_at) < ttl
    }
}

/// Filtered view over the listing
#[derive(Debug, Clone, Default)]
pub struct EpisodeCatalog {
    episodes: Vec<EpisodeEntry>,
}

impl EpisodeCatalog {
    /// Sorted by season/episode; later duplicates of an id are dropped
    pub fn from_entries(mut episodes: Vec<EpisodeEntry>) -> Self {
        episodes.sort_by_key(|e| e.id());
        episodes.dedup_by_key(|e| e.id());
        Self { episodes }
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn entries(&self) -> &[EpisodeEntry] {
        &self.episodes
    }

    /// Follow `next_page` links from page 1 until the listing ends
    pub async fn fetch_all(source: &dyn CatalogSource, max_pages: u32) -> AppResult<Self> {
        let mut episodes = Vec::new();
        let mut page_number = 1;
        let mut fetched = 0;

        loop {
            let page = source.fetch_page(page_number).await?;
            fetched += 1;

            if page.episodes.is_empty() {
                break;
            }
            episodes.extend(page.episodes);

            match page.next_page {
                Some(next) if next > page_number => page_number = next,
                Some(next) => {
                    warn!(
                        "Episode list page {} points back to page {}, stopping",
                        page_number, next
                    );
                    break;
                }
                None => break,
            }

            if fetched >= max_pages {
                warn!("Episode list exceeds {} pages, stopping", max_pages);
                break;
            }
        }

        info!("Fetched {} episodes in {} page(s)", episodes.len(), fetched);
        Ok(Self::from_entries(episodes))
    }

    /// Use the cache at `cache_path` while it is fresh, refetch otherwise.
    /// A failed refetch falls back to a stale cache when there is one.
    pub async fn load_or_refresh(
        source: &dyn CatalogSource,
        cache_path: &Path,
        config: &CatalogConfig,
        force_refresh: bool,
    ) -> AppResult<Self> {
        let cached = match CatalogCache::load(cache_path) {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Ignoring unreadable catalog cache: {}", e);
                None
            }
        };

        if let Some(ref cache) = cached {
            if !force_refresh && cache.is_fresh(config.cache_ttl_hours, Utc::now()) {
                debug!(
                    "Using cached episode list from {} ({} episodes)",
                    cache.fetched_at,
                    cache.episodes.len()
                );
                return Ok(Self::from_entries(cache.episodes.clone()));
            }
        }

        match Self::fetch_all(source, config.max_pages).await {
            Ok(catalog) => {
                let cache = CatalogCache {
                    fetched_at: Utc::now(),
                    episodes: catalog.episodes.clone(),
                };
                if let Err(e) = cache.save(cache_path) {
                    warn!("Failed to write catalog cache {}: {}", cache_path.display(), e);
                }
                Ok(catalog)
            }
            Err(e) => match cached {
                Some(cache) => {
                    warn!("Episode list refresh failed ({}), using stale cache", e);
                    Ok(Self::from_entries(cache.episodes))
                }
                None => Err(AppError::Catalog(format!("Failed to fetch episode list: {}", e))),
            },
        }
    }

    pub fn episodes_in_season(&self, season: u32) -> Vec<&EpisodeEntry> {
        self.episodes.iter().filter(|e| e.season == season).collect()
    }

    pub fn find(&self, id: EpisodeId) -> Option<&EpisodeEntry> {
        self.episodes
            .binary_search_by_key(&id, |e| e.id())
            .ok()
            .map(|index| &self.episodes[index])
    }
}

/// Substitute `{season}` and `{episode}` with two-digit numbers
pub fn fill_template(template: &str, id: EpisodeId) -> String {
    template
        .replace("{season}", &id.season_code())
        .replace("{episode}", &id.episode_code())
}

/// Page URL for one language of an episode: the catalog entry's own URL when
/// it has one, the configured template otherwise
pub fn resolve_url(
    catalog: Option<&EpisodeCatalog>,
    settings: &DownloadSettings,
    id: EpisodeId,
    language: Language,
) -> String {
    catalog
        .and_then(|c| c.find(id))
        .and_then(|entry| entry.url_for(language))
        .map(str::to_string)
        .unwrap_or_else(|| fill_template(&settings.language(language).url_template, id))
}

/// Number of episodes per season for when no listing is available
pub fn season_episode_count(season: u32) -> u32 {
    match season {
        1 => 13,
        2 => 18,
        3 | 4 | 6 => 17,
        5 | 8..=16 => 14,
        7 => 15,
        s if s >= 17 => 10,
        _ => 0,
    }
}

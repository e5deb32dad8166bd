//! Per-episode and per-season download orchestration
//!
//! Each episode runs its language downloads as concurrent tasks, joins them
//! and merges the result. A season runs its episodes concurrently, bounded by
//! a semaphore.

use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::catalog::{resolve_url, season_episode_count, EpisodeCatalog};
use super::config::DownloadSettings;
use super::downloader::EpisodeDownloader;
use super::merger::Merger;
use super::models::{AppResult, EpisodeId, EpisodeOutcome, Language, LanguageDownload};

#[derive(Clone)]
pub struct Orchestrator {
    downloader: Arc<EpisodeDownloader>,
    merger: Arc<Merger>,
    catalog: Option<Arc<EpisodeCatalog>>,
    settings: Arc<DownloadSettings>,
    multilanguage: bool,
    concurrent_episodes: usize,
}

impl Orchestrator {
    pub fn new(
        downloader: EpisodeDownloader,
        merger: Merger,
        catalog: Option<EpisodeCatalog>,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            downloader: Arc::new(downloader),
            merger: Arc::new(merger),
            catalog: catalog.map(Arc::new),
            multilanguage: settings.multilanguage,
            concurrent_episodes: settings.concurrent_episodes.max(1),
            settings: Arc::new(settings),
        }
    }

    fn url_for(&self, id: EpisodeId, language: Language) -> String {
        resolve_url(self.catalog.as_deref(), &self.settings, id, language)
    }

    fn spawn_download(
        &self,
        id: EpisodeId,
        language: Language,
        url: String,
    ) -> JoinHandle<AppResult<LanguageDownload>> {
        let downloader = Arc::clone(&self.downloader);
        tokio::spawn(async move { downloader.download(id, language, &url).await })
    }

    async fn join_download(
        handle: JoinHandle<AppResult<LanguageDownload>>,
        language: Language,
        url: String,
    ) -> LanguageDownload {
        let failed = |message: String| LanguageDownload {
            language,
            url: url.clone(),
            succeeded: false,
            error_message: Some(message),
        };

        match handle.await {
            Ok(Ok(download)) => download,
            Ok(Err(e)) => {
                error!("❌ {} download failed: {}", language, e);
                failed(e.to_string())
            }
            Err(e) => {
                error!("❌ {} download task aborted: {}", language, e);
                failed(format!("download task aborted: {}", e))
            }
        }
    }

    /// Download both language versions of `id` side by side, then merge
    pub async fn download_episode(&self, id: EpisodeId) -> EpisodeOutcome {
        info!("[Start] {}", id);
        let mut outcome = EpisodeOutcome::new(id);

        let german = self.multilanguage.then(|| {
            let url = self.url_for(id, Language::German);
            (self.spawn_download(id, Language::German, url.clone()), url)
        });

        let english_url = self.url_for(id, Language::English);
        let english = self.spawn_download(id, Language::English, english_url.clone());

        outcome
            .downloads
            .push(Self::join_download(english, Language::English, english_url).await);
        if let Some((handle, url)) = german {
            outcome
                .downloads
                .push(Self::join_download(handle, Language::German, url).await);
        }

        match self.merger.merge_episode(id, self.multilanguage).await {
            Ok(merged) => {
                info!("✅ {} -> {}", id, merged.output_path.display());
                outcome.title = merged.title;
                outcome.output_path = Some(merged.output_path);
            }
            Err(e) => {
                error!("❌ Failed to merge {}: {}", id, e);
                outcome.error_message = Some(e.to_string());
            }
        }

        info!("[End] {}", id);
        outcome
    }

    /// Episodes of `season`: from the catalog when it lists any, otherwise
    /// from the built-in season table
    pub fn season_episodes(&self, season: u32) -> Vec<EpisodeId> {
        if let Some(ref catalog) = self.catalog {
            let listed: Vec<EpisodeId> = catalog
                .episodes_in_season(season)
                .iter()
                .map(|e| e.id())
                .collect();
            if !listed.is_empty() {
                return listed;
            }
            warn!(
                "Episode list has no entries for season {}, using built-in table",
                season
            );
        }

        (1..=season_episode_count(season))
            .map(|episode| EpisodeId::new(season, episode))
            .collect()
    }

    /// Process every episode of `season`; outcomes come back in episode order
    pub async fn download_season(&self, season: u32) -> Vec<EpisodeOutcome> {
        let episodes = self.season_episodes(season);
        if episodes.is_empty() {
            warn!("Season {} has no known episodes", season);
            return Vec::new();
        }

        info!(
            "📺 Season {}: {} episode(s), {} at a time",
            season,
            episodes.len(),
            self.concurrent_episodes
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrent_episodes));
        let handles: Vec<_> = episodes
            .iter()
            .map(|&id| {
                let this = self.clone();
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    // the semaphore is never closed
                    let _permit = semaphore.acquire_owned().await.ok();
                    this.download_episode(id).await
                })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(episodes)
            .map(|(joined, id)| {
                joined.unwrap_or_else(|e| {
                    error!("❌ Episode task {} aborted: {}", id, e);
                    let mut outcome = EpisodeOutcome::new(id);
                    outcome.error_message = Some(format!("episode task aborted: {}", e));
                    outcome
                })
            })
            .collect()
    }
}

/// Totals over a whole run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub merged: Vec<EpisodeId>,
    pub failed: Vec<EpisodeId>,
    pub failed_downloads: usize,
    /// Files produced by successful merges
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &EpisodeOutcome) {
        if outcome.is_merged() {
            self.merged.push(outcome.id);
            self.outputs.extend(outcome.output_path.iter().cloned());
        } else {
            self.failed.push(outcome.id);
        }
        self.failed_downloads += outcome.downloads.iter().filter(|d| !d.succeeded).count();
    }

    pub fn extend(&mut self, outcomes: &[EpisodeOutcome]) {
        for outcome in outcomes {
            self.record(outcome);
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn log(&self) {
        info!(
            "📊 {} episode(s) merged, {} failed, {} language download(s) failed",
            self.merged.len(),
            self.failed.len(),
            self.failed_downloads
        );
        for id in &self.failed {
            warn!("   not merged: {}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::EpisodeEntry;
    use crate::core::dl_options::DownloadOptions;
    use crate::core::test_support::{touch_all, RecordingRunner};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    fn orchestrator(catalog: Option<EpisodeCatalog>, dir: &Path) -> Orchestrator {
        orchestrator_with(Arc::new(RecordingRunner::new()), catalog, dir)
    }

    fn orchestrator_with(
        runner: Arc<RecordingRunner>,
        catalog: Option<EpisodeCatalog>,
        dir: &Path,
    ) -> Orchestrator {
        let downloader = EpisodeDownloader::new(
            runner.clone(),
            PathBuf::from("yt-dlp"),
            dir.to_path_buf(),
            DownloadOptions::english(),
            DownloadOptions::german(),
        );
        let merger = Merger::new(
            runner,
            PathBuf::from("ffmpeg"),
            dir.to_path_buf(),
            "South_Park".to_string(),
            false,
        );
        Orchestrator::new(downloader, merger, catalog, DownloadSettings::default())
    }

    #[test]
    fn test_season_episodes_from_table() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(None, dir.path());

        let episodes = orchestrator.season_episodes(1);
        assert_eq!(episodes.len(), 13);
        assert_eq!(episodes[0], EpisodeId::new(1, 1));
        assert_eq!(episodes[12], EpisodeId::new(1, 13));
        assert!(orchestrator.season_episodes(0).is_empty());
    }

    #[test]
    fn test_season_episodes_from_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let entries = [(3, 2), (3, 1), (4, 1)]
            .iter()
            .map(|&(season, episode)| EpisodeEntry {
                season,
                episode,
                title: None,
                urls: BTreeMap::new(),
            })
            .collect();
        let orchestrator = orchestrator(Some(EpisodeCatalog::from_entries(entries)), dir.path());

        assert_eq!(
            orchestrator.season_episodes(3),
            vec![EpisodeId::new(3, 1), EpisodeId::new(3, 2)]
        );
        // not listed: falls back to the table
        assert_eq!(orchestrator.season_episodes(2).len(), 18);
    }

    #[test]
    fn test_run_summary() {
        let mut merged = EpisodeOutcome::new(EpisodeId::new(1, 1));
        merged.output_path = Some(PathBuf::from("a.mp4"));
        let mut failed = EpisodeOutcome::new(EpisodeId::new(1, 2));
        failed.error_message = Some("no parts".to_string());
        failed.downloads.push(LanguageDownload {
            language: Language::English,
            url: "u".to_string(),
            succeeded: false,
            error_message: Some("boom".to_string()),
        });

        let mut summary = RunSummary::default();
        summary.extend(&[merged, failed]);
        assert_eq!(summary.merged, vec![EpisodeId::new(1, 1)]);
        assert_eq!(summary.failed, vec![EpisodeId::new(1, 2)]);
        assert_eq!(summary.failed_downloads, 1);
        assert_eq!(summary.outputs, vec![PathBuf::from("a.mp4")]);
        assert!(summary.has_failures());
    }

    #[tokio::test]
    async fn test_panicking_download_is_a_failure_and_merge_still_runs() {
        let dir = tempfile::tempdir().unwrap();
        touch_all(dir.path(), &["Ac1_0203_a_en.mp4"]);
        let runner = Arc::new(
            RecordingRunner::new().with_effect("yt-dlp", |_, _| panic!("downloader crashed")),
        );
        let orchestrator = orchestrator_with(runner.clone(), None, dir.path());

        let outcome = orchestrator.download_episode(EpisodeId::new(2, 3)).await;

        assert_eq!(outcome.downloads.len(), 1);
        let download = &outcome.downloads[0];
        assert!(!download.succeeded);
        assert!(download
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("download task aborted"));

        assert_eq!(runner.calls_to("ffmpeg").len(), 1);
        assert!(outcome.is_merged(), "{:?}", outcome.error_message);
    }
}

//! sp-download - Core Library
//!
//! Downloads episodes in one or two language versions through yt-dlp, merges
//! the act parts and language tracks with ffmpeg and removes the leftovers.

pub mod core;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

// Re-export commonly used types
pub use crate::core::{
    catalog::{EpisodeCatalog, HttpCatalogSource},
    config::AppConfig,
    downloader::{CommandRunner, EpisodeDownloader, ProcessRunner},
    merger::Merger,
    models::{AppError, AppResult, EpisodeId, EpisodeOutcome, Language},
    orchestrator::{Orchestrator, RunSummary},
};

use crate::core::catalog::CACHE_FILE_NAME;
use crate::core::dl_options::DownloadOptions;
use crate::core::downloader::{locate_tool, media_tool_name, DOWNLOADER_CANDIDATES};

/// Resolved external programs
#[derive(Debug, Clone)]
pub struct Tools {
    pub downloader: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Tools {
    pub fn locate(config: &AppConfig) -> AppResult<Self> {
        let downloader = locate_tool(
            config.download.downloader_path.as_deref(),
            DOWNLOADER_CANDIDATES,
        )?;
        let ffmpeg = locate_tool(config.merge.ffmpeg_path.as_deref(), &[media_tool_name()])?;

        tracing::debug!(
            "Using downloader {} and media tool {}",
            downloader.display(),
            ffmpeg.display()
        );
        Ok(Self { downloader, ffmpeg })
    }
}

/// Wire downloader, merger and catalog together from the configuration
pub fn build_orchestrator(
    config: &AppConfig,
    tools: &Tools,
    runner: Arc<dyn CommandRunner>,
    catalog: Option<EpisodeCatalog>,
) -> Orchestrator {
    let downloader = EpisodeDownloader::new(
        Arc::clone(&runner),
        tools.downloader.clone(),
        config.work_dir.clone(),
        DownloadOptions::from_settings(Language::English, &config.download.english),
        DownloadOptions::from_settings(Language::German, &config.download.german),
    );

    let merger = Merger::new(
        runner,
        tools.ffmpeg.clone(),
        config.work_dir.clone(),
        config.merge.output_prefix.clone(),
        config.merge.append_title,
    );

    Orchestrator::new(downloader, merger, catalog, config.download.clone())
}

/// Load the episode list when one is configured
pub async fn load_catalog(
    config: &AppConfig,
    force_refresh: bool,
) -> AppResult<Option<EpisodeCatalog>> {
    let Some(ref url) = config.catalog.url else {
        return Ok(None);
    };

    let cache_path = config
        .resolve_cache_dir()
        .map_err(|e| AppError::Config(e.to_string()))?
        .join(CACHE_FILE_NAME);
    let source = HttpCatalogSource::new(url, &config.catalog)?;

    let catalog =
        EpisodeCatalog::load_or_refresh(&source, &cache_path, &config.catalog, force_refresh)
            .await?;
    tracing::info!("📋 Episode list: {} episodes", catalog.len());
    Ok(Some(catalog))
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

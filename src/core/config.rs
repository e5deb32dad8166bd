//! Application configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::models::Language;

/// Main application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory the downloader writes into and the merger/cleanup operate on
    pub work_dir: PathBuf,
    pub log_level: String, // "error", "warn", "info", "debug", "trace"
    pub download: DownloadSettings,
    pub catalog: CatalogConfig,
    pub merge: MergeConfig,
    pub cleanup: CleanupConfig,
}

/// Downloader-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Explicit yt-dlp / youtube-dl binary; looked up on PATH when unset
    pub downloader_path: Option<PathBuf>,
    pub concurrent_episodes: usize,
    pub multilanguage: bool,
    pub english: LanguageSettings,
    pub german: LanguageSettings,
}

/// Per-language source and option overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageSettings {
    /// Episode page URL, `{season}` and `{episode}` are two-digit numbers
    pub url_template: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub output_template: Option<String>,
}

/// Episode list configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Paginated JSON endpoint; without it the built-in season table is used
    pub url: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl_hours: u64,
    pub max_pages: u32,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

/// Media tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub output_prefix: String,
    /// Append the episode title to the output file name
    pub append_title: bool,
}

/// Cleanup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub delay_secs: u64,
    pub patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            log_level: "info".to_string(),
            download: DownloadSettings::default(),
            catalog: CatalogConfig::default(),
            merge: MergeConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            downloader_path: None,
            concurrent_episodes: 3,
            multilanguage: false,
            english: LanguageSettings::new(
                "http://southpark.cc.com/full-episodes/s{season}e{episode}",
            ),
            german: LanguageSettings::new(
                "http://www.southpark.de/alle-episoden/s{season}e{episode}",
            ),
        }
    }
}

impl LanguageSettings {
    pub fn new(url_template: &str) -> Self {
        Self {
            url_template: url_template.to_string(),
            format: None,
            retries: None,
            output_template: None,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: None,
            cache_dir: None,
            cache_ttl_hours: 24,
            max_pages: 100,
            timeout_seconds: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            output_prefix: "South_Park".to_string(),
            append_title: false,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: 4,
            patterns: ["*Ac*", "*Teil*", "*Ak*", "*temp*", "file*"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl DownloadSettings {
    pub fn language(&self, language: Language) -> &LanguageSettings {
        match language {
            Language::English => &self.english,
            Language::German => &self.german,
        }
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOrigin {
    Loaded(PathBuf),
    Created(PathBuf),
}

impl std::fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigOrigin::Loaded(path) => write!(f, "Loaded configuration from: {:?}", path),
            ConfigOrigin::Created(path) => {
                write!(f, "Created default configuration at: {:?}", path)
            }
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` (or the default location), creating
    /// the file with defaults if it does not exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_origin(path).map(|(config, _)| config)
    }

    /// Like [`AppConfig::load`], also reporting which file was used. Nothing
    /// is logged here since the subscriber depends on the loaded log level.
    pub fn load_with_origin(path: Option<&Path>) -> Result<(Self, ConfigOrigin)> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path()?,
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: AppConfig =
                serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;

            Ok((config, ConfigOrigin::Loaded(config_path)))
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok((config, ConfigOrigin::Created(config_path)))
        }
    }

    /// Save configuration to file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::debug!("Saved configuration to: {:?}", config_path);
        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "spdownload", "sp-download")
            .with_context(|| "Failed to get project directories")
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.json"))
    }

    /// Directory holding the cached episode list
    pub fn resolve_cache_dir(&self) -> Result<PathBuf> {
        match &self.catalog.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.cache_dir().to_path_buf()),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.download.concurrent_episodes == 0 {
            anyhow::bail!("Concurrent episodes must be greater than 0");
        }

        if self.download.concurrent_episodes > 32 {
            anyhow::bail!("Concurrent episodes should not exceed 32");
        }

        for language in Language::ALL {
            let settings = self.download.language(language);
            let template = settings.url_template.trim();
            if template.is_empty() {
                anyhow::bail!("URL template for {} must not be empty", language);
            }
            if !template.contains("{season}") || !template.contains("{episode}") {
                anyhow::bail!(
                    "URL template for {} must contain {{season}} and {{episode}}",
                    language
                );
            }
            if let Some(retries) = settings.retries {
                if retries > 100 {
                    anyhow::bail!("Retries for {} should not exceed 100", language);
                }
            }
            if let Some(ref template) = settings.output_template {
                if template.trim().is_empty() {
                    anyhow::bail!("Output template for {} must not be empty", language);
                }
            }
        }

        if let Some(ref url) = self.catalog.url {
            url::Url::parse(url).with_context(|| format!("Invalid catalog URL: {}", url))?;
        }

        if self.catalog.max_pages == 0 {
            anyhow::bail!("Catalog max pages must be greater than 0");
        }

        if self.catalog.timeout_seconds == 0 || self.catalog.timeout_seconds > 300 {
            anyhow::bail!("Catalog timeout should be between 1 and 300 seconds");
        }

        if self.merge.output_prefix.trim().is_empty() {
            anyhow::bail!("Output prefix must not be empty");
        }

        if self.cleanup.patterns.iter().any(|p| p.trim().is_empty()) {
            anyhow::bail!("Cleanup patterns must not be empty");
        }

        if !["error", "warn", "info", "debug", "trace"].contains(&self.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log level: must be 'error', 'warn', 'info', 'debug', or 'trace'"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cleanup.delay_secs, 4);
        assert_eq!(config.cleanup.patterns.len(), 5);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.merge.output_prefix, "South_Park");

        let reloaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(
            reloaded.download.english.url_template,
            config.download.english.url_template
        );
    }

    #[test]
    fn test_load_reports_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let (_, origin) = AppConfig::load_with_origin(Some(&path)).unwrap();
        assert_eq!(origin, ConfigOrigin::Created(path.clone()));
        assert!(origin.to_string().starts_with("Created default configuration"));

        let (_, origin) = AppConfig::load_with_origin(Some(&path)).unwrap();
        assert_eq!(origin, ConfigOrigin::Loaded(path));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "download": { "multilanguage": true }, "merge": { "append_title": true } }"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(config.download.multilanguage);
        assert!(config.merge.append_title);
        assert_eq!(config.download.concurrent_episodes, 3);
        assert_eq!(config.merge.output_prefix, "South_Park");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config_validation() {
        let mut config = AppConfig::default();
        config.download.concurrent_episodes = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.download.german.url_template = "http://example.com/{season}".to_string();
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.catalog.url = Some("not a url".to_string());
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.cleanup.patterns.push("  ".to_string());
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }
}

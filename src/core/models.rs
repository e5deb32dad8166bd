//! Core data models for the episode downloader

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Language version of an episode

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[serde(alias = "en", alias = "eng")]
    English,

    #[serde(alias = "de", alias = "ger", alias = "deu")]
    German,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::German];

    /// Suffix the downloader appends to part files (`_en.mp4`)
    pub fn suffix(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::German => "de",
        }
    }

    /// Stream language tag written into the muxed file
    pub fn stream_tag(&self) -> &'static str {
        match self {
            Language::English => "eng",
            Language::German => "ger",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::German => "german",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Season/episode pair

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeId {
    pub season: u32,

    pub episode: u32,
}

impl EpisodeId {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }

    /// Two-digit season, e.g. `02`
    pub fn season_code(&self) -> String {
        format!("{:02}", self.season)
    }

    /// Two-digit episode, e.g. `03`
    pub fn episode_code(&self) -> String {
        format!("{:02}", self.episode)
    }

    /// `S02E03`
    pub fn tag(&self) -> String {
        format!("S{:02}E{:02}", self.season, self.episode)
    }

    /// `0203`, the key part files carry in their names
    pub fn compact(&self) -> String {
        format!("{:02}{:02}", self.season, self.episode)
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl FromStr for EpisodeId {
    type Err = AppError;

    /// Parses `SS:EE`, e.g. `02:03`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (season, episode) = s
            .split_once(':')
            .ok_or_else(|| AppError::Parse(format!("expected SS:EE, got '{}'", s)))?;

        let parse = |part: &str, what: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|e| AppError::Parse(format!("invalid {} '{}': {}", what, part, e)))
        };

        let season = parse(season, "season")?;
        let episode = parse(episode, "episode")?;
        if episode == 0 {
            return Err(AppError::Parse("episode numbers start at 1".to_string()));
        }

        Ok(Self { season, episode })
    }
}

/// Result of one language download

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageDownload {
    pub language: Language,

    pub url: String,

    pub succeeded: bool,

    pub error_message: Option<String>,
}

/// Result of processing one episode

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    pub id: EpisodeId,

    pub title: Option<String>,

    pub downloads: Vec<LanguageDownload>,

    pub output_path: Option<PathBuf>,

    pub error_message: Option<String>,
}

impl EpisodeOutcome {
    pub fn new(id: EpisodeId) -> Self {
        Self {
            id,
            title: None,
            downloads: Vec::new(),
            output_path: None,
            error_message: None,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.output_path.is_some() && self.error_message.is_none()
    }
}

/// Application error types

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Merge error: {0}")]
    Merge(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("System error: {0}")]
    System(String),
}

/// Result type alias for application operations

pub type AppResult<T> = Result<T, AppError>;

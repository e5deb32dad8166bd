//! Episode downloader
//!
//! Drives yt-dlp (or youtube-dl) as a subprocess. Every external program the
//! crate starts goes through [`CommandRunner`], so the merger shares the same
//! process plumbing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dl_options::DownloadOptions;
use super::models::{AppError, AppResult, EpisodeId, Language, LanguageDownload};

/// Program names tried on PATH when no downloader is configured
pub const DOWNLOADER_CANDIDATES: &[&str] = &["yt-dlp", "youtube-dl"];

/// Platform name of the media tool binary
pub fn media_tool_name() -> &'static str {
    if cfg!(windows) {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

/// What a finished external program reported
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: String,
}

impl CommandOutput {
    /// Last non-empty stderr line, for log messages
    pub fn stderr_tail(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("")
    }
}

/// Runs an external program to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String], cwd: &Path) -> AppResult<CommandOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &Path, args: &[String], cwd: &Path) -> AppResult<CommandOutput> {
        debug!("Running {} {:?} in {}", program.display(), args, cwd.display());

        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                AppError::System(format!("Failed to run {}: {}", program.display(), e))
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Resolve an external tool: the configured path wins, otherwise the first
/// candidate found on PATH
pub fn locate_tool(configured: Option<&Path>, candidates: &[&str]) -> AppResult<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return which::which(path).map_err(|_| {
            AppError::Config(format!("Configured tool not found: {}", path.display()))
        });
    }

    candidates
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| {
            AppError::System(format!(
                "None of [{}] found on PATH",
                candidates.join(", ")
            ))
        })
}

/// Downloads one language version of an episode into the work directory
pub struct EpisodeDownloader {
    runner: Arc<dyn CommandRunner>,
    program: PathBuf,
    work_dir: PathBuf,
    english: DownloadOptions,
    german: DownloadOptions,
}

impl EpisodeDownloader {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        program: PathBuf,
        work_dir: PathBuf,
        english: DownloadOptions,
        german: DownloadOptions,
    ) -> Self {
        Self {
            runner,
            program,
            work_dir,
            english,
            german,
        }
    }

    pub fn options(&self, language: Language) -> &DownloadOptions {
        match language {
            Language::English => &self.english,
            Language::German => &self.german,
        }
    }

    /// Fetch `url` as the `language` version of `id`.
    ///
    /// With `ignore_errors` a failing downloader is recorded in the returned
    /// [`LanguageDownload`] instead of failing the call.
    pub async fn download(
        &self,
        id: EpisodeId,
        language: Language,
        url: &str,
    ) -> AppResult<LanguageDownload> {
        info!("[Download start] {} {}", id, language);

        let options = self.options(language);
        let args = options.to_args(url);
        let output = self.runner.run(&self.program, &args, &self.work_dir).await?;

        let result = if output.success {
            info!("[Download finished] {} {}", id, language);
            LanguageDownload {
                language,
                url: url.to_string(),
                succeeded: true,
                error_message: None,
            }
        } else {
            let message = format!(
                "downloader exited with {:?}: {}",
                output.code,
                output.stderr_tail()
            );
            if !options.ignore_errors {
                return Err(AppError::Download(format!("{} {}: {}", id, language, message)));
            }
            warn!("[Download failed] {} {} ({})", id, language, message);
            LanguageDownload {
                language,
                url: url.to_string(),
                succeeded: false,
                error_message: Some(message),
            }
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::RecordingRunner;

    fn downloader(runner: Arc<RecordingRunner>, dir: &Path) -> EpisodeDownloader {
        EpisodeDownloader::new(
            runner,
            PathBuf::from("yt-dlp"),
            dir.to_path_buf(),
            DownloadOptions::english(),
            DownloadOptions::german(),
        )
    }

    #[tokio::test]
    async fn test_download_runs_downloader_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let downloader = downloader(runner.clone(), dir.path());

        let result = downloader
            .download(EpisodeId::new(2, 3), Language::German, "http://de/s02e03")
            .await
            .unwrap();
        assert!(result.succeeded);

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from("yt-dlp"));
        assert_eq!(calls[0].cwd, dir.path());
        assert!(calls[0].args.iter().any(|a| a == "--extract-audio"));
        assert_eq!(calls[0].args.last().unwrap(), "http://de/s02e03");
    }

    #[tokio::test]
    async fn test_failure_tolerated_with_ignore_errors() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new().failing("yt-dlp"));
        let downloader = downloader(runner, dir.path());

        let result = downloader
            .download(EpisodeId::new(1, 1), Language::English, "http://en/s01e01")
            .await
            .unwrap();
        assert!(!result.succeeded);
        assert!(result.error_message.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_failure_is_error_without_ignore_errors() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new().failing("yt-dlp"));
        let mut english = DownloadOptions::english();
        english.ignore_errors = false;
        let downloader = EpisodeDownloader::new(
            runner,
            PathBuf::from("yt-dlp"),
            dir.path().to_path_buf(),
            english,
            DownloadOptions::german(),
        );

        let result = downloader
            .download(EpisodeId::new(1, 1), Language::English, "http://en/s01e01")
            .await;
        assert!(matches!(result, Err(AppError::Download(_))));
    }

    #[test]
    fn test_locate_configured_tool() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("my-ffmpeg");
        std::fs::write(&tool, b"").unwrap();

        assert_eq!(locate_tool(Some(&tool), &["ffmpeg"]).unwrap(), tool);
        assert!(locate_tool(Some(&dir.path().join("missing")), &["ffmpeg"]).is_err());
        assert!(locate_tool(None, &["definitely-not-a-real-tool-4f2a"]).is_err());
    }

    #[test]
    fn test_stderr_tail() {
        let output = CommandOutput {
            success: false,
            code: Some(1),
            stderr: "first\nERROR: unable to extract\n\n".to_string(),
        };
        assert_eq!(output.stderr_tail(), "ERROR: unable to extract");
    }
}

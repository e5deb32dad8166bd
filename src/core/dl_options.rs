//! Downloader option presets
//!
//! One option set per language. English is fetched as full video with
//! embedded subtitles, German only as an audio track that is muxed into the
//! English video later.

use serde::{Deserialize, Serialize};

use super::config::LanguageSettings;
use super::models::Language;

/// Post-processing step the downloader runs after fetching
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PostProcessor {
    EmbedSubtitle,
    ExtractAudio,
}

/// Options handed to yt-dlp for one download
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadOptions {
    pub format: String,
    pub retries: u32,
    pub ignore_errors: bool,
    pub hls_prefer_native: bool,
    pub continue_download: bool,
    pub write_subtitles: bool,
    pub subtitles_format: Option<String>,
    pub output_template: String,
    pub quiet: bool,
    pub postprocessors: Vec<PostProcessor>,
    pub no_check_certificate: bool,
}

impl DownloadOptions {
    pub fn english() -> Self {
        Self {
            format: "bestaudio/best".to_string(),
            retries: 10,
            ignore_errors: true,
            hls_prefer_native: false,
            continue_download: true,
            write_subtitles: true,
            subtitles_format: Some("vtt".to_string()),
            output_template: "%(title)s_en.%(ext)s".to_string(),
            quiet: true,
            postprocessors: vec![PostProcessor::EmbedSubtitle],
            no_check_certificate: true,
        }
    }

    pub fn german() -> Self {
        Self {
            format: "bestaudio/best".to_string(),
            retries: 10,
            ignore_errors: true,
            hls_prefer_native: false,
            continue_download: true,
            write_subtitles: false,
            subtitles_format: None,
            output_template: "%(title)s_de.%(ext)s".to_string(),
            quiet: true,
            postprocessors: vec![PostProcessor::ExtractAudio],
            no_check_certificate: true,
        }
    }

    pub fn for_language(language: Language) -> Self {
        match language {
            Language::English => Self::english(),
            Language::German => Self::german(),
        }
    }

    /// Preset for `language` with the configured overrides applied
    pub fn from_settings(language: Language, settings: &LanguageSettings) -> Self {
        let mut options = Self::for_language(language);
        if let Some(ref format) = settings.format {
            options.format = format.clone();
        }
        if let Some(retries) = settings.retries {
            options.retries = retries;
        }
        if let Some(ref template) = settings.output_template {
            options.output_template = template.clone();
        }
        options
    }

    /// Command line for yt-dlp, ending with the URL
    pub fn to_args(&self, url: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-f".into(),
            self.format.clone(),
            "--retries".into(),
            self.retries.to_string(),
        ];

        if self.ignore_errors {
            args.push("--ignore-errors".into());
        }
        args.push(if self.hls_prefer_native {
            "--hls-prefer-native".into()
        } else {
            "--hls-prefer-ffmpeg".into()
        });
        args.push(if self.continue_download {
            "--continue".into()
        } else {
            "--no-continue".into()
        });

        if self.write_subtitles {
            args.push("--write-subs".into());
            if let Some(ref format) = self.subtitles_format {
                args.push("--sub-format".into());
                args.push(format.clone());
            }
        }

        args.push("-o".into());
        args.push(self.output_template.clone());

        if self.quiet {
            args.push("--quiet".into());
        }

        for postprocessor in &self.postprocessors {
            args.push(
                match postprocessor {
                    PostProcessor::EmbedSubtitle => "--embed-subs",
                    PostProcessor::ExtractAudio => "--extract-audio",
                }
                .into(),
            );
        }

        if self.no_check_certificate {
            args.push("--no-check-certificates".into());
        }

        args.push(url.to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_english_args() {
        let args = DownloadOptions::english().to_args("http://example.com/s02e03");

        assert!(contains_pair(&args, "-f", "bestaudio/best"));
        assert!(contains_pair(&args, "--retries", "10"));
        assert!(contains_pair(&args, "--sub-format", "vtt"));
        assert!(contains_pair(&args, "-o", "%(title)s_en.%(ext)s"));
        for flag in [
            "--ignore-errors",
            "--hls-prefer-ffmpeg",
            "--continue",
            "--write-subs",
            "--quiet",
            "--embed-subs",
            "--no-check-certificates",
        ] {
            assert!(args.iter().any(|a| a == flag), "missing {}", flag);
        }
        assert!(!args.iter().any(|a| a == "--extract-audio"));
        assert_eq!(args.last().unwrap(), "http://example.com/s02e03");
    }

    #[test]
    fn test_german_args() {
        let args = DownloadOptions::german().to_args("http://example.de/s02e03");

        assert!(contains_pair(&args, "-o", "%(title)s_de.%(ext)s"));
        assert!(args.iter().any(|a| a == "--extract-audio"));
        assert!(!args.iter().any(|a| a == "--write-subs"));
        assert!(!args.iter().any(|a| a == "--embed-subs"));
    }

    #[test]
    fn test_settings_override() {
        let mut settings = LanguageSettings::new("http://example.com/s{season}e{episode}");
        settings.format = Some("best".to_string());
        settings.retries = Some(3);
        settings.output_template =
            Some("%(playlist)sS%(playlist_index)s_download_eng.%(ext)s".to_string());

        let options = DownloadOptions::from_settings(Language::English, &settings);
        assert_eq!(options.format, "best");
        assert_eq!(options.retries, 3);
        assert!(options.write_subtitles);

        let args = options.to_args("u");
        assert!(contains_pair(&args, "--retries", "3"));
        assert!(args.iter().any(|a| a.contains("_download_eng")));
    }
}

//! Episode merger
//!
//! An episode arrives as several act files per language. The English parts
//! are concatenated into one video; in multi-language mode the German parts
//! are concatenated into one audio track and muxed in as the first audio
//! stream.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::downloader::CommandRunner;
use super::models::{AppError, AppResult, EpisodeId, Language};
use crate::utils::file_utils::{glob_in_dir, make_safe};

/// Title of the episode taken from a downloaded part name
/// (`Show - Title - Act 1_0203_en.mp4` gives `Title`)
pub fn episode_title(dir: &Path, id: EpisodeId, language: Language) -> AppResult<Option<String>> {
    let pattern = format!("*{}*{}*", id.compact(), language.suffix());
    let title = glob_in_dir(dir, &pattern)?.into_iter().find_map(|name| {
        name.split(" - ")
            .nth(1)
            .map(|t| t.trim().replace(' ', "_"))
            .filter(|t| !t.is_empty())
    });
    Ok(title)
}

/// Give every part file of `id` a portable name. Returns how many were renamed.
pub fn normalize_part_names(dir: &Path, id: EpisodeId) -> AppResult<usize> {
    let mut renamed = 0;
    for name in glob_in_dir(dir, &format!("*_{}_*", id.compact()))? {
        let safe = make_safe(&name.replace(' ', ""));
        if safe == name {
            continue;
        }
        if dir.join(&safe).exists() {
            warn!("Not renaming {}: {} already exists", name, safe);
            continue;
        }
        debug!("Renaming {} -> {}", name, safe);
        std::fs::rename(dir.join(&name), dir.join(&safe))?;
        renamed += 1;
    }
    Ok(renamed)
}

/// Name of the concat list for one language, e.g. `files_0203en.txt`
pub fn concat_list_name(id: EpisodeId, language: Language) -> String {
    format!(
        "files_{}{}{}.txt",
        id.season_code(),
        id.episode_code(),
        language.suffix()
    )
}

/// Write the concat demuxer list for one language; returns the list file
/// name and how many parts it references
pub fn write_concat_list(
    dir: &Path,
    id: EpisodeId,
    language: Language,
) -> AppResult<(String, usize)> {
    info!("[Create video list file] {} {}", id, language.suffix());

    let pattern = format!("*_{}_*{}?m*", id.compact(), language.suffix());
    let parts = glob_in_dir(dir, &pattern)?;

    let content: String = parts
        .iter()
        .map(|name| format!("file '{}'\n", name.replace('\'', "'\\''")))
        .collect();

    let list_name = concat_list_name(id, language);
    std::fs::write(dir.join(&list_name), content)?;
    Ok((list_name, parts.len()))
}

/// `ffmpeg` arguments concatenating the parts listed in `list` into `output`
pub fn concat_args(list: &str, output: &str) -> Vec<String> {
    [
        "-y", "-f", "concat", "-i", list, "-c", "copy", "-scodec", "copy", output,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// `ffmpeg` arguments muxing the `audio` track into `video`. The added track
/// becomes audio stream 0, the video's own audio stream 1.
pub fn add_audio_args(
    video: &str,
    audio: &str,
    added: Language,
    original: Language,
    output: &str,
) -> Vec<String> {
    let added_tag = format!("language={}", added.stream_tag());
    let original_tag = format!("language={}", original.stream_tag());
    [
        "-y",
        "-i",
        video,
        "-i",
        audio,
        "-c",
        "copy",
        "-map",
        "0:v:0",
        "-map",
        "1:a:0",
        "-map",
        "0:a:0",
        "-map",
        "0:s:0",
        "-metadata:s:a:0",
        &added_tag,
        "-metadata:s:a:1",
        &original_tag,
        output,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// What a successful merge produced
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub output_path: PathBuf,
    pub title: Option<String>,
    pub multilanguage: bool,
}

pub struct Merger {
    runner: Arc<dyn CommandRunner>,
    ffmpeg: PathBuf,
    work_dir: PathBuf,
    output_prefix: String,
    append_title: bool,
}

impl Merger {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        ffmpeg: PathBuf,
        work_dir: PathBuf,
        output_prefix: String,
        append_title: bool,
    ) -> Self {
        Self {
            runner,
            ffmpeg,
            work_dir,
            output_prefix,
            append_title,
        }
    }

    /// `South_Park_S02E03`, optionally followed by the title
    pub fn output_base(&self, id: EpisodeId, title: Option<&str>) -> String {
        let base = format!(
            "{}_S{}E{}",
            self.output_prefix,
            id.season_code(),
            id.episode_code()
        );
        match title {
            Some(title) if self.append_title => format!("{}_{}", base, make_safe(title)),
            _ => base,
        }
    }

    async fn ffmpeg(&self, step: &str, id: EpisodeId, args: Vec<String>) -> AppResult<()> {
        info!("[{}] {}", step, id);
        let output = self.runner.run(&self.ffmpeg, &args, &self.work_dir).await?;
        if output.success {
            Ok(())
        } else {
            Err(AppError::Merge(format!(
                "{} {}: ffmpeg exited with {:?}: {}",
                step,
                id,
                output.code,
                output.stderr_tail()
            )))
        }
    }

    /// Merge the downloaded parts of `id` into one file in the work directory
    pub async fn merge_episode(&self, id: EpisodeId, multilanguage: bool) -> AppResult<MergeResult> {
        let title = episode_title(&self.work_dir, id, Language::English)?;
        if let Some(ref title) = title {
            debug!("{} is \"{}\"", id, title);
        }

        normalize_part_names(&self.work_dir, id)?;

        let base = self.output_base(id, title.as_deref());
        let output = format!("{}.mp4", base);

        let (video_list, video_parts) = write_concat_list(&self.work_dir, id, Language::English)?;
        if video_parts == 0 {
            return Err(AppError::Merge(format!("no english parts found for {}", id)));
        }

        let mut multilanguage = multilanguage;
        let mut audio_list = None;
        if multilanguage {
            let (list, audio_parts) = write_concat_list(&self.work_dir, id, Language::German)?;
            if audio_parts == 0 {
                warn!("No german parts found for {}, merging english only", id);
                multilanguage = false;
            } else {
                audio_list = Some(list);
            }
        }

        match audio_list {
            Some(audio_list) => {
                let temp_audio = format!("{}_temp.m4a", base);
                let temp_video = format!("{}_temp.mp4", base);

                self.ffmpeg(
                    "merge german audio tracks",
                    id,
                    concat_args(&audio_list, &temp_audio),
                )
                .await?;
                self.ffmpeg(
                    "merge english video tracks",
                    id,
                    concat_args(&video_list, &temp_video),
                )
                .await?;
                self.ffmpeg(
                    "add german audio track to video",
                    id,
                    add_audio_args(
                        &temp_video,
                        &temp_audio,
                        Language::German,
                        Language::English,
                        &output,
                    ),
                )
                .await?;
            }
            None => {
                self.ffmpeg(
                    "merge english video tracks",
                    id,
                    concat_args(&video_list, &output),
                )
                .await?;
            }
        }

        Ok(MergeResult {
            output_path: self.work_dir.join(output),
            title,
            multilanguage,
        })
    }
}

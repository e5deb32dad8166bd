//! Removal of intermediate files (act parts, temp tracks, concat lists)

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::models::AppResult;
use crate::utils::file_utils::glob_in_dir;

/// Delete every regular file in `dir` matching one of `patterns`, except the
/// files named in `keep`. Returns the number of files removed.
pub fn clean_up(dir: &Path, patterns: &[String], keep: &[PathBuf]) -> AppResult<usize> {
    let mut removed = 0;

    for pattern in patterns {
        for name in glob_in_dir(dir, pattern)? {
            if is_kept(&name, keep) {
                debug!("Keeping {}", name);
                continue;
            }
            let path = dir.join(&name);
            if !path.is_file() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed {}", name);
                    removed += 1;
                }
                // matched by an earlier pattern or removed by someone else
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(removed)
}

fn is_kept(name: &str, keep: &[PathBuf]) -> bool {
    keep.iter()
        .any(|path| path.file_name().and_then(|n| n.to_str()) == Some(name))
}

/// Wait `delay`, then clean up. Failures are logged, not returned.
pub async fn clean_up_after(
    dir: &Path,
    patterns: &[String],
    keep: &[PathBuf],
    delay: Duration,
) -> usize {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    info!("Clean up temporary data");
    match clean_up(dir, patterns, keep) {
        Ok(removed) => {
            info!("🧹 Removed {} temporary file(s)", removed);
            removed
        }
        Err(e) => {
            warn!("Cleanup failed: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CleanupConfig;
    use crate::core::test_support::touch_all;

    #[test]
    fn test_default_patterns() {
        let dir = tempfile::tempdir().unwrap();
        touch_all(
            dir.path(),
            &[
                "Act1_0203_a_en.mp4",
                "Teil2_0203_a_de.m4a",
                "Akt3_0203_a_de.m4a",
                "South_Park_S02E03_temp.mp4",
                "files_0203en.txt",
                "South_Park_S02E03.mp4",
            ],
        );
        std::fs::create_dir(dir.path().join("file_dir")).unwrap();

        let removed = clean_up(dir.path(), &CleanupConfig::default().patterns, &[]).unwrap();
        assert_eq!(removed, 5);
        assert!(dir.path().join("South_Park_S02E03.mp4").exists());
        assert!(dir.path().join("file_dir").is_dir());
    }

    #[tokio::test]
    async fn test_clean_up_after_without_delay() {
        let dir = tempfile::tempdir().unwrap();
        touch_all(dir.path(), &["x_temp.m4a", "keep.mp4"]);

        let removed =
            clean_up_after(dir.path(), &["*temp*".to_string()], &[], Duration::ZERO).await;
        assert_eq!(removed, 1);
        assert!(dir.path().join("keep.mp4").exists());
    }

    #[test]
    fn test_merged_outputs_survive_matching_patterns() {
        let dir = tempfile::tempdir().unwrap();
        touch_all(
            dir.path(),
            &[
                "South_Park_S02E03_Acid_Trip.mp4",
                "South_Park_S02E03_temp.mp4",
                "Act1_0203_a_en.mp4",
            ],
        );
        let output = dir.path().join("South_Park_S02E03_Acid_Trip.mp4");

        let removed = clean_up(
            dir.path(),
            &CleanupConfig::default().patterns,
            &[output.clone()],
        )
        .unwrap();
        assert_eq!(removed, 2);
        assert!(output.exists());
    }
}

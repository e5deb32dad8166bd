//! File system utilities

use glob::{MatchOptions, Pattern};
use std::path::Path;
use walkdir::WalkDir;

use crate::core::models::{AppError, AppResult};

/// Turn an arbitrary file name into a portable one.
///
/// Alphanumerics (any script) and `.` are kept, everything else becomes `_`,
/// trailing underscores are dropped and the result is transliterated to ASCII.
pub fn make_safe(unsafe_name: &str) -> String {
    let replaced: String = unsafe_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' { c } else { '_' })
        .collect();

    deunicode::deunicode(replaced.trim_end_matches('_'))
}

/// Compile a shell-style pattern (`*`, `?`, `[...]`, `[!...]`)
pub fn compile_pattern(pattern: &str) -> AppResult<Pattern> {
    Pattern::new(pattern)
        .map_err(|e| AppError::Parse(format!("invalid pattern '{}': {}", pattern, e)))
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Names of the entries directly inside `dir` that match `pattern`, sorted.
///
/// Hidden entries only match patterns that start with a dot.
pub fn glob_in_dir(dir: &Path, pattern: &str) -> AppResult<Vec<String>> {
    let matcher = compile_pattern(pattern)?;

    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            AppError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to list {}: {}", dir.display(), e),
            ))
        })?;

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if matcher.matches_with(name, MATCH_OPTIONS) {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}

/// Ensure directory exists
pub fn ensure_dir_exists(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

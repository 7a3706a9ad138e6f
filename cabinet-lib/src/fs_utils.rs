use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A file to include in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Relative to the source directory, `/`-separated.
    pub relative: String,
    pub size: u64,
}

impl FileEntry {
    /// Name stored in the cabinet: the relative path with `\` separators.
    pub fn name_in_archive(&self) -> String {
        self.relative.replace('/', "\\")
    }
}

/// Compiles skip patterns with proper error handling.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|source| Error::InvalidPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Lists the files under `source`, top-level only unless `recursive`.
///
/// Directories are never returned as entries; a skipped directory is not
/// descended into. Symlinks are not followed. Entries are sorted by file name
/// within each directory. `exclude` (the archive being written) is left out
/// even when it lives inside `source`.
pub fn list_files(
    source: &Path,
    recursive: bool,
    skip: &[Pattern],
    exclude: Option<&Path>,
) -> Result<Vec<FileEntry>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let excluded = exclude.and_then(|p| p.canonicalize().ok());
    let mut result = Vec::new();

    let walker = WalkDir::new(source)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(&relative_path(source, e.path()), skip));

    for entry in walker {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            debug!(path = %entry.path().display(), "Skipping entry that is not a regular file");
            continue;
        }
        if is_same_file(entry.path(), excluded.as_deref()) {
            debug!(path = %entry.path().display(), "Skipping the archive being written");
            continue;
        }
        let size = entry.metadata()?.len();
        result.push(FileEntry {
            relative: relative_path(source, entry.path()),
            path: entry.into_path(),
            size,
        });
    }

    Ok(result)
}

fn is_same_file(path: &Path, excluded: Option<&Path>) -> bool {
    let Some(excluded) = excluded else {
        return false;
    };
    if path.file_name() != excluded.file_name() {
        return false;
    }
    path.canonicalize().is_ok_and(|p| p == excluded)
}

fn relative_path(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_skipped(relative: &str, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|p| p.matches(relative))
}

/// Sum of the entry sizes.
pub fn total_size(files: &[FileEntry]) -> u64 {
    files.iter().map(|f| f.size).sum()
}

/// Convert bytes into a human-friendly string using binary (KiB, MiB, GiB...) units.
pub fn encode_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    // 1.0 MiB prints as 1 MiB
    if (size * 10.0).round() % 10.0 == 0.0 {
        format!("{:.0} {}", size, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

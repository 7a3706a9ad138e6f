use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Canonical extension of the archives this crate writes.
pub const CAB_EXTENSION: &str = "cab";

/// Appends `.cab` unless the name already ends with it (ASCII case-insensitive).
///
/// Normalizing an already normalized name returns it unchanged.
pub fn normalize_archive_name(name: &str) -> String {
    let suffix = format!(".{CAB_EXTENSION}");
    if name.to_ascii_lowercase().ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}

/// Inputs for one archive-creation operation.
///
/// Built fresh for every run and moved into [`crate::ArchiveTask::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRequest {
    source_path: PathBuf,
    target_path: PathBuf,
    archive_name: String,
    include_subfolders: bool,
}

impl ArchiveRequest {
    /// Validates the inputs and normalizes the archive name.
    pub fn new(
        source_path: impl Into<PathBuf>,
        target_path: impl Into<PathBuf>,
        archive_name: &str,
        include_subfolders: bool,
    ) -> Result<Self> {
        let source_path = source_path.into();
        let target_path = target_path.into();

        if source_path.as_os_str().is_empty() {
            return Err(Error::EmptyField {
                field: "source path",
            });
        }
        if target_path.as_os_str().is_empty() {
            return Err(Error::EmptyField {
                field: "target path",
            });
        }
        if archive_name.is_empty() {
            return Err(Error::EmptyField {
                field: "archive name",
            });
        }

        let archive_name = normalize_archive_name(archive_name);
        if !is_plain_file_name(&archive_name) {
            return Err(Error::InvalidArchiveName(archive_name));
        }

        Ok(Self {
            source_path,
            target_path,
            archive_name,
            include_subfolders,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    pub fn include_subfolders(&self) -> bool {
        self.include_subfolders
    }

    /// `target_path` joined with the normalized archive name.
    pub fn destination_path(&self) -> PathBuf {
        self.target_path.join(&self.archive_name)
    }
}

/// True when `name` is a single normal path component on every platform.
fn is_plain_file_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

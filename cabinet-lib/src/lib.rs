use serde::{Deserialize, Serialize};

pub mod archiver;
pub mod cab_archiver;
pub mod error;
pub mod form;
pub mod fs_utils;
pub mod request;
pub mod task;

pub use archiver::{Archiver, CompressionLevel, PackJob, PackProgress, PackSummary, ProgressFn};
pub use cab_archiver::CabArchiver;
pub use error::{Error, Result};
pub use form::{FormEvent, FormState};
pub use request::{ArchiveRequest, normalize_archive_name};
pub use task::{ArchiveTask, Outcome, TaskOptions, TaskState};

/// Settings shared by the front ends, merged from env, file and CLI.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub source: Option<String>,
    pub target: Option<String>,
    pub name: Option<String>,
    pub config: Option<String>,
    pub recursive: Option<bool>,
    pub compression: Option<CompressionLevel>,
    pub skip: Option<Vec<String>>,
    pub dry: Option<bool>,
    pub remove_partial: Option<bool>,
}

impl Config {
    pub fn task_options(&self) -> TaskOptions {
        TaskOptions {
            compression: self.compression.unwrap_or_default(),
            skip: self.skip.clone().unwrap_or_default(),
            remove_partial: self.remove_partial.unwrap_or(false),
        }
    }
}

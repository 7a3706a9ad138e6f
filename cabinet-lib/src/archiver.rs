use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// How hard the archiver should try to shrink its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    None,
    Fast,
    #[default]
    Max,
}

impl FromStr for CompressionLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "store" => Ok(Self::None),
            "fast" => Ok(Self::Fast),
            "max" => Ok(Self::Max),
            _ => Err(Error::UnknownCompression(s.to_string())),
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Fast => "fast",
            Self::Max => "max",
        };
        f.write_str(s)
    }
}

/// Everything an [`Archiver`] needs to write one archive.
#[derive(Debug, Clone)]
pub struct PackJob {
    pub source_dir: PathBuf,
    pub destination: PathBuf,
    pub recursive: bool,
    pub compression: CompressionLevel,
    /// Glob patterns matched against paths relative to `source_dir`.
    pub skip: Vec<String>,
    pub cancel: CancellationToken,
}

/// Reported after each file has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackProgress {
    pub files_done: usize,
    pub files_total: usize,
    pub current: String,
}

/// What a successful pack produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub destination: PathBuf,
    pub files: usize,
    pub folders: usize,
    pub total_bytes: u64,
}

pub type ProgressFn = Arc<dyn Fn(&PackProgress) + Send + Sync>;

/// Capability that turns a directory into an archive file.
///
/// Implementations are synchronous; [`crate::ArchiveTask`] moves the call
/// onto a blocking worker.
pub trait Archiver: Send + Sync + 'static {
    fn pack(&self, job: &PackJob, progress: Option<&ProgressFn>) -> Result<PackSummary>;
}

impl<A: Archiver + ?Sized> Archiver for Arc<A> {
    fn pack(&self, job: &PackJob, progress: Option<&ProgressFn>) -> Result<PackSummary> {
        (**self).pack(job, progress)
    }
}

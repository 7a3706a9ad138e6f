use std::fs::File;
use std::io::{self, BufWriter};

use cab::{CabinetBuilder, CompressionType};
use tracing::{debug, info};

use crate::archiver::{Archiver, CompressionLevel, PackJob, PackProgress, PackSummary, ProgressFn};
use crate::error::{Error, Result};
use crate::fs_utils::{FileEntry, compile_patterns, list_files, total_size};

/// Largest uncompressed size of a single cabinet folder.
pub const FOLDER_SIZE_LIMIT: u64 = 0x7FFF_8000;

/// Largest number of files a single cabinet can index.
pub const MAX_FILES: usize = 0xFFFF;

/// [`Archiver`] that writes Microsoft Cabinet files through the `cab` crate.
#[derive(Debug, Clone, Copy)]
pub struct CabArchiver {
    folder_limit: u64,
}

impl Default for CabArchiver {
    fn default() -> Self {
        Self {
            folder_limit: FOLDER_SIZE_LIMIT,
        }
    }
}

impl CabArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowers the per-folder size limit, never above the format maximum.
    pub fn with_folder_limit(limit: u64) -> Self {
        Self {
            folder_limit: limit.clamp(1, FOLDER_SIZE_LIMIT),
        }
    }
}

fn compression_type(level: CompressionLevel) -> CompressionType {
    // The cab crate only writes MSZIP; Fast and Max share it.
    match level {
        CompressionLevel::None => CompressionType::None,
        CompressionLevel::Fast | CompressionLevel::Max => CompressionType::MsZip,
    }
}

/// Splits files into folders so none exceeds `limit` uncompressed bytes.
fn plan_folders(files: &[FileEntry], limit: u64) -> Result<Vec<&[FileEntry]>> {
    let mut folders = Vec::new();
    let mut start = 0;
    let mut used = 0u64;

    for (i, file) in files.iter().enumerate() {
        if file.size > limit {
            return Err(Error::FileTooLarge {
                path: file.path.clone(),
                size: file.size,
            });
        }
        if i > start && used + file.size > limit {
            folders.push(&files[start..i]);
            start = i;
            used = 0;
        }
        used += file.size;
    }
    if start < files.len() {
        folders.push(&files[start..]);
    }
    Ok(folders)
}

impl Archiver for CabArchiver {
    fn pack(&self, job: &PackJob, progress: Option<&ProgressFn>) -> Result<PackSummary> {
        let skip = compile_patterns(&job.skip)?;
        // The destination may sit inside the source; never pack it into itself.
        let files = list_files(&job.source_dir, job.recursive, &skip, Some(&job.destination))?;

        if files.is_empty() {
            return Err(Error::NoFiles(job.source_dir.clone()));
        }
        if files.len() > MAX_FILES {
            return Err(Error::TooManyFiles(files.len()));
        }

        let folders = plan_folders(&files, self.folder_limit)?;
        let ctype = compression_type(job.compression);

        let mut builder = CabinetBuilder::new();
        for folder in &folders {
            let folder_builder = builder.add_folder(ctype);
            for file in folder.iter() {
                folder_builder.add_file(file.name_in_archive());
            }
        }

        info!(
            source = %job.source_dir.display(),
            destination = %job.destination.display(),
            files = files.len(),
            folders = folders.len(),
            compression = %job.compression,
            "Packing cabinet"
        );

        let out = BufWriter::new(File::create(&job.destination)?);
        let mut writer = builder.build(out)?;

        // next_file yields files in the order they were added above
        let mut done = 0;
        while let Some(mut file_writer) = writer.next_file()? {
            if job.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let entry = &files[done];
            let mut input = File::open(&entry.path)?;
            io::copy(&mut input, &mut file_writer)?;
            done += 1;
            debug!(entry = %entry.relative, bytes = entry.size, "Added file");

            if let Some(report) = progress {
                report(&PackProgress {
                    files_done: done,
                    files_total: files.len(),
                    current: entry.relative.clone(),
                });
            }
        }

        let mut out = writer.finish()?;
        io::Write::flush(&mut out)?;

        Ok(PackSummary {
            destination: job.destination.clone(),
            files: files.len(),
            folders: folders.len(),
            total_bytes: total_size(&files),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn entry(name: &str, size: u64) -> FileEntry {
        FileEntry {
            path: PathBuf::from(name),
            relative: name.to_string(),
            size,
        }
    }

    fn job(source: &TempDir, out: &TempDir, recursive: bool) -> PackJob {
        PackJob {
            source_dir: source.path().to_path_buf(),
            destination: out.path().join("test.cab"),
            recursive,
            compression: CompressionLevel::Max,
            skip: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    fn cabinet_names(path: &std::path::Path) -> Vec<String> {
        let cabinet = cab::Cabinet::new(File::open(path).unwrap()).unwrap();
        let mut names = Vec::new();
        for folder in cabinet.folder_entries() {
            for file in folder.file_entries() {
                names.push(file.name().to_string());
            }
        }
        names
    }

    #[test]
    fn folders_split_at_limit() {
        let files = vec![entry("a", 4), entry("b", 4), entry("c", 2), entry("d", 9)];
        let folders = plan_folders(&files, 10).unwrap();
        let sizes: Vec<usize> = folders.iter().map(|f| f.len()).collect();
        assert_eq!(sizes, vec![3, 1]);
    }

    #[test]
    fn oversized_file_is_rejected() {
        let files = vec![entry("a", 4), entry("big", 11)];
        assert!(matches!(
            plan_folders(&files, 10),
            Err(Error::FileTooLarge { size: 11, .. })
        ));
    }

    #[test]
    fn packs_nested_files_with_progress() {
        let source = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        std::fs::write(source.path().join("x.txt"), b"top").unwrap();
        std::fs::create_dir(source.path().join("b")).unwrap();
        std::fs::write(source.path().join("b/y.txt"), b"nested").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: ProgressFn = Arc::new(move |p: &PackProgress| {
            sink.lock().unwrap().push((p.files_done, p.files_total));
        });

        let job = job(&source, &out, true);
        let summary = CabArchiver::new().pack(&job, Some(&progress)).unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.folders, 1);
        assert_eq!(summary.total_bytes, 9);
        assert_eq!(cabinet_names(&job.destination), vec!["b\\y.txt", "x.txt"]);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn small_folder_limit_writes_several_folders() {
        let source = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for name in ["1.bin", "2.bin", "3.bin"] {
            std::fs::write(source.path().join(name), [0u8; 8]).unwrap();
        }

        let mut job = job(&source, &out, false);
        job.compression = CompressionLevel::None;
        let summary = CabArchiver::with_folder_limit(16).pack(&job, None).unwrap();

        assert_eq!(summary.folders, 2);
        let cabinet = cab::Cabinet::new(File::open(&job.destination).unwrap()).unwrap();
        assert_eq!(cabinet.folder_entries().count(), 2);
        assert_eq!(cabinet_names(&job.destination).len(), 3);
    }

    #[test]
    fn destination_inside_source_is_not_packed() {
        let source = TempDir::new().unwrap();
        std::fs::write(source.path().join("x.txt"), b"hello").unwrap();
        let destination = source.path().join("archive.cab");
        std::fs::File::create(&destination).unwrap();

        let job = PackJob {
            source_dir: source.path().to_path_buf(),
            destination: destination.clone(),
            recursive: false,
            compression: CompressionLevel::Max,
            skip: Vec::new(),
            cancel: CancellationToken::new(),
        };
        let summary = CabArchiver::new().pack(&job, None).unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(summary.total_bytes, 5);
        assert_eq!(cabinet_names(&destination), vec!["x.txt"]);
    }

    #[test]
    fn empty_source_fails() {
        let source = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let err = CabArchiver::new().pack(&job(&source, &out, true), None).unwrap_err();
        assert!(matches!(err, Error::NoFiles(_)));
    }

    #[test]
    fn cancelled_job_stops() {
        let source = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        std::fs::write(source.path().join("x.txt"), b"top").unwrap();

        let job = job(&source, &out, false);
        job.cancel.cancel();
        let err = CabArchiver::new().pack(&job, None).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}

use std::fmt::Write;
use std::sync::Arc;

use anyhow::Result;
use cabinet_lib::fs_utils::{compile_patterns, encode_size, list_files, total_size};
use cabinet_lib::{
    ArchiveRequest, ArchiveTask, CabArchiver, Config, Outcome, PackProgress, ProgressFn,
};
use tracing::{debug, warn};

/// Runs one archive task on a freshly built runtime and returns its outcome.
pub fn run_within_tokio(config: &Config, request: ArchiveRequest) -> Result<Outcome> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all() // Enables both IO and time drivers
        .build()?;
    Ok(runtime.block_on(run_task(config, request)))
}

async fn run_task(config: &Config, request: ArchiveRequest) -> Outcome {
    let progress: ProgressFn = Arc::new(|p: &PackProgress| {
        debug!(
            done = p.files_done,
            total = p.files_total,
            entry = %p.current,
            "Progress"
        );
    });
    let task = ArchiveTask::new(CabArchiver::new(), config.task_options()).with_progress(progress);

    let cancel = task.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });

    let outcome = task.run(request).await;
    watcher.abort();
    outcome
}

/// Prints what a run would pack without touching the destination.
pub fn dry_run(config: &Config, request: &ArchiveRequest) -> Result<()> {
    print!("{}", format_dry_run(config, request)?);
    Ok(())
}

pub fn format_dry_run(config: &Config, request: &ArchiveRequest) -> Result<String> {
    let skip = compile_patterns(config.skip.as_deref().unwrap_or_default())?;
    let destination = request.destination_path();
    let files = list_files(
        request.source_path(),
        request.include_subfolders(),
        &skip,
        Some(&destination),
    )?;
    let total = total_size(&files);

    let mut out = String::new();
    writeln!(out, "--- DRY RUN ---")?;
    writeln!(out, "{}", serde_yaml::to_string(config)?)?;
    writeln!(out, "Destination: {}", destination.display())?;
    writeln!(out, "Total files: {}", files.len())?;
    writeln!(out, "Total size: {}", encode_size(total))?;
    for f in &files {
        writeln!(out, "  {} -> {}", f.path.display(), f.name_in_archive())?;
    }
    Ok(out)
}

/// Prints the single user-facing message for an outcome.
pub fn report(outcome: &Outcome) {
    print!("{}", format_report(outcome));
}

pub fn format_report(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Success(summary) => format!(
            "{}\n{} ({} files, {})\n",
            outcome.message(),
            summary.destination.display(),
            summary.files,
            encode_size(summary.total_bytes)
        ),
        Outcome::SetupFailure(_) => format!("{}\n", outcome.message()),
        Outcome::PackFailure(detail) => format!("{}\n{detail}\n", outcome.message()),
    }
}

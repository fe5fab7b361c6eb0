//! Command handlers for single and batch PNG optimization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::core::{ImageTask, OptimizationResult, RunStatus};
use crate::processing::Optimizer;
use crate::utils::{
    OptimizerError, OptimizerResult, extract_filename, find_data_error, format_bytes, validate_task,
};

/// Outcome of one batch task.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OptimizationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The failure was a problem with the file's contents
    pub data_error: bool,
    /// Where the input was copied after a data error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected_to: Option<PathBuf>,
}

/// Totals over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub optimized: usize,
    pub already_optimized: usize,
    pub cant_optimize: usize,
    pub inspection_failed: usize,
    pub failed: usize,
    pub data_errors: usize,
    /// Input bytes of every task that produced a result
    pub bytes_before: u64,
    /// Output bytes, counting untouched files at their original size
    pub bytes_after: u64,
}

impl BatchSummary {
    pub fn from_reports(reports: &[TaskReport]) -> Self {
        let mut summary = Self {
            total: reports.len(),
            ..Default::default()
        };
        for report in reports {
            let Some(result) = &report.result else {
                summary.failed += 1;
                if report.data_error {
                    summary.data_errors += 1;
                }
                continue;
            };
            summary.bytes_before += result.before_size;
            match result.status() {
                RunStatus::Optimized => {
                    summary.optimized += 1;
                    summary.bytes_after += result.after_size;
                }
                status => {
                    match status {
                        RunStatus::AlreadyOptimized => summary.already_optimized += 1,
                        RunStatus::CantOptimize => summary.cant_optimize += 1,
                        _ => summary.inspection_failed += 1,
                    }
                    summary.bytes_after += result.before_size;
                }
            }
        }
        summary
    }

    pub fn saved_bytes(&self) -> i64 {
        self.bytes_before as i64 - self.bytes_after as i64
    }
}

/// Optimizes a single image.
///
/// The task's own quality overrides the optimizer's. The pipeline runs on
/// the blocking thread pool.
///
/// # Arguments
/// * `optimizer` - Pipeline to run
/// * `task` - Source and destination paths
///
/// # Returns
/// The optimization result, or the error that aborted the run.
pub async fn optimize_image(optimizer: Optimizer, task: ImageTask) -> OptimizerResult<OptimizationResult> {
    validate_task(&task)?;

    let optimizer = match task.quality {
        Some(quality) => optimizer.with_quality(quality),
        None => optimizer,
    };
    let ImageTask {
        input_path,
        output_path,
        ..
    } = task;
    let source = input_path.clone();

    tokio::task::spawn_blocking(move || optimizer.run(&input_path, &output_path))
        .await
        .map_err(|e| OptimizerError::system("optimization task failed", source, std::io::Error::other(e)))?
}

/// Optimizes multiple images, at most `jobs` at a time.
///
/// Every task yields a report; one task failing does not stop the others.
/// When `collect_dir` is set, inputs that failed with a data error are
/// copied there for later analysis, prefixed with their task index so that
/// inputs sharing a file name do not overwrite each other.
///
/// # Arguments
/// * `optimizer` - Pipeline shared by every task
/// * `tasks` - Images to process
/// * `jobs` - Concurrency limit (0 is treated as 1)
/// * `collect_dir` - Where to copy inputs with malformed data
///
/// # Returns
/// One report per task, in task order.
pub async fn optimize_images(
    optimizer: &Optimizer,
    tasks: Vec<ImageTask>,
    jobs: usize,
    collect_dir: Option<&Path>,
) -> Vec<TaskReport> {
    let task_count = tasks.len();
    debug!("Received optimize_images command for {} images", task_count);

    if let Some(dir) = collect_dir {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Cannot create collection directory {}: {}", dir.display(), e);
        }
    }

    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let mut handles = Vec::with_capacity(task_count);
    for (index, task) in tasks.into_iter().enumerate() {
        let paths = (task.input_path.clone(), task.output_path.clone());
        let optimizer = optimizer.clone();
        let semaphore = Arc::clone(&semaphore);
        let collect_dir = collect_dir.map(Path::to_path_buf);
        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            run_task(optimizer, index, task, collect_dir.as_deref()).await
        });
        handles.push((paths, handle));
    }

    let mut reports = Vec::with_capacity(task_count);
    for ((input_path, output_path), handle) in handles {
        let report = match handle.await {
            Ok(report) => report,
            Err(e) => TaskReport {
                input_path,
                output_path,
                result: None,
                error: Some(format!("optimization task failed: {e}")),
                data_error: false,
                collected_to: None,
            },
        };
        reports.push(report);
    }

    let summary = BatchSummary::from_reports(&reports);
    info!(
        "Batch complete: {} optimized, {} skipped, {} failed ({} data errors), {} -> {}",
        summary.optimized,
        summary.already_optimized + summary.cant_optimize + summary.inspection_failed,
        summary.failed,
        summary.data_errors,
        format_bytes(summary.bytes_before),
        format_bytes(summary.bytes_after),
    );
    reports
}

async fn run_task(optimizer: Optimizer, index: usize, task: ImageTask, collect_dir: Option<&Path>) -> TaskReport {
    let input_path = task.input_path.clone();
    let output_path = task.output_path.clone();

    match optimize_image(optimizer, task).await {
        Ok(result) => {
            debug!("{}: {:?}", extract_filename(&input_path), result.status());
            TaskReport {
                input_path,
                output_path,
                result: Some(result),
                error: None,
                data_error: false,
                collected_to: None,
            }
        }
        Err(e) => {
            let data_error = find_data_error(&e).is_some();
            warn!("{}: {}", extract_filename(&input_path), e);
            let collected_to = match collect_dir {
                Some(dir) if data_error => collect_input(&input_path, dir, index).await,
                _ => None,
            };
            TaskReport {
                input_path,
                output_path,
                result: None,
                error: Some(e.to_string()),
                data_error,
                collected_to,
            }
        }
    }
}

/// Copies `input` into `dir` as `<index>-<file name>`. Existing files are
/// left in place.
async fn collect_input(input: &Path, dir: &Path, index: usize) -> Option<PathBuf> {
    let target = dir.join(format!("{index}-{}", extract_filename(input)));
    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        warn!(
            "Not collecting {}: {} already exists",
            input.display(),
            target.display()
        );
        return None;
    }
    match tokio::fs::copy(input, &target).await {
        Ok(_) => {
            debug!("Collected {} into {}", input.display(), target.display());
            Some(target)
        }
        Err(e) => {
            warn!("Failed to collect {}: {}", input.display(), e);
            None
        }
    }
}

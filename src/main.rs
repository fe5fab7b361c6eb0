use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use lightfile_png_lib::commands::{BatchSummary, TaskReport, optimize_image, optimize_images};
use lightfile_png_lib::core::{ImageTask, OptimizationResult, QualityLevel, RunStatus};
use lightfile_png_lib::processing::{Optimizer, read_comment};
use lightfile_png_lib::utils::{find_data_error, format_bytes};

/// Lossy PNG optimizer with PSNR quality gating
#[derive(Parser, Debug)]
#[command(name = "lightfile-png", version, about)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Optimize one PNG file
    Optimize {
        input: PathBuf,
        output: PathBuf,
        /// high, low, force, or anything else for the default level
        #[arg(short, long, default_value = "")]
        quality: String,
    },
    /// Optimize every task listed in a JSON file
    Batch {
        /// JSON array of {"inputPath", "outputPath", "quality"?}
        tasks: PathBuf,
        /// Quality for tasks that do not set their own
        #[arg(short, long, default_value = "")]
        quality: String,
        /// Images processed at once
        #[arg(short, long, default_value_t = default_jobs())]
        jobs: usize,
        /// Copy inputs that fail with a data error into this directory
        #[arg(long)]
        collect: Option<PathBuf>,
    },
    /// Print the optimization record embedded in a PNG
    Inspect { input: PathBuf },
}

#[derive(Serialize)]
struct BatchOutput<'a> {
    reports: &'a [TaskReport],
    summary: &'a BatchSummary,
}

fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)         // Remove file path
        .with_line_number(false)  // Remove line numbers
        .with_thread_ids(false)   // Remove thread IDs
        .with_thread_names(false) // Remove thread names
        .with_target(false)       // Remove module path
        .with_ansi(true)          // Keep colored output
        .with_writer(std::io::stderr)
        .compact()                // Use compact formatter instead of pretty
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!("{:?}", cli);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            // Data errors get their own exit status so scripts can collect them.
            if find_data_error(&*err).is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Optimize {
            input,
            output,
            quality,
        } => {
            let optimizer = Optimizer::new(QualityLevel::from(quality));
            let result = optimize_image(optimizer, ImageTask::new(&input, &output))
                .await
                .with_context(|| format!("optimizing {}", input.display()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", describe(&result));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Batch {
            tasks,
            quality,
            jobs,
            collect,
        } => {
            let text = tokio::fs::read_to_string(&tasks)
                .await
                .with_context(|| format!("reading task file {}", tasks.display()))?;
            let task_list: Vec<ImageTask> = serde_json::from_str(&text)
                .with_context(|| format!("parsing task file {}", tasks.display()))?;
            info!("Loaded {} tasks from {}", task_list.len(), tasks.display());

            let optimizer = Optimizer::new(QualityLevel::from(quality));
            let reports = optimize_images(&optimizer, task_list, jobs, collect.as_deref()).await;
            let summary = BatchSummary::from_reports(&reports);

            if cli.json {
                let output = BatchOutput {
                    reports: &reports,
                    summary: &summary,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for report in &reports {
                    match (&report.result, &report.error) {
                        (Some(result), _) => println!("{}: {}", report.input_path.display(), describe(result)),
                        (None, Some(err)) => println!("{}: error: {}", report.input_path.display(), err),
                        (None, None) => println!("{}: no result", report.input_path.display()),
                    }
                }
                println!(
                    "{} files, {} optimized, {} failed, saved {}",
                    summary.total,
                    summary.optimized,
                    summary.failed,
                    format_bytes(summary.saved_bytes().max(0) as u64)
                );
            }

            Ok(ExitCode::from(batch_status(&summary)))
        }
        Command::Inspect { input } => {
            let data = tokio::fs::read(&input)
                .await
                .with_context(|| format!("reading {}", input.display()))?;
            let comment = read_comment(&data).with_context(|| format!("parsing {}", input.display()))?;

            match comment {
                Some(comment) => match (&comment.parsed, cli.json) {
                    (Some(record), true) => println!("{}", serde_json::to_string_pretty(record)?),
                    (Some(record), false) => println!(
                        "by {}: {} -> {}, PNGQuant: {}, PSNR: {} dB",
                        record.by,
                        format_bytes(record.before.max(0) as u64),
                        format_bytes(record.after.max(0) as u64),
                        record.pngquant,
                        record.psnr
                    ),
                    (None, _) => println!("{}", comment.raw),
                },
                None => println!("{}: no LightFile record", input.display()),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// 0 when every task produced a result, 2 when every failure was a data
/// error, 1 otherwise.
fn batch_status(summary: &BatchSummary) -> u8 {
    if summary.failed == 0 {
        0
    } else if summary.data_errors == summary.failed {
        2
    } else {
        1
    }
}

fn describe(result: &OptimizationResult) -> String {
    match result.status() {
        RunStatus::AlreadyOptimized => format!(
            "already optimized by {}",
            result.already_optimized_by.as_deref().unwrap_or("unknown")
        ),
        RunStatus::CantOptimize => format!("cannot optimize ({})", format_bytes(result.before_size)),
        RunStatus::InspectionFailed => format!(
            "PSNR inspection failed ({} dB)",
            result.final_psnr.unwrap_or_default()
        ),
        RunStatus::Optimized => format!(
            "{} -> {} ({:.1}% reduction), PNGQuant: {}",
            format_bytes(result.before_size),
            format_bytes(result.after_size),
            result.compression_ratio(),
            result.quantize.applied()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_status_separates_data_errors() {
        let summary = |failed, data_errors| BatchSummary {
            total: 3,
            failed,
            data_errors,
            ..Default::default()
        };
        assert_eq!(batch_status(&summary(0, 0)), 0);
        assert_eq!(batch_status(&summary(2, 2)), 2);
        assert_eq!(batch_status(&summary(2, 1)), 1);
        assert_eq!(batch_status(&summary(1, 0)), 1);
    }
}

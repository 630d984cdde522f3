//! Command-line interface.
//!
//! Commands:
//! - `generate` — run the full pipeline for one walkthrough and write the
//!   bundle plus `report.json` to the output directory.
//! - `status` — print the report of a previously generated run.
//!
//! Configuration precedence: CLI flags > config file > defaults. The config
//! file is discovered by searching upward from CWD for
//! `.reelforge/config.toml`; `--config` names one explicitly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use reelforge_config::{CliOverrides, Config};
use reelforge_pipeline::{PipelineRun, PipelineService, RunInput, RunStatus};
use reelforge_utils::atomic_write::write_file_atomic;
use reelforge_utils::error::ReelforgeError;
use reelforge_utils::exit_codes::ExitCode;
use reelforge_utils::logging;

use crate::report::{REPORT_FILE, RunReport};

/// reelforge — walkthrough-to-website generation pipeline
#[derive(Parser)]
#[command(name = "reelforge")]
#[command(about = "Turns a recorded product walkthrough into a website bundle")]
#[command(long_about = r#"
reelforge orchestrates a staged generation pipeline: the walkthrough capture
and narration transcript are analyzed in parallel, an architecture plan is
derived, the site bundle is generated, and a bounded validate-and-refine
cycle polishes it against the browser harness. Under quota pressure the
pipeline transparently degrades to cheaper model tiers.

EXAMPLES:
  # Generate a site from a walkthrough capture and its narration
  reelforge generate capture.txt --narration narration.txt --out output/site

  # Offline smoke run: scripted model, permissive validator, no network
  reelforge generate capture.txt --dry-run

  # Cap refinement at two passes and widen the worker pool
  reelforge generate capture.txt --max-iterations 2 --pool-size 8

  # Inspect the report of the last run in an output directory
  reelforge status --out output/site
"#)]
#[command(version)]
struct Cli {
    /// Explicit config file path (default: discovered .reelforge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one walkthrough
    Generate {
        /// Walkthrough capture descriptor (frame notes / scene summary)
        walkthrough: PathBuf,

        /// Narration transcript file
        #[arg(long)]
        narration: Option<PathBuf>,

        /// Output directory for the bundle and report
        #[arg(long)]
        out: Option<PathBuf>,

        /// Run offline: scripted model backend, permissive validator
        #[arg(long)]
        dry_run: bool,

        /// Worker pool size (bounds concurrent model calls)
        #[arg(long)]
        pool_size: Option<usize>,

        /// Maximum refinement generation passes
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Print the full run snapshot as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Print the report of a previously generated run
    Status {
        /// Output directory holding report.json
        #[arg(long)]
        out: Option<PathBuf>,

        /// Compact single-line output
        #[arg(long)]
        json: bool,
    },
}

/// CLI entry point. Handles all output, including errors; returns the exit
/// code for `main` to apply.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    // A second init (e.g. under test harnesses) is harmless.
    let _ = logging::init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            walkthrough,
            narration,
            out,
            dry_run,
            pool_size,
            max_iterations,
            json,
        } => {
            let overrides = CliOverrides {
                config_path: cli.config,
                pool_size,
                max_iterations,
                output_dir: out,
                tiers: None,
            };
            generate(&walkthrough, narration.as_deref(), &overrides, dry_run, json)
        }
        Commands::Status { out, json } => {
            let overrides = CliOverrides {
                config_path: cli.config,
                ..CliOverrides::default()
            };
            status(out.as_deref(), &overrides, json)
        }
    }
}

fn fail(err: &ReelforgeError) -> ExitCode {
    eprintln!("Error: {err}");
    err.to_exit_code()
}

fn generate(
    walkthrough_path: &Path,
    narration_path: Option<&Path>,
    overrides: &CliOverrides,
    dry_run: bool,
    json: bool,
) -> Result<(), ExitCode> {
    let mut config = Config::discover(overrides).map_err(|e| fail(&e.into()))?;
    if dry_run {
        config.llm.provider = "scripted".to_string();
        config.validator.endpoint = None;
    }

    let walkthrough = std::fs::read_to_string(walkthrough_path).map_err(|e| {
        eprintln!(
            "Error: cannot read walkthrough '{}': {e}",
            walkthrough_path.display()
        );
        ExitCode::Failure
    })?;
    let narration = match narration_path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            eprintln!("Error: cannot read narration '{}': {e}", path.display());
            ExitCode::Failure
        })?,
        None => String::new(),
    };

    let runtime = tokio::runtime::Runtime::new().map_err(|e| {
        eprintln!("Error: failed to start runtime: {e}");
        ExitCode::Failure
    })?;

    let out_dir = config.output.dir.clone();
    let snapshot = runtime.block_on(async {
        let service =
            Arc::new(PipelineService::from_config(config).map_err(|e| fail(&e))?);
        let input = RunInput::new(walkthrough, narration);
        let run_id = service.start_run(&input);

        // Ctrl-C requests cooperative cancellation; the run unwinds to
        // Cancelled at the next suspension point.
        let watcher = {
            let service = service.clone();
            let run_id = run_id.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("cancellation requested, unwinding current stage…");
                    service.cancel(&run_id);
                }
            })
        };

        let result = service.run_to_completion(&input).await.map_err(|e| fail(&e));
        watcher.abort();
        result
    })?;

    write_outputs(&out_dir, &snapshot).map_err(|e| fail(&e))?;

    if json {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(body) => println!("{body}"),
            Err(e) => eprintln!("Error: failed to encode snapshot: {e}"),
        }
    } else {
        print_summary(&snapshot, &out_dir);
    }

    match snapshot.status {
        RunStatus::Succeeded => Ok(()),
        RunStatus::Cancelled => Err(ExitCode::Cancelled),
        _ => {
            if let Some(reason) = &snapshot.failure_reason {
                eprintln!("Run failed: {reason}");
            }
            Err(ExitCode::RunFailed)
        }
    }
}

fn write_outputs(out_dir: &Path, run: &PipelineRun) -> Result<(), ReelforgeError> {
    if let Some(artifact) = run.current_artifact() {
        write_file_atomic(&out_dir.join("structure.html"), artifact.structure.as_bytes())?;
        write_file_atomic(&out_dir.join("styling.css"), artifact.styling.as_bytes())?;
        write_file_atomic(&out_dir.join("behavior.js"), artifact.behavior.as_bytes())?;
    }

    let report = RunReport::from_run(run);
    let body = serde_json::to_vec_pretty(&report)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    write_file_atomic(&out_dir.join(REPORT_FILE), &body)?;
    Ok(())
}

fn print_summary(run: &PipelineRun, out_dir: &Path) {
    println!("run {}: {:?}", run.id, run.status);
    for outcome in &run.stages {
        println!(
            "  {} … {:?} ({} ms)",
            outcome.stage, outcome.status, outcome.duration_ms
        );
        for warning in &outcome.warnings {
            println!("    warning: {warning}");
        }
    }
    if run.iterations > 0 {
        println!("  refinement passes: {}", run.iterations);
    }
    if let Some(artifact) = run.current_artifact() {
        println!("  bundle v{} written to {}", artifact.version, out_dir.display());
    }
    if run.unresolved_findings {
        println!("  note: completed with unresolved findings (see report.json)");
    }
    if run.degraded_confidence {
        println!("  note: validation harness unavailable; bundle shipped unvalidated");
    }
}

fn status(out: Option<&Path>, overrides: &CliOverrides, json: bool) -> Result<(), ExitCode> {
    let config = Config::discover(overrides).map_err(|e| fail(&e.into()))?;
    let dir = out.unwrap_or(&config.output.dir);
    let path = dir.join(REPORT_FILE);

    let raw = std::fs::read_to_string(&path).map_err(|e| {
        eprintln!("Error: cannot read '{}': {e}", path.display());
        ExitCode::Failure
    })?;

    if json {
        println!("{}", raw.trim_end());
        return Ok(());
    }

    let report: RunReport = serde_json::from_str(&raw).map_err(|e| {
        eprintln!("Error: malformed report '{}': {e}", path.display());
        ExitCode::Failure
    })?;

    println!("run {}: {:?}", report.id, report.status);
    println!(
        "  iterations: {} · unresolved findings: {} · degraded confidence: {}",
        report.iterations, report.unresolved_findings, report.degraded_confidence
    );
    if let Some(reason) = &report.failure_reason {
        println!("  failure: {reason}");
    }
    for stage in &report.stages {
        println!("  {} … {:?}", stage.stage, stage.status);
        for task in &stage.tasks {
            match (&task.tier, &task.error) {
                (Some(tier), _) => println!("    {} · {} ({})", task.name, task.state, tier),
                (None, Some(error)) => println!("    {} · {} — {}", task.name, task.state, error),
                (None, None) => println!("    {} · {}", task.name, task.state),
            }
        }
    }
    Ok(())
}

// src/lib.rs

pub mod abundance;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod report;
pub mod resolve;
pub mod samples;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::catalog::{builtin_catalog, StageCatalog};
use crate::cli::{CliArgs, CliCommand};
use crate::config::{load_and_validate, PipelineConfig};
use crate::dag::{is_fresh, FailurePolicy, PipelineGraph, Scheduler};
use crate::engine::{Runtime, RuntimeEvent};
use crate::errors::{PipelineError, Result};
use crate::exec::RealExecutorBackend;
use crate::fs::{FileSystem, RealFileSystem};

/// High-level entry point used by `main.rs`.
///
/// Returns the process exit code: 0 on full success, 1 when at least one
/// target failed during execution. Graph-build failures come back as `Err`
/// and are mapped to exit code 2 by `main`.
pub async fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        CliCommand::Run {
            ref targets,
            ref samples,
            jobs,
            dry_run,
            stop_on_error,
        } => {
            let cfg = load_and_validate(&args.config)?;
            run_pipeline(&cfg, targets, samples, jobs, dry_run, stop_on_error).await
        }
        CliCommand::Abundance {
            ref counts,
            total,
            ref sample,
        } => {
            let records = abundance::load_records(counts)?;
            let bins = abundance::compute_abundance(sample, &records, total)?;
            println!("# bin_id\traw\tnormalized");
            for bin in bins {
                println!("{}\t{:.6}\t{:.6}", bin.bin_id, bin.raw, bin.normalized);
            }
            Ok(0)
        }
        CliCommand::Stages => {
            print_stages(&builtin_catalog());
            Ok(0)
        }
    }
}

async fn run_pipeline(
    cfg: &PipelineConfig,
    targets: &[String],
    sample_subset: &[String],
    jobs: u32,
    dry_run: bool,
    stop_on_error: bool,
) -> Result<i32> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let catalog = builtin_catalog();

    let samples = select_samples(&*fs, cfg, sample_subset)?;
    let graph = PipelineGraph::build(&catalog, &samples, targets, cfg, &*fs)?;

    if dry_run {
        print_dry_run(&graph, &*fs);
        return Ok(0);
    }

    let policy = if stop_on_error {
        FailurePolicy::StopOnError
    } else {
        FailurePolicy::KeepGoing
    };
    let scheduler = Scheduler::new(graph, catalog, jobs, policy);

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    // Process executor backend (real implementation in production).
    let executor = RealExecutorBackend::new(rt_tx.clone(), Arc::new(cfg.clone()));

    // Ctrl-C → graceful shutdown: stop dispatching, let running nodes finish.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let runtime = Runtime::new(scheduler, rt_rx, executor, fs);
    let report = runtime.run().await?;

    println!("{report}");

    if report.failed {
        for failure in report.failures() {
            tracing::error!("{failure}");
        }
        info!("run finished with failures");
        Ok(1)
    } else {
        info!("run finished successfully");
        Ok(0)
    }
}

/// Discover samples and apply the optional `--samples` restriction.
fn select_samples(
    fs: &dyn FileSystem,
    cfg: &PipelineConfig,
    subset: &[String],
) -> Result<Vec<String>> {
    let discovered = samples::discover_samples(fs, cfg)?;
    if subset.is_empty() {
        return Ok(discovered);
    }

    for id in subset {
        if !discovered.contains(id) {
            return Err(PipelineError::Config(format!(
                "sample '{id}' was not discovered under the data folder"
            )));
        }
    }

    let mut selected: Vec<String> = subset.to_vec();
    selected.sort();
    selected.dedup();
    debug!(total = discovered.len(), selected = selected.len(), "sample subset applied");
    Ok(selected)
}

/// Dry-run output: the deterministic plan order with up-to-date markers.
fn print_dry_run(graph: &PipelineGraph, fs: &dyn FileSystem) {
    println!("magpipe dry-run: {} node(s)", graph.len());

    for (pos, id) in graph.plan_order().into_iter().enumerate() {
        let node = graph.node(id);
        let action = if is_fresh(node, fs) {
            "skip (outputs up to date)"
        } else {
            "run"
        };
        let marker = if node.is_target { " [target]" } else { "" };
        println!(
            "  {:>3}. {:<30} cost={:<3} {}{}",
            pos + 1,
            node.label(),
            node.cost,
            action,
            marker
        );
    }
}

/// `stages` output: the catalog with priorities, costs and templates.
fn print_stages(catalog: &StageCatalog) {
    println!("stages ({}):", catalog.stages().len());
    for stage in catalog.stages() {
        println!("  - {}", stage.name);
        println!("      default cost: {}", stage.default_cost);
        for input in &stage.inputs {
            println!("      input:  {input}");
        }
        for output in &stage.outputs {
            println!("      output: {output}");
        }
    }
}

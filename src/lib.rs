// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod editor;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pass;
pub mod progress;
pub mod sim;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;
use crate::dag::{GraphBuilder, PassGraph, PassIdGenerator};
use crate::exec::{ExecutorOptions, PassExecutor, RoundHandle, UiExecutor};
use crate::progress::{ProgressToken, RoundState};
use crate::sim::Scenario;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the simulated host and its editors
/// - a runtime whose blocking pool is the pass worker pool
/// - the UI executor
/// - Ctrl-C handling
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = args
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .max_blocking_threads(cfg.scheduler.worker_threads)
        .thread_name("passdag-worker")
        .enable_all()
        .build()?;

    runtime.block_on(run_round(&cfg, args.cancel_after_ms))
}

async fn run_round(cfg: &ConfigFile, cancel_after_ms: Option<u64>) -> Result<()> {
    let scenario = Scenario::from_config(cfg);
    let ui = UiExecutor::spawn(&cfg.scheduler.ui_thread_name)?;
    let queue = ui.queue();

    let executor = PassExecutor::new(
        scenario.host.clone(),
        Arc::new(queue.clone()),
        Handle::current(),
        ExecutorOptions::from(&cfg.scheduler),
    );

    let progress = ProgressToken::new();
    let round = executor.submit_passes(scenario.batch(), progress.clone())?;
    info!(
        progress = progress.id(),
        passes = round.graph().len(),
        "round submitted"
    );

    if let Some(ms) = cancel_after_ms {
        let token = progress.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            info!(after_ms = ms, "canceling round on request");
            token.cancel();
        });
    }

    let state = tokio::select! {
        state = round.finished() => state,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            info!("Ctrl+C received; canceling round");
            progress.cancel();
            round.finished().await
        }
    };

    executor.dispose().await;
    tokio::task::spawn_blocking(move || ui.shutdown()).await?;

    print_report(&scenario, &round, state, queue.uncaught_errors());

    if let Some(err) = progress.saved_error() {
        bail!("round failed: {err:#}");
    }
    Ok(())
}

/// Build the round's graph without running it.
fn dry_run_graph(cfg: &ConfigFile) -> (Scenario, PassGraph) {
    let scenario = Scenario::from_config(cfg);
    let ids = PassIdGenerator::starting_after(cfg.scheduler.generated_pass_id_base);
    let graph = GraphBuilder::new(scenario.host.as_ref(), &ids).build(scenario.batch());
    (scenario, graph)
}

/// Dry-run output: nodes, predecessor counts and the DOT rendering.
fn print_dry_run(cfg: &ConfigFile) {
    let (scenario, graph) = dry_run_graph(cfg);

    println!("passdag dry-run");
    println!("  scheduler.worker_threads = {}", cfg.scheduler.worker_threads);
    println!("  host.dumb = {}", cfg.host.dumb);
    println!();

    println!("editors ({}):", scenario.editors().count());
    for editor in scenario.editors() {
        let name = scenario.editor_name(editor.id()).unwrap_or("?");
        match editor.document() {
            Some(document) => println!("  - {} ({name}) shows {document}", editor.id()),
            None => println!("  - {} ({name})", editor.id()),
        }
    }
    println!();

    println!("free nodes ({}):", graph.free_nodes().len());
    for &idx in graph.free_nodes() {
        println!("  - {}", graph.node(idx));
    }
    println!("dependent nodes ({}):", graph.dependent_nodes().len());
    for &idx in graph.dependent_nodes() {
        let node = graph.node(idx);
        println!("  - {node} waits on {}", node.predecessor_count());
    }
    println!();

    match graph.check_consistency() {
        Ok(()) => println!("consistency: ok"),
        Err(err) => println!("consistency: {err}"),
    }
    println!();
    print!("{}", graph.to_dot());

    debug!("dry-run complete (no execution)");
}

fn print_report(scenario: &Scenario, round: &RoundHandle, state: RoundState, ui_errors: usize) {
    println!("passdag round {}: {state:?}", round.progress().id());

    let applied = scenario.journal.applied();
    println!("applied ({}):", applied.len());
    for (editor, pass) in applied {
        let name = scenario.editor_name(editor).unwrap_or("?");
        println!("  - {editor} ({name}) {pass}");
    }

    let marks = scenario.host.up_to_date_marks();
    println!("up to date ({}):", marks.len());
    for (document, pass) in marks {
        println!("  - {document} {pass}");
    }

    if round.remaining() > 0 {
        println!("not applied: {}", round.remaining());
    }
    if ui_errors > 0 {
        println!("uncaught ui errors: {ui_errors}");
    }
    if let Some(err) = round.progress().saved_error() {
        println!("error: {err:#}");
    }
}

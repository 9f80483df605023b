//! AutoApply - automated job application pipeline.
//!
//! Main entry point for the AutoApply CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use autoapply_browser::{BrowserPool, ChromeLauncher};
use autoapply_config::{Config, ConfigLoader};
use autoapply_pipeline::engine::FormFillingEngine;
use autoapply_pipeline::sites::{SiteHandler, SiteRegistry};
use autoapply_pipeline::{
    ApplicationFingerprint, ApplicationTask, EvidenceCapture, MemoryApplicationStore,
    MemoryObjectStore, TaskPipeline, TaskResult, TaskStatus,
};

/// AutoApply CLI.
#[derive(Parser)]
#[command(name = "autoapply")]
#[command(about = "Automated job application pipeline")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a batch of application tasks
    Run {
        /// JSON file holding an array of tasks
        #[arg(long)]
        tasks: PathBuf,

        /// Fill forms but stop before the final submit click
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how a job URL would be handled, without opening a browser
    Resolve {
        /// Job posting URL
        url: String,

        /// User the duplicate fingerprint is computed for
        #[arg(long, default_value = "local")]
        user: String,
    },
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run { tasks, dry_run } => run_batch(config, &tasks, dry_run).await,
        Commands::Resolve { url, user } => resolve(&url, &user),
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        let config = ConfigLoader::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    } else {
        info!(
            "No config file at {}, using built-in defaults",
            path.display()
        );
        Ok(Config::default())
    }
}

/// Run every task in the batch and print a per-task report.
async fn run_batch(mut config: Config, tasks_path: &Path, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        config.pipeline.submit = false;
    }

    let raw = std::fs::read_to_string(tasks_path)
        .with_context(|| format!("failed to read task file {}", tasks_path.display()))?;
    let tasks: Vec<ApplicationTask> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse task file {}", tasks_path.display()))?;

    if tasks.is_empty() {
        info!("Task file is empty, nothing to do");
        return Ok(());
    }

    info!(
        "Starting AutoApply v{}: {} task(s), {} browser session(s) max, submit={}",
        env!("CARGO_PKG_VERSION"),
        tasks.len(),
        config.pool.max_sessions,
        config.pipeline.submit
    );

    let launcher = ChromeLauncher::new(config.browser.clone());
    let pool = BrowserPool::new(config.pool.clone(), launcher);

    let cancel = CancellationToken::new();
    let reaper = pool.spawn_reaper(cancel.clone());

    let store = MemoryApplicationStore::new();
    let objects = MemoryObjectStore::new();
    let engine = FormFillingEngine::new(config.engine.clone(), EvidenceCapture::new(objects));
    let pipeline = Arc::new(TaskPipeline::new(
        pool.clone(),
        SiteRegistry::new(),
        store,
        engine,
        config.pipeline.clone(),
    ));

    // Ctrl-C cancels at the next step boundary of every running task.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling remaining work");
                cancel.cancel();
            }
        });
    }

    let mut handles = Vec::new();
    for task in tasks {
        let pipeline = pipeline.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(
            async move { pipeline.process(task, cancel).await },
        ));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.context("task worker panicked")?);
    }

    cancel.cancel();
    let _ = reaper.await;
    pool.shutdown().await;

    report(&results);
    Ok(())
}

fn report(results: &[TaskResult]) {
    let mut completed = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    println!("{:<38} {:<18} OUTCOME", "TASK", "STATUS");
    println!("{}", "-".repeat(80));
    for result in results {
        let status = match result.status {
            TaskStatus::Completed => {
                completed += 1;
                "completed"
            }
            TaskStatus::SkippedDuplicate => {
                skipped += 1;
                "skipped"
            }
            TaskStatus::Failed => {
                failed += 1;
                "failed"
            }
            TaskStatus::Queued | TaskStatus::Running => "pending",
        };

        let outcome = match &result.failure {
            Some(cause) if result.retry_eligible => format!("{} (retry eligible)", cause.message),
            Some(cause) => cause.message.clone(),
            None => format!("{} evidence shot(s)", result.evidence_urls.len()),
        };
        println!("{:<38} {:<18} {}", result.task_id, status, outcome);
        for url in &result.evidence_urls {
            println!("{:<38}   {}", "", url);
        }
    }

    println!();
    println!(
        "{} completed, {} skipped as duplicate, {} failed",
        completed, skipped, failed
    );
}

/// Resolve a job URL to its site handler and duplicate fingerprint.
fn resolve(url: &str, user: &str) -> anyhow::Result<()> {
    let parsed = Url::parse(url).with_context(|| format!("invalid job url: {}", url))?;
    let registry = SiteRegistry::new();
    let handler = registry.resolve(&parsed);
    let fingerprint = ApplicationFingerprint::new(user, url);

    println!("Site handler:    {}", handler.name());
    println!("Application URL: {}", handler.application_url(&parsed));
    println!("Fingerprint:     {}", fingerprint);

    Ok(())
}

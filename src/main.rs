use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use spacedrep::domain::{PromptState, PromptTaskId};
use spacedrep::id::now_ms;
use spacedrep::queue::{fuzzy_due_threshold, select_due};
use spacedrep::schedule::ScheduleRegistry;
use spacedrep::store::PromptStateStore;
use spacedrep::sync::{JsonlLogSource, sync_from_source};

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

const DAY_MILLIS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spacedrep")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("spacedrep.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn format_days(millis: i64) -> String {
    format!("{:.1}d", millis as f64 / DAY_MILLIS)
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    let registry = ScheduleRegistry::new();
    config.validate(&registry)?;

    if cli.is_verbose() {
        println!("{} {}", "Store:".yellow(), config.store.path.display());
    }

    let store = PromptStateStore::open(&config.store.path).context("Failed to open prompt state store")?;

    let result = match &cli.command {
        Commands::Ingest { file, all } => handle_ingest_command(&store, file, *all, config, &registry).await,
        Commands::Due { at, limit } => handle_due_command(&store, *at, *limit, config).await,
        Commands::Show { task_id } => handle_show_command(&store, task_id).await,
        Commands::Clear => handle_clear_command(&store).await,
    };

    store.close().await.context("Failed to close prompt state store")?;
    result
}

async fn handle_ingest_command(
    store: &PromptStateStore,
    file: &Path,
    all: bool,
    config: &Config,
    registry: &ScheduleRegistry,
) -> Result<()> {
    info!("Ingesting action logs from {} (all: {all})", file.display());
    let policy = config.review_policy(registry)?;
    let mut source = JsonlLogSource::new(file);
    if all {
        source = source.with_full_replay();
    }
    let report = sync_from_source(store, &source, &policy).await?;

    if report.total() == 0 {
        println!("{}", "No new action logs since the last sync.".green());
        return Ok(());
    }
    println!("{} {} action logs", "Applied:".green(), report.applied);
    if report.skipped_duplicates > 0 {
        println!("{} {} already applied", "Skipped:".yellow(), report.skipped_duplicates);
    }
    if report.decode_failures > 0 {
        println!("{} {} with undecodable task IDs", "Rejected:".red(), report.decode_failures);
    }
    Ok(())
}

async fn handle_due_command(store: &PromptStateStore, at: Option<i64>, limit: Option<usize>, config: &Config) -> Result<()> {
    let now = at.unwrap_or_else(now_ms);
    let mut queue_config = config.queue_config();
    if let Some(limit) = limit {
        queue_config.limit = limit;
    }

    let threshold = fuzzy_due_threshold(now, queue_config.fuzzy_window_millis);
    let entries = store.query_due_before(threshold, queue_config.limit).await?;
    let ordered = select_due(entries.iter().map(|(id, state)| (id, state)), now, &queue_config);
    info!("{} tasks due as of {}", ordered.len(), now);

    if ordered.is_empty() {
        println!("{}", "Nothing due.".green());
        return Ok(());
    }

    for task_id in &ordered {
        if let Some((_, state)) = entries.iter().find(|(id, _)| id == task_id) {
            print_due_line(task_id, state, now);
        }
    }
    Ok(())
}

fn print_due_line(task_id: &PromptTaskId, state: &PromptState, now: i64) {
    let due = format_timestamp(state.due_timestamp_millis);
    let due = if state.due_timestamp_millis <= now { due.red() } else { due.yellow() };
    let retry = if state.needs_retry { " retry".magenta().to_string() } else { String::new() };
    println!(
        "{}  {}  {}{}",
        due,
        task_id.as_str().cyan(),
        format_days(state.interval_millis),
        retry
    );
}

async fn handle_show_command(store: &PromptStateStore, task_id: &str) -> Result<()> {
    let task_id = PromptTaskId::from(task_id);
    let task = task_id.decode()?;

    match store.get(&task_id).await? {
        Some(state) => {
            println!("{} {} ({})", "Task:".green(), task_id, task.prompt_type.as_str());
            println!("{} {}", "Due:".green(), format_timestamp(state.due_timestamp_millis));
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        None => println!("{} {}", "Not found:".red(), task_id),
    }
    Ok(())
}

async fn handle_clear_command(store: &PromptStateStore) -> Result<()> {
    store.clear().await?;
    println!("{}", "Cleared all prompt states".green());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging first
    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}

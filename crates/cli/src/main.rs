//! `pulseflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`     — start the API server, event dispatcher and delay recovery.
//! - `migrate`   — run pending database migrations.
//! - `validate`  — validate an exported workflow JSON file.
//! - `templates` — list the built-in template catalog.
//! - `run`       — run a workflow file once against one event, in memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use db::{MemoryStore, PgStore, RunStore, WorkflowStore};
use engine::{
    CategoryFilter, Dispatcher, ExecutorConfig, TemplateRegistry, TriggerEvent, ValidationLimits, WorkflowEngine,
    WorkflowExport, WorkflowManager,
};
use nodes::{LoggingExecutor, RetryPolicy, Retrying};

#[derive(Parser)]
#[command(name = "pulseflow", about = "Event-driven workflow automation engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "PULSEFLOW_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
        /// Postgres URL. Without it everything is kept in memory.
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        #[arg(long, env = "PULSEFLOW_MAX_DELAY_DAYS", default_value_t = 365)]
        max_delay_days: u64,
        #[arg(long, default_value_t = queue::DEFAULT_CAPACITY)]
        queue_capacity: usize,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate an exported workflow JSON file.
    Validate {
        /// Path to a `{ name, nodes, edges }` file.
        path: PathBuf,
        #[arg(long, env = "PULSEFLOW_MAX_DELAY_DAYS", default_value_t = 365)]
        max_delay_days: u64,
    },
    /// List built-in workflow templates.
    Templates {
        #[arg(long)]
        category: Option<String>,
    },
    /// Activate a workflow file in memory and run it against one event.
    Run {
        path: PathBuf,
        /// Event JSON: `{ "triggerType": "...", "payload": { ... } }`.
        #[arg(long)]
        event: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            database_url,
            max_delay_days,
            queue_capacity,
        } => serve(bind, database_url, limits(max_delay_days), queue_capacity).await,
        Command::Migrate { database_url } => {
            info!("Running migrations");
            let pool = db::pool::create_pool(&database_url, 2).await?;
            db::pool::run_migrations(&pool).await?;
            info!("Migrations applied successfully");
            Ok(())
        }
        Command::Validate { path, max_delay_days } => validate(&path, &limits(max_delay_days)),
        Command::Templates { category } => {
            let registry = TemplateRegistry::with_builtins();
            for t in registry.list_by_category(&CategoryFilter::from(category)) {
                println!("{:<24} {:<12} {}", t.id, t.category, t.name);
            }
            Ok(())
        }
        Command::Run { path, event } => run_once(&path, &event).await,
    }
}

fn limits(max_delay_days: u64) -> ValidationLimits {
    ValidationLimits {
        max_delay: Duration::from_secs(max_delay_days.saturating_mul(86_400)),
    }
}

async fn stores(database_url: Option<&str>) -> anyhow::Result<(Arc<dyn WorkflowStore>, Arc<dyn RunStore>)> {
    match database_url {
        Some(url) => {
            let pool = db::pool::create_pool(url, 10).await?;
            let store = Arc::new(PgStore::new(pool));
            let workflows: Arc<dyn WorkflowStore> = store.clone();
            let runs: Arc<dyn RunStore> = store;
            Ok((workflows, runs))
        }
        None => {
            warn!("DATABASE_URL not set; workflows and runs are kept in memory");
            let store = Arc::new(MemoryStore::new());
            let workflows: Arc<dyn WorkflowStore> = store.clone();
            let runs: Arc<dyn RunStore> = store;
            Ok((workflows, runs))
        }
    }
}

async fn serve(
    bind: String,
    database_url: Option<String>,
    limits: ValidationLimits,
    queue_capacity: usize,
) -> anyhow::Result<()> {
    let (workflows, runs) = stores(database_url.as_deref()).await?;

    let actions = Arc::new(Retrying::new(LoggingExecutor::new(), RetryPolicy::default()));
    let config = ExecutorConfig {
        limits: limits.clone(),
        queue_capacity,
    };
    let engine = WorkflowEngine::new(runs, actions, config);
    let manager = WorkflowManager::new(workflows, limits);

    let resumed = engine.resume_pending().await?;
    info!(runs = resumed.len(), "resumed delayed runs");

    let (events, rx) = queue::channel(queue_capacity);
    let shutdown = CancellationToken::new();
    let dispatcher = tokio::spawn(Dispatcher::new(manager.clone(), engine.clone()).run(rx, shutdown.clone()));

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        signal.cancel();
    });

    let state = api::AppState {
        manager,
        templates: Arc::new(TemplateRegistry::with_builtins()),
        engine,
        events,
    };
    let stop = shutdown.clone();
    api::serve(&bind, state, async move { stop.cancelled().await }).await?;

    shutdown.cancel();
    dispatcher.await?;
    Ok(())
}

fn read_export(path: &Path) -> anyhow::Result<WorkflowExport> {
    let content = std::fs::read_to_string(path).with_context(|| format!("cannot read file {}", path.display()))?;
    WorkflowExport::from_json(&content).context("invalid workflow JSON")
}

fn validate(path: &Path, limits: &ValidationLimits) -> anyhow::Result<()> {
    let (name, graph) = read_export(path)?.into_graph();

    match engine::validate_with_limits(&graph, limits).and_then(|()| engine::dag::topological_order(&graph)) {
        Ok(order) => {
            println!("✅ Workflow '{name}' is valid. Execution order: {order:?}");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Validation failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_once(path: &Path, event: &str) -> anyhow::Result<()> {
    let (name, graph) = read_export(path)?.into_graph();
    let event: TriggerEvent = serde_json::from_str(event).context("invalid event JSON")?;

    let store = Arc::new(MemoryStore::new());
    let manager = WorkflowManager::new(store.clone(), ValidationLimits::default());
    let engine = WorkflowEngine::new(store, Arc::new(LoggingExecutor::new()), ExecutorConfig::default());

    let def = manager.create_draft(&name, "", graph).await?;
    manager.activate(def.id).await?;

    let handles = Dispatcher::new(manager, engine).handle(event).await?;
    if handles.is_empty() {
        println!("No trigger in '{name}' matches this event");
    }
    for handle in handles {
        let run = handle.wait().await?;
        println!("{}", serde_json::to_string_pretty(&run)?);
    }
    Ok(())
}

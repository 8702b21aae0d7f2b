mod config;
mod insights_cmd;
mod task_cmds;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use nudge_core::backend::OllamaBackend;
use nudge_core::client::GenerationConfig;
use nudge_core::engine::TaskEngine;
use nudge_core::generator::StepGenerator;
use nudge_core::policy::PolicyConfig;
use nudge_core::store::PgStore;
use nudge_db::config::DbConfig;
use nudge_db::pool;

use config::NudgeConfig;

#[derive(Parser)]
#[command(name = "nudge", about = "Micro-step engine: one ten-second action at a time")]
struct Cli {
    /// Database URL (overrides NUDGE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the config file and initialize the database
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Ollama server base URL
        #[arg(long, default_value = OllamaBackend::DEFAULT_BASE_URL)]
        ollama_url: String,
        /// Model name to request
        #[arg(long, default_value = config::DEFAULT_MODEL)]
        model: String,
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Start a new task and get the first micro-step
    Start {
        /// The goal, in your own words (e.g. "clean my room")
        goal: String,
        /// Energy level: low, medium, or high
        #[arg(long, default_value = "medium")]
        energy: String,
    },
    /// Mark the current step done and get the next one
    Next {
        /// Task ID
        task_id: String,
        /// Seconds the step actually took
        #[arg(long)]
        duration: Option<i32>,
        /// Declare the goal satisfied; completes the task
        #[arg(long)]
        done: bool,
    },
    /// Replace the current step with a smaller one ("too hard")
    Simplify {
        /// Task ID
        task_id: String,
    },
    /// Pause the task, freezing progress for later
    Pause {
        /// Task ID
        task_id: String,
    },
    /// Resume a paused task; returns the last-seen step unchanged
    Resume {
        /// Task ID
        task_id: String,
    },
    /// Show energy efficiency and peak-hour insights
    Insights,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Init {
        db_url,
        ollama_url,
        model,
        force,
    } = &cli.command
    {
        return run_init(db_url, ollama_url, model, *force).await;
    }

    let resolved = NudgeConfig::resolve(cli.database_url.as_deref())?;

    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let store = Arc::new(PgStore::new(db_pool));

    let backend = Arc::new(OllamaBackend::new(&resolved.ollama_url, &resolved.model));
    let generator = StepGenerator::new(backend, PolicyConfig::default(), GenerationConfig::default());
    let engine = TaskEngine::new(store.clone(), generator);

    match &cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Start { goal, energy } => task_cmds::run_start(&engine, goal, energy).await,
        Commands::Next {
            task_id,
            duration,
            done,
        } => task_cmds::run_next(&engine, store.as_ref(), task_id, *duration, *done).await,
        Commands::Simplify { task_id } => {
            task_cmds::run_simplify(&engine, store.as_ref(), task_id).await
        }
        Commands::Pause { task_id } => task_cmds::run_pause(&engine, task_id).await,
        Commands::Resume { task_id } => task_cmds::run_resume(&engine, task_id).await,
        Commands::Insights => insights_cmd::run_insights(store.as_ref()).await,
    }
}

/// Write the config file, create the database if needed, run migrations.
async fn run_init(db_url: &str, ollama_url: &str, model: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let file = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_owned(),
        },
        backend: config::BackendSection {
            ollama_url: ollama_url.to_owned(),
            model: model.to_owned(),
        },
    };
    config::save_config(&file).context("failed to write config file")?;
    println!("Wrote {}", path.display());

    let db_config = DbConfig::new(db_url);
    pool::ensure_database_exists(&db_config).await?;
    let db_pool = pool::create_pool(&db_config).await?;
    pool::run_migrations(&db_pool).await?;
    println!("Database ready at {db_url}");

    Ok(())
}

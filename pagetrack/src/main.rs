//! pagetrack - page event tracking agent and ingestion endpoint
//!
//! This tool provides commands for:
//! - Running the ingestion endpoint backed by SQLite
//! - Sending events through the tracking agent
//! - Replaying a queue of calls recorded before the agent loaded
//! - Checking configuration and storage status
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/pagetrack/events.db (~/.local/share/pagetrack/events.db)
//! - Config: $XDG_CONFIG_HOME/pagetrack/config.toml (~/.config/pagetrack/config.toml)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pagetrack_core::logging::{self, LogOutput};
use pagetrack_core::server::IngestServer;
use pagetrack_core::{Config, Database, EventTracker, LifecycleSignal, PageContext, PendingCall};

/// How long a detached exit beacon gets before the process exits
const BEACON_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "pagetrack")]
#[command(about = "Page event tracking agent and ingestion endpoint")]
#[command(version)]
struct Args {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ingestion endpoint
    Serve {
        /// Address to listen on (default: from config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Track a single event, then flush on exit
    Track {
        /// Event name
        event: String,

        /// Event tags
        tags: Vec<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Replay a JSON queue of track calls, e.g. [["click", "nav"], ["view"]]
    Replay {
        /// Path to the queue file
        file: PathBuf,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Show configuration and stored event count
    Status,
}

#[derive(clap::Args)]
struct PageArgs {
    /// Page URL attached to the events
    #[arg(long, default_value = "http://localhost:8080/1.html")]
    url: String,

    /// Page title attached to the events
    #[arg(long, default_value = "")]
    title: String,

    /// Max milliseconds to wait for an in-flight send before the exit flush
    #[arg(long, default_value_t = 2000)]
    linger_ms: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // The server always logs; agent commands only when verbose
    let serving = matches!(args.command, Command::Serve { .. });
    let output = if serving {
        LogOutput::FileAndStderr
    } else {
        LogOutput::File
    };
    let _log_guard = if serving || args.verbose {
        Some(logging::init(&config.logging, output).context("failed to initialize logging")?)
    } else {
        None
    };

    match args.command {
        Command::Serve { bind } => cmd_serve(config, bind),
        Command::Track { event, tags, page } => {
            cmd_agent(&config, page, vec![PendingCall::new(event, tags)])
        }
        Command::Replay { file, page } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read queue file {}", file.display()))?;
            let pending: Vec<PendingCall> = serde_json::from_str(&content)
                .with_context(|| format!("invalid queue file {}", file.display()))?;
            cmd_agent(&config, page, pending)
        }
        Command::Status => cmd_status(&config),
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create runtime")
}

fn cmd_serve(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    let db_path = config.database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let runtime = build_runtime()?;
    runtime.block_on(async {
        let server = IngestServer::new(config.server.clone(), Arc::new(db));
        server
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                }
            })
            .await
            .context("ingestion endpoint failed")
    })
}

fn cmd_agent(config: &Config, page: PageArgs, pending: Vec<PendingCall>) -> Result<()> {
    let calls = pending.len();
    let context = PageContext::new(page.url, page.title);
    let linger = Duration::from_millis(page.linger_ms);

    let runtime = build_runtime()?;
    let stats = runtime.block_on(async {
        let tracker = EventTracker::connect(&config.tracker, context, pending)
            .context("failed to start tracker")?;

        // A payload waiting on its retry delay is carried by the exit beacon
        let deadline = tokio::time::Instant::now() + linger;
        while tracker.controller().is_sending() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        if tracker.on_lifecycle(LifecycleSignal::Unload) {
            tokio::time::sleep(BEACON_GRACE).await;
        }

        Ok::<_, anyhow::Error>(tracker.controller().stats())
    })?;

    println!("Tracked {} event(s) to {}", calls, config.tracker.endpoint);
    println!(
        "  sent: {} in {} request(s), {} failed",
        stats.events_sent, stats.attempts, stats.failures
    );
    println!("  exit beacon: {} event(s)", stats.events_beaconed);

    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("pagetrack Configuration");
    println!("=======================");
    println!();
    println!("Config file:     {}", Config::config_path().display());
    println!();
    println!("[tracker]");
    println!("Endpoint:        {}", config.tracker.endpoint);
    println!("Batch size:      {}", config.tracker.batch_size);
    println!("Cool-down:       {} ms", config.tracker.cooldown_ms);
    println!("Retry delay:     {} ms", config.tracker.retry_delay_ms);
    println!("Timeout:         {} s", config.tracker.timeout_secs);
    println!();
    println!("[server]");
    println!("Bind:            {}", config.server.bind);
    println!("Allowed origin:  {}", config.server.allowed_origin);
    println!();

    println!("Logs:            {}", logging::log_dir().display());

    let db_path = config.database_path();
    println!("Database:        {}", db_path.display());
    if !db_path.exists() {
        println!("Stored events:   (no database yet)");
        return Ok(());
    }

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    println!("Stored events:   {}", db.count_events()?);

    Ok(())
}

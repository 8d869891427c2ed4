//! CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::{load_settings, Settings, DEFAULT_CONFIG_FILE};
use crate::notify::{HttpDispatcher, LogDispatcher, NotificationDispatcher};
use crate::pipeline::{run_scheduled, IngestService};
use crate::repository::{NotificationRepository, PlanRepository};
use crate::scrapers::HttpClient;

#[derive(Parser)]
#[command(name = "vplan")]
#[command(about = "Substitution-plan ingestion and notification service")]
#[command(version)]
pub struct Cli {
    /// Settings file (default: vplan.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default settings file and create the database schema
    Init,

    /// Run one ingestion cycle
    Ingest,

    /// Run ingestion on a fixed interval
    Watch {
        /// Override the configured interval (seconds)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Show per-date entry counts and registered clients
    Status,

    /// Manage notification tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Register a token with its priority topics (replaces existing topics)
    Register {
        token: String,
        /// Topic strings, e.g. substitute.timetable.1.2.9a
        topics: Vec<String>,
    },

    /// List registered tokens and their topics
    List,

    /// Remove a token (its topics go with it)
    Remove { token: String },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => init(&settings, cli.config.as_deref()),
        Commands::Ingest => {
            let service = build_service(&settings)?;
            match service.run_once().await? {
                Some(summary) => {
                    println!(
                        "{} week(s): {} parsed, {} changed, {} removed, {} notified",
                        summary.weeks,
                        summary.parsed_entries,
                        summary.changed,
                        summary.removed,
                        summary.notified_tokens
                    );
                }
                None => println!("skipped: a run is already in progress"),
            }
            Ok(())
        }
        Commands::Watch { interval } => {
            let service = Arc::new(build_service(&settings)?);
            let period = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| settings.interval());
            run_scheduled(service, period).await;
            Ok(())
        }
        Commands::Status => status(&settings),
        Commands::Token { command } => token_command(&settings, command),
    }
}

fn init(settings: &Settings, config_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if !path.exists() {
        settings.write_to(&path)?;
        println!("wrote {}", path.display());
    }
    PlanRepository::new(&settings.database.path).context("creating plan store")?;
    NotificationRepository::new(&settings.database.path).context("creating token store")?;
    println!("database ready at {}", settings.database.path.display());
    Ok(())
}

fn status(settings: &Settings) -> anyhow::Result<()> {
    let plan = PlanRepository::new(&settings.database.path)?;
    let notifications = NotificationRepository::new(&settings.database.path)?;

    let counts = plan.dates_with_counts()?;
    if counts.is_empty() {
        println!("no stored entries");
    }
    for (date, count) in counts {
        println!("{date}: {count} entries");
    }
    println!("{} registered token(s)", notifications.registrations()?.len());
    Ok(())
}

fn token_command(settings: &Settings, command: TokenCommands) -> anyhow::Result<()> {
    let repo = NotificationRepository::new(&settings.database.path)?;
    match command {
        TokenCommands::Register { token, topics } => {
            repo.register(&token, &topics)?;
            println!("registered {} with {} topic(s)", token, topics.len());
        }
        TokenCommands::List => {
            for registration in repo.registrations()? {
                println!("{}", registration.token);
                for topic in registration.topics {
                    println!("  {topic}");
                }
            }
        }
        TokenCommands::Remove { token } => {
            if repo.remove_token(&token)? {
                println!("removed {token}");
            } else {
                println!("unknown token {token}");
            }
        }
    }
    Ok(())
}

fn build_service(settings: &Settings) -> anyhow::Result<IngestService> {
    let client = HttpClient::new(settings.http_timeout()).context("creating HTTP client")?;
    let plan = Arc::new(PlanRepository::new(&settings.database.path)?);
    let notifications = Arc::new(NotificationRepository::new(&settings.database.path)?);

    let dispatcher: Arc<dyn NotificationDispatcher> = match &settings.dispatch.endpoint {
        Some(endpoint) => Arc::new(
            HttpDispatcher::new(
                endpoint.clone(),
                settings.dispatch.api_key.clone(),
                settings.http_timeout(),
            )
            .context("creating dispatch client")?,
        ),
        None => Arc::new(LogDispatcher),
    };

    Ok(IngestService::new(
        settings.clone(),
        Arc::new(client),
        plan,
        notifications,
        dispatcher,
    ))
}

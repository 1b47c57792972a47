//! Compliance Tracker CLI
//!
//! Rolling-window engagement compliance for research studies.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use compliance_tracker::{
    activity::{ActivityStore, SqliteActivityStore},
    config::{Config, StudySettings},
    core::{ComplianceError, WindowSummaryEngine},
    report::{self, NO_DATA_MESSAGE},
    VERSION,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "compliance-tracker")]
#[command(version = VERSION)]
#[command(about = "Rolling-window engagement compliance for research studies", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "COMPLIANCE_CONFIG")]
    config: Option<PathBuf>,

    /// Activity database, overriding the configured path
    #[arg(long, global = true, env = "COMPLIANCE_DB_PATH")]
    database: Option<PathBuf>,

    /// IANA timezone, overriding the configured one
    #[arg(long, global = true, env = "COMPLIANCE_TZ")]
    tz: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the rolling window summary for one participant
    Summary {
        /// Participant identifier
        #[arg(long)]
        participant: String,

        /// Study label from the configured requirements
        #[arg(long)]
        study: Option<String>,

        /// Evaluate as of this RFC 3339 instant instead of now
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show per-day activity over a date range
    Breakdown {
        /// Participant identifier
        #[arg(long)]
        participant: String,

        /// First study day (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last study day (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Study label from the configured requirements
        #[arg(long)]
        study: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Summarize every participant found in the activity database
    Aggregate {
        /// Study label from the configured requirements
        #[arg(long)]
        study: Option<String>,
    },

    /// Check configuration, database access and participant activity
    Validate {
        /// Participants expected to have activity
        #[arg(long = "participant")]
        participants: Vec<String>,
    },

    /// Show configuration
    Config,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("compliance_tracker=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let mut config = Config::load_from(&config_path)
        .with_context(|| format!("loading configuration from {config_path:?}"))?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if let Some(tz) = cli.tz {
        config.timezone = tz;
    }

    match cli.command {
        Commands::Summary {
            participant,
            study,
            now,
            json,
        } => cmd_summary(&config, &participant, study.as_deref(), now, json),
        Commands::Breakdown {
            participant,
            from,
            to,
            study,
            json,
        } => cmd_breakdown(&config, &participant, from, to, study.as_deref(), json),
        Commands::Aggregate { study } => cmd_aggregate(&config, study.as_deref()),
        Commands::Validate { participants } => cmd_validate(&config, &participants),
        Commands::Config => cmd_config(&config, &config_path),
    }
}

fn resolve_settings(config: &Config, study: Option<&str>) -> Result<StudySettings> {
    config
        .study_settings(study)
        .context("resolving study settings")
}

fn open_store(path: &Path) -> Result<SqliteActivityStore> {
    if !path.exists() {
        bail!("activity database not found at {path:?}");
    }
    SqliteActivityStore::open_read_only(path)
        .with_context(|| format!("opening activity database {path:?}"))
}

fn cmd_summary(
    config: &Config,
    participant: &str,
    study: Option<&str>,
    now: Option<DateTime<Utc>>,
    json: bool,
) -> Result<()> {
    let engine = WindowSummaryEngine::new(resolve_settings(config, study)?);
    let store = open_store(&config.database_path)?;

    match engine.compute_window_summary(&store, participant, now)? {
        Some(summary) if json => println!("{}", serde_json::to_string_pretty(&summary)?),
        Some(summary) => print!("{}", report::render_progress(&summary)),
        None => println!("{participant}: {NO_DATA_MESSAGE}"),
    }
    Ok(())
}

fn cmd_breakdown(
    config: &Config,
    participant: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    study: Option<&str>,
    json: bool,
) -> Result<()> {
    let engine = WindowSummaryEngine::new(resolve_settings(config, study)?);
    let store = open_store(&config.database_path)?;

    let snapshots = match engine.daily_breakdown(&store, participant, from, to, None) {
        Err(ComplianceError::InvalidRange { start, end }) => {
            bail!("--from ({start}) must be on or before --to ({end})")
        }
        other => other?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
    } else {
        print!("{}", report::render_days(&snapshots));
    }
    Ok(())
}

fn cmd_aggregate(config: &Config, study: Option<&str>) -> Result<()> {
    let engine = WindowSummaryEngine::new(resolve_settings(config, study)?);
    let store = open_store(&config.database_path)?;

    let participants = store.participants()?;
    if participants.is_empty() {
        println!("No participants found in the activity database.");
        return Ok(());
    }

    println!("Participant progress snapshot:");
    let mut summarized = 0usize;
    for participant in &participants {
        match engine.compute_window_summary(&store, participant, None)? {
            Some(summary) => {
                summarized += 1;
                println!("- {}", report::status_line(&summary));
            }
            None => println!("- {participant}: no activity recorded in the window"),
        }
    }

    tracing::info!(
        participants = participants.len(),
        summarized,
        "aggregate complete"
    );
    Ok(())
}

fn cmd_validate(config: &Config, participants: &[String]) -> Result<()> {
    config.validate().context("configuration is invalid")?;
    println!("Configuration: OK");

    let store = open_store(&config.database_path)?;
    let known = store.participants()?;
    println!("Activity database: OK ({} participants)", known.len());

    let mut missing = Vec::new();
    for participant in participants {
        if !store.has_activity(participant)? {
            missing.push(participant.as_str());
        }
    }

    if !missing.is_empty() {
        println!("Participants without activity: {}", missing.len());
        for participant in &missing {
            println!("  - {participant}");
        }
        bail!("{} participant(s) have no recorded activity", missing.len());
    }

    if !participants.is_empty() {
        println!("All {} participant(s) have activity.", participants.len());
    }
    Ok(())
}

fn cmd_config(config: &Config, config_path: &Path) -> Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {config_path:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

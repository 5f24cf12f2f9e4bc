//! Portal command-line entry point.
//!
//! # Responsibility
//! - Seed the local document store from JSON fixtures.
//! - Render profile and roster projections as JSON for inspection.

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use portal_core::{
    init_logging, PortalConfig, ProfileAggregator, ProfileState, RosterAggregator, RosterMode,
    RosterStatus, SearchQuery, SqliteDocumentStore, StaticAuth,
};
use serde_json::{json, Value};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "College portal data core CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load `{ "<collection>": { "<id>": { ... } } }` into the local store.
    Import { fixture: PathBuf },
    /// Print one student profile as the viewer would see it.
    Profile {
        student_id: String,
        #[arg(long)]
        viewer: String,
    },
    /// Print the verified roster of the viewer's college.
    Roster {
        #[arg(long)]
        viewer: String,
        #[arg(long, value_enum, default_value_t = ModeCli::Flat)]
        mode: ModeCli,
        /// Print autocomplete suggestions instead of the roster.
        #[arg(long)]
        search: Option<String>,
    },
    Version,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeCli {
    Flat,
    Scholarship,
}

impl From<ModeCli> for RosterMode {
    fn from(value: ModeCli) -> Self {
        match value {
            ModeCli::Flat => RosterMode::Flat,
            ModeCli::Scholarship => RosterMode::ByScholarship,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("portal: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Commands::Version = cli.command {
        println!("portal_core version={}", portal_core::core_version());
        return Ok(());
    }

    let config = PortalConfig::from_env()?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(config.log_level, log_dir)?;
    }
    let store = Arc::new(SqliteDocumentStore::open(&config.db_path)?);

    match cli.command {
        Commands::Import { fixture } => {
            let text = std::fs::read_to_string(&fixture)?;
            let written = store.import(&serde_json::from_str(&text)?)?;
            info!("event=cli_import module=cli status=ok documents={written}");
            println!("imported {written} documents");
        }
        Commands::Profile { student_id, viewer } => {
            let aggregator = ProfileAggregator::new(
                store,
                StaticAuth::signed_in(viewer),
                config.profile_options(),
            );
            print_json(&profile_json(aggregator.load(&student_id).await)?)?;
        }
        Commands::Roster {
            viewer,
            mode,
            search,
        } => {
            let aggregator = RosterAggregator::new(store, StaticAuth::signed_in(viewer));
            let mut session = aggregator.open().await;
            if let RosterStatus::Failed(err) = session.status() {
                return Err(err.clone().into());
            }
            let output = match search {
                Some(text) => serde_json::to_value(session.search(&SearchQuery::new(text)))?,
                None => serde_json::to_value(session.view(mode.into()))?,
            };
            session.close();
            print_json(&output)?;
        }
        Commands::Version => {}
    }
    Ok(())
}

fn profile_json(state: ProfileState) -> Result<Value, Box<dyn Error>> {
    Ok(match state {
        ProfileState::Ready(view) => json!({ "state": "ready", "profile": view }),
        ProfileState::Loading(pending) => json!({
            "state": "loading",
            "missing": pending.missing(),
            "timed_out": pending.timed_out,
        }),
        ProfileState::AwaitingAuth => json!({ "state": "awaiting_auth" }),
        ProfileState::Failed(err) => return Err(err.into()),
    })
}

fn print_json(value: &Value) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

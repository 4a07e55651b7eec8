use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use wicketd::{Config, DurableBackend, EncodingRepository, SqliteBackend};

#[derive(Parser)]
#[command(name = "wicket", about = "Wicket access-control operator tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show reference-set and store status
    Status,
    /// Show recent audit events, newest first
    Logs {
        /// Maximum number of events to show
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
        /// Only events mentioning this person
        #[arg(short, long)]
        person: Option<String>,
    },
    /// Remove every stored encoding for a person
    Remove {
        /// Person name (identity key)
        name: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let backend: Arc<dyn DurableBackend> = Arc::new(SqliteBackend::open(&config.db_path)?);

    match cli.command {
        Commands::Status => {
            let repository =
                EncodingRepository::new(Arc::clone(&backend), config.snapshot_path.clone());
            let loaded = repository.load();
            let set = repository.reference_set();
            println!(
                "{}",
                serde_json::json!({
                    "db_path": config.db_path.display().to_string(),
                    "snapshot_path": config.snapshot_path.display().to_string(),
                    "encodings_loaded": loaded,
                    "known_people": set.person_count(),
                    "total_encodings": set.len(),
                })
            );
        }
        Commands::Logs { limit, person } => {
            let events = backend.list_events(limit, person.as_deref())?;
            if events.is_empty() {
                println!("no audit events");
            }
            for event in events {
                println!(
                    "[{}] {}: {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.kind,
                    event.details
                );
            }
        }
        Commands::Remove { name } => {
            let repository =
                EncodingRepository::new(Arc::clone(&backend), config.snapshot_path.clone());
            repository.load();
            let deleted = repository.remove_person(&name)?;
            println!("removed {deleted} encodings for '{name}'");
        }
    }

    Ok(())
}

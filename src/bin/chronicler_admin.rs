//! chronicler-admin: operator CLI
//!
//! Opens the configured storage and runs one administrative command,
//! printing the result as JSON on stdout. Logs go to stderr.
//!
//! ## Configuration
//! - `--config <path>` or CHRONICLER_CONFIG: YAML config file
//! - CHRONICLER__STORAGE__TYPE, CHRONICLER__STORAGE__SQLITE__PATH, ...: overrides
//! - CHRONICLER_LOG: tracing filter (default: info)

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use chronicler::config::Config;
use chronicler::engine::Chronicle;
use chronicler::fork::ForkRequest;
use chronicler::model::{NewBranch, Page, TimelineKey, Version, WorldTime};
use chronicler::utils::bootstrap::init_tracing;

#[derive(Parser)]
#[command(name = "chronicler-admin", about = "Inspect and manage campaign branches")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the storage schema if missing
    Init,
    /// Create a root branch for a campaign
    CreateBranch {
        campaign: String,
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long, default_value = "admin")]
        actor: String,
    },
    /// Print the branch tree of a campaign
    Hierarchy { campaign: String },
    /// Print the version history of an entity on a branch
    History {
        entity_type: String,
        entity_id: String,
        branch_id: Uuid,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long, default_value = "0")]
        offset: usize,
    },
    /// Fork a branch at a world-time cutoff
    Fork {
        source_branch: Uuid,
        name: String,
        cutoff: i64,
        actor: String,
        #[arg(short, long)]
        description: Option<String>,
    },
}

fn version_json(chronicle: &Chronicle, version: &Version) -> Value {
    let payload = chronicle
        .payload(version)
        .unwrap_or_else(|e| json!({ "error": e.to_string() }));
    json!({
        "id": version.id,
        "version": version.version,
        "valid_from": version.valid_from,
        "valid_to": version.valid_to,
        "comment": version.comment,
        "created_by": version.created_by,
        "created_at": version.created_at,
        "diverged_from_version_id": version.diverged_from_version_id,
        "payload": payload,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::load(cli.config.as_deref())?;
    let chronicle = Chronicle::open(&config).await?;

    let output = match cli.command {
        Commands::Init => {
            info!(storage = ?config.storage.storage_type, "storage initialized");
            json!({ "storage": format!("{:?}", config.storage.storage_type).to_lowercase() })
        }
        Commands::CreateBranch {
            campaign,
            name,
            description,
            actor,
        } => {
            let mut new = NewBranch::root(campaign, name);
            new.description = description;
            serde_json::to_value(chronicle.create_branch(new, &actor).await?)?
        }
        Commands::Hierarchy { campaign } => {
            serde_json::to_value(chronicle.hierarchy(&campaign).await?)?
        }
        Commands::History {
            entity_type,
            entity_id,
            branch_id,
            limit,
            offset,
        } => {
            let key = TimelineKey::new(entity_type, entity_id, branch_id);
            let page = Page { limit, offset };
            let versions = chronicle.history(&key, page).await?;
            Value::Array(versions.iter().map(|v| version_json(&chronicle, v)).collect())
        }
        Commands::Fork {
            source_branch,
            name,
            cutoff,
            actor,
            description,
        } => {
            let mut request = ForkRequest::new(source_branch, name, WorldTime(cutoff), actor);
            request.description = description;
            let outcome = chronicle.fork(request).await?;
            json!({
                "branch": outcome.branch,
                "versions_copied": outcome.versions_copied(),
                "skipped": outcome.skipped,
                "failed": outcome.failed,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

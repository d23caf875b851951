use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use billmap_core::{ClientId, RecordFilter, SiteId};
use billmap_storage::SqliteStore;

mod commands;

#[derive(Parser)]
#[command(name = "billmap", version, about = "Recurring billing import and site mapping")]
struct Cli {
    /// Database file (default: the platform data directory).
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a recurring-transactions CSV export.
    ///
    /// The CSV must contain the columns "Template Name", "Previous date",
    /// "Next Date", "Name" and "Amount". Column order and header casing do
    /// not matter; extra columns are ignored.
    Import {
        /// CSV file to import.
        file: PathBuf,
    },
    /// List billing records with their site mappings.
    Records {
        /// Only records with this client name (exact match).
        #[arg(long)]
        client: Option<String>,
        /// Only records whose mapped site belongs to this client id.
        #[arg(long)]
        client_id: Option<i64>,
        /// Only records mapped to this site id.
        #[arg(long)]
        site_id: Option<i64>,
        /// Only records mapped to a site.
        #[arg(long, conflicts_with = "unmapped")]
        mapped: bool,
        /// Only records without a site mapping.
        #[arg(long)]
        unmapped: bool,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Point a record at a site; site id 0 clears the mapping.
    Map {
        /// Billing record id.
        record_id: i64,
        /// Directory site id, or 0 to unmap.
        site_id: i64,
    },
    /// List directory sites with no billing record mapped to them.
    Missing,
    /// Show when the last import ran and any pending import message.
    Status,
    /// Delete all imported billing records.
    Clear,
    /// Inspect or refresh the mirrored site directory.
    #[command(subcommand)]
    Sites(SitesCommand),
}

#[derive(Subcommand)]
enum SitesCommand {
    /// Replace the mirror from a JSON feed file.
    Sync {
        /// Feed file shaped as `{ "sites": [...], "clients": [...] }`.
        file: PathBuf,
    },
    /// List the mirrored sites.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    let store = SqliteStore::open(&db_path)
        .await
        .with_context(|| format!("opening database {}", db_path.display()))?;

    match cli.command {
        Command::Import { file } => commands::import(&store, &file).await,
        Command::Records {
            client,
            client_id,
            site_id,
            mapped,
            unmapped,
            json,
        } => {
            let filter = RecordFilter {
                client_name: client,
                site_id: site_id.map(SiteId),
                is_mapped: mapped.then_some(true).or(unmapped.then_some(false)),
                client_id: client_id.map(ClientId),
            };
            commands::records(&store, &filter, json).await
        }
        Command::Map { record_id, site_id } => commands::map(&store, record_id, site_id).await,
        Command::Missing => commands::missing(&store).await,
        Command::Status => commands::status(&store).await,
        Command::Clear => commands::clear(&store).await,
        Command::Sites(SitesCommand::Sync { file }) => commands::sites_sync(&store, &file).await,
        Command::Sites(SitesCommand::List) => commands::sites_list(&store).await,
    }
}

fn default_db_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("com", "billmap", "Billmap")
        .context("could not determine a home directory for the data dir")?;
    let data_dir = project_dirs.data_dir();

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;

    Ok(data_dir.join("billmap.db"))
}

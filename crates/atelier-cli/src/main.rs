mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Context;
use atelier_core::Database;
use clap::{Parser, Subcommand};
use cmd::{pattern::PatternSubcommand, work::WorkSubcommand};

#[derive(Parser)]
#[command(
    name = "atelier",
    about = "Guided authoring of skills, agents, and orchestrations",
    version,
    propagate_version = true
)]
struct Cli {
    /// Database file (default: ~/.atelier/atelier.db)
    #[arg(long, global = true, env = "ATELIER_DB")]
    db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage works in progress
    Work {
        #[command(subcommand)]
        subcommand: WorkSubcommand,
    },

    /// Manage the pattern library
    Pattern {
        #[command(subcommand)]
        subcommand: PatternSubcommand,
    },

    /// Run the interactive guided authoring session for a work
    Guide {
        /// Work id
        work_id: i64,

        /// Claude executable to drive (default: `claude` on PATH)
        #[arg(long)]
        claude: Option<String>,

        /// Kill a turn that runs longer than this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Export a work's files and mark it exported
    Export {
        /// Work id
        work_id: i64,

        /// Destination directory (default: ~/.claude/<type>/<name>)
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let home = home::home_dir().context("home directory not found")?;
    Ok(home.join(".atelier").join("atelier.db"))
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<Database> {
    let path = match path {
        Some(p) => p,
        None => default_db_path()?,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Database::open(&path).with_context(|| format!("opening database {}", path.display()))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Guide { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = run(cli).await;
    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let db = open_database(cli.db)?;
    match cli.command {
        Commands::Work { subcommand } => cmd::work::run(&db, subcommand, cli.json),
        Commands::Pattern { subcommand } => cmd::pattern::run(&db, subcommand, cli.json).await,
        Commands::Guide {
            work_id,
            claude,
            timeout,
        } => cmd::guide::run(&db, work_id, claude, timeout).await,
        Commands::Export { work_id, dest } => {
            cmd::export::run(&db, work_id, dest.as_deref(), cli.json)
        }
    }
}

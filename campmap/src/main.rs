//! Point d'entrée CLI pour campmap

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

use campmap::config::Config;

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::{Commands, DatabaseArgs};

/// Back office de la carte du camp: layers, features et import GeoJSON
#[derive(Parser)]
#[command(name = "campmap")]
#[command(author, version)]
#[command(about = "Camp map back office: layers, features and GeoJSON import into PostGIS")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Fichier de configuration JSON (défaut : env CAMPMAP_*)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    database: DatabaseArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let config = Config::resolve(cli.config.as_deref())?;
    debug!(schema = %config.schema, srid = config.srid, camp = ?config.camp, "Configuration loaded");

    cli::run(cli.command, &config, &cli.database).await
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

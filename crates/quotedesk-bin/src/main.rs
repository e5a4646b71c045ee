//! Quotedesk CLI - session management and authorized API calls for the
//! trading dashboard backend.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quotedesk_auth::SessionRuntime;
use quotedesk_core::{init_logging, Config, Paths};
use quotedesk_storage::create_storage;

/// Quotedesk command-line interface.
#[derive(Parser)]
#[command(name = "quotedesk")]
#[command(about = "Quotedesk trading dashboard client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Base directory for config and credentials. Defaults to ~/.quotedesk
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login { email: String, password: String },
    /// Create an account and sign in
    Register {
        email: String,
        password: String,
        /// Public display name
        #[arg(long, default_value = "")]
        display_name: String,
    },
    /// Sign out and clear stored credentials
    Logout,
    /// Show session status
    Status,
    /// Show the signed-in user
    Whoami,
    /// Perform an authorized GET against the API
    Fetch {
        /// Request path, e.g. /portfolio/positions
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level);

    // Load configuration
    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    let storage = create_storage(&paths);
    let runtime = SessionRuntime::new(&config, storage)?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::login(&runtime, &email, &password).await?;
        }
        Commands::Register {
            email,
            password,
            display_name,
        } => {
            commands::register(&runtime, &email, &password, &display_name).await?;
        }
        Commands::Logout => {
            commands::logout(&runtime).await?;
        }
        Commands::Status => {
            commands::status(&runtime).await?;
        }
        Commands::Whoami => {
            commands::whoami(&runtime).await?;
        }
        Commands::Fetch { path } => {
            commands::fetch(&runtime, &path).await?;
        }
    }

    Ok(())
}

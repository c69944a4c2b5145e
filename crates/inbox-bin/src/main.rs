//! Inbox unread count CLI.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use inbox_config_and_utils::{init_logging, Config, Paths};

/// Inbox unread message count command-line interface.
#[derive(Parser)]
#[command(name = "inbox-unread")]
#[command(about = "Track the unread message count of the signed-in inbox user")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and credentials. Defaults to ~/.inbox
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a session credential
    Login {
        /// Principal id the token belongs to
        #[arg(long)]
        user_id: String,

        /// Bearer token for the API and realtime server
        #[arg(long, env = "INBOX_TOKEN")]
        token: String,

        #[arg(long)]
        email: Option<String>,
    },
    /// Remove the stored session credential
    Logout,
    /// Fetch the unread count once and print it
    Count,
    /// Follow the unread count until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match cli.command {
        Commands::Login {
            user_id,
            token,
            email,
        } => commands::login(&paths, &user_id, &token, email.as_deref())?,
        Commands::Logout => commands::logout(&paths)?,
        Commands::Count => commands::count(&config, &paths).await?,
        Commands::Watch => commands::watch(&config, &paths).await?,
    }

    Ok(())
}

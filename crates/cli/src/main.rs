//! Monadic Chat CLI: the main entry point.
//!
//! Commands:
//! - `chat`     Talk to an app, one message or interactively
//! - `apps`     List the configured apps
//! - `config`   Show, locate, or initialize the config file
//! - `doctor`   Diagnose configuration and keys

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "monadic",
    about = "Monadic Chat — streaming chat with function calling",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with an app
    Chat {
        /// App to use (see `monadic apps`)
        #[arg(short, long, default_value = "chat_gemini", env = "MONADIC_APP")]
        app: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Attach an image to the message
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Print every stream event as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// List configured apps
    Apps,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose configuration and keys
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with keys masked
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed replies stay clean on stdout.
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Chat {
            app,
            message,
            image,
            json,
        } => commands::chat::run(&app, message, image, json).await?,
        Commands::Apps => commands::apps::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}

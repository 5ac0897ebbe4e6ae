//! revu - Pull request review bot
//!
//! Receives GitHub App webhooks and answers every newly opened pull request
//! with an agent-written review.

mod commands;
mod logging;
mod server;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use revu_core::{AppIdentity, Config, Secrets};

use commands::{InitSecretsArgs, ServeArgs};

/// revu: automated pull request reviews for a GitHub App
#[derive(Parser, Debug)]
#[command(name = "revu")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.config/revu/config.toml
    #[arg(long, global = true, env = "REVU_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Path of the webhook route (overrides config and env)
    #[arg(long, global = true)]
    webhook_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook server (default)
    #[command(visible_alias = "s")]
    Serve(ServeArgs),

    /// Show current configuration
    Config,

    /// Write a secrets template with restrictive permissions
    InitSecrets(InitSecretsArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config =
        Config::load_with_overrides(cli.config.as_deref(), cli.port, cli.webhook_path.clone())?;

    logging::init(cli.verbose, &config.logging.error_log)?;

    tracing::debug!(
        port = config.server.port,
        webhook_path = %config.server.webhook_path,
        error_log = %config.logging.error_log.display(),
        "Configuration loaded"
    );

    match cli.command {
        None => ServeArgs::default().execute(&config).await?,
        Some(Commands::Serve(args)) => args.execute(&config).await?,
        Some(Commands::Config) => print_config(&config, cli.config.as_deref()),
        Some(Commands::InitSecrets(args)) => args.execute()?,
        Some(Commands::Version) => {
            println!("revu {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn print_config(config: &Config, config_file: Option<&std::path::Path>) {
    println!("revu Configuration");
    println!("==================");
    println!();
    println!("Server:");
    println!("  host: {}", config.server.host);
    println!("  port: {}", config.server.port);
    println!("  webhook_path: {}", config.server.webhook_path);
    println!();
    println!("Review:");
    println!("  inline_suggestions: {}", config.review.inline_suggestions);
    println!("  claude_path: {}", config.review.claude_path);
    println!("  model: {}", config.review.model.as_deref().unwrap_or("(default)"));
    println!();
    println!("Logging:");
    println!("  error_log: {}", config.logging.error_log.display());
    println!();
    println!("GitHub:");
    println!(
        "  api_base_url: {}",
        config.github.api_base_url.as_deref().unwrap_or("(github.com)")
    );
    println!();

    let path = config_file
        .map(|p| p.to_path_buf())
        .or_else(Config::default_config_path);
    if let Some(path) = path {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
    println!();

    println!("Credentials:");
    match Secrets::load().and_then(Secrets::with_env_overrides) {
        Ok(secrets) => {
            let github = &secrets.github;
            let app_id = github
                .app_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "(not set)".to_string());
            let key = match (&github.private_key, &github.private_key_path) {
                (Some(_), _) => "(set inline)".to_string(),
                (None, Some(path)) => path.display().to_string(),
                (None, None) => "(not set)".to_string(),
            };
            let secret = if github.webhook_secret.is_some() {
                "(set)"
            } else {
                "(not set)"
            };
            println!("  app_id: {}", app_id);
            println!("  private_key: {}", key);
            println!("  webhook_secret: {}", secret);

            match AppIdentity::from_secrets(&secrets) {
                Ok(_) => println!("  status: ready"),
                Err(e) => println!("  status: {}", e),
            }
        }
        Err(e) => println!("  (unreadable: {})", e),
    }
}

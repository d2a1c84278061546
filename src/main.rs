//! guardbot - Telegram community-management bot - CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use guardbot::cli::{Cli, Commands};
use guardbot::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bot => {
            let config =
                Config::load(cli.config).context("Failed to load the bot configuration")?;
            guardbot::bot::run(config)
                .await
                .context("Failed to run the Telegram bot")?;
        }
        Commands::Status => {
            print_status(cli.config);
        }
    }

    Ok(())
}

/// Print configuration status.
fn print_status(config_path: Option<std::path::PathBuf>) {
    println!("📊 guardbot status\n");

    match Config::load(config_path) {
        Ok(config) => {
            println!("✅ Configuration: Found");
            println!("   Moderation chat: {}", config.moderation_chat_id);
            println!("   Admins: {}", config.admin_ids.len());
            println!("   Moderators: {}", config.moderator_ids.len());
            println!("   Game channels: {}", config.game_channels.join(", "));
            println!("   Post cooldown: {}s", config.post_cooldown_secs);
            println!("   Guess interval: {}s", config.attempt_interval_secs);
            match &config.database_url {
                Some(url) => println!("   State mirror: {url}"),
                None => println!("   State mirror: disabled"),
            }
        }
        Err(e) => {
            println!("❌ Configuration: Not found or invalid");
            println!("   Error: {e}");
            println!();
            println!("Create config at ~/.config/guardbot/config.json:");
            println!(r#"  {{"bot_token": "...", "moderation_chat_id": "..."}}"#);
        }
    }
}

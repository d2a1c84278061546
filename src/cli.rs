//! CLI argument parsing with subcommands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Telegram community-management bot.
///
/// Moderation (ban/mute), per-user cooldowns, a word-guessing contest and a
/// number lottery, plus member statistics.
#[derive(Parser)]
#[command(name = "guardbot")]
#[command(about = "Telegram community-management bot")]
#[command(version)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot
    Bot,

    /// Show current configuration status
    Status,
}

//! guardbot library.
//!
//! A Telegram community-management bot: moderation (ban/mute) with per-user
//! cooldowns, a word-guessing contest and a number lottery, plus member
//! activity statistics. The decision logic lives in [`core`] and performs no
//! I/O; [`bot`] wires it to Telegram.

pub mod bot;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod render;
pub mod storage;

// Re-export commonly used types
pub use crate::core::{CommunityState, CoreSettings, Outcome, Rejection, Role};
pub use config::Config;
pub use storage::{SqliteMirror, StateMirror};

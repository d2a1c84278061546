//! Community state tracker.
//!
//! All bot state lives in one injected [`CommunityState`]: the user registry,
//! cooldown tracker, and the per-channel game and lottery instances. The core
//! performs no I/O — operations are synchronous, take an explicit `now` (and
//! an `Rng` where randomness is involved) and return typed outcomes the
//! handler layer renders into chat replies.
//!
//! The state is not internally synchronized; the bot layer wraps it in a
//! mutex because tokio schedules handlers in parallel.

pub mod cooldown;
pub mod game;
pub mod lottery;
pub mod moderation;
pub mod registry;

pub use cooldown::{ActionKey, CooldownTracker};
pub use game::{GameChannel, GuessOutcome, RoundStart, RoundSummary};
pub use lottery::{DrawResult, JoinOutcome, LotteryChannel, LotteryWinner, Participant};
pub use registry::{RegistryStats, UserProfile, UserRegistry};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Telegram user id.
pub type UserId = i64;

/// Capability level, resolved once per inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Moderator,
    Member,
}

impl Role {
    /// Privileged users are exempt from cooldowns and immune to ban/mute.
    pub fn is_privileged(self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Why an operation was rejected. Display text is surfaced to users verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("user not found")]
    NotFound,

    #[error("moderators and administrators cannot be targeted")]
    PrivilegeViolation,

    #[error("you do not have permission to use this command")]
    PermissionDenied,

    #[error("{0}")]
    InvalidState(String),

    #[error("please wait {remaining_secs}s before trying again")]
    RateLimited { remaining_secs: i64 },

    #[error("you are banned and cannot participate")]
    Banned,

    #[error("you are muted for another {remaining_secs}s")]
    Muted { remaining_secs: i64 },
}

/// Result of dispatching one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The action was permitted and needed no state change worth describing.
    Allowed,
    Denied(Rejection),
    /// The action mutated state; the description is ready for rendering.
    StateChanged(String),
}

/// A state-mutating action parsed from an inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Guess { channel: String, text: String },
    StartRound { channel: String },
    StopRound { channel: String },
    AddWord { channel: String, word: String, description: Option<String> },
    EditWord { channel: String, word: String, description: String },
    AttachMedia { channel: String, word: String, file_id: String },
    SetAttemptInterval { channel: String, minutes: i64 },
    JoinLottery { channel: String },
    DrawLottery { channel: String, count: usize },
    ResetLottery { channel: String },
    Ban { target: String, reason: Option<String> },
    Unban { target: String },
    Mute { target: String, duration_secs: i64 },
    Unmute { target: String },
    Post,
}

/// One inbound event as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct Event {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub action: Action,
}

/// Core knobs, extracted from the application config.
#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub admins: HashSet<UserId>,
    pub moderators: HashSet<UserId>,
    /// Minimum gap between member posts (reports), seconds.
    pub post_cooldown_secs: i64,
    /// Starting guess interval for every game channel, seconds.
    pub default_attempt_interval_secs: i64,
    pub game_channels: Vec<String>,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            admins: HashSet::new(),
            moderators: HashSet::new(),
            post_cooldown_secs: 3600,
            default_attempt_interval_secs: 3600,
            game_channels: vec!["main".to_owned()],
        }
    }
}

/// Result of a guess attempt plus what the reply templates need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessReport {
    pub outcome: GuessOutcome,
    pub interval_secs: i64,
}

/// Process-wide bot state. Constructed once and passed into handlers.
#[derive(Debug)]
pub struct CommunityState {
    settings: CoreSettings,
    pub registry: UserRegistry,
    pub cooldowns: CooldownTracker,
    pub games: HashMap<String, GameChannel>,
    pub lotteries: HashMap<String, LotteryChannel>,
}

impl CommunityState {
    pub fn new(settings: CoreSettings) -> Self {
        let mut games = HashMap::new();
        let mut lotteries = HashMap::new();
        for name in &settings.game_channels {
            games.insert(
                name.clone(),
                GameChannel::new(name.clone(), settings.default_attempt_interval_secs),
            );
            lotteries.insert(name.clone(), LotteryChannel::new());
        }
        Self {
            settings,
            registry: UserRegistry::new(),
            cooldowns: CooldownTracker::new(),
            games,
            lotteries,
        }
    }

    pub fn role_of(&self, id: UserId) -> Role {
        if self.settings.admins.contains(&id) {
            Role::Admin
        } else if self.settings.moderators.contains(&id) {
            Role::Moderator
        } else {
            Role::Member
        }
    }

    /// Record an observed event in the registry and resolve the issuer role.
    pub fn observe(&mut self, id: UserId, display_name: Option<&str>, now: DateTime<Utc>) -> Role {
        self.registry.touch(id, display_name, now);
        self.role_of(id)
    }

    /// First configured game channel, the target when a command names none.
    pub fn default_channel(&self) -> &str {
        self.settings
            .game_channels
            .first()
            .map(String::as_str)
            .unwrap_or("main")
    }

    /// Match a command token against the configured channel names.
    pub fn resolve_channel(&self, token: &str) -> Option<&str> {
        self.settings
            .game_channels
            .iter()
            .find(|name| name.eq_ignore_ascii_case(token))
            .map(String::as_str)
    }

    pub fn game(&self, channel: &str) -> Result<&GameChannel, Rejection> {
        self.games
            .get(channel)
            .ok_or_else(|| Rejection::InvalidState(format!("unknown game channel '{channel}'")))
    }

    pub fn game_mut(&mut self, channel: &str) -> Result<&mut GameChannel, Rejection> {
        self.games
            .get_mut(channel)
            .ok_or_else(|| Rejection::InvalidState(format!("unknown game channel '{channel}'")))
    }

    pub fn lottery(&self, channel: &str) -> Result<&LotteryChannel, Rejection> {
        self.lotteries
            .get(channel)
            .ok_or_else(|| Rejection::InvalidState(format!("unknown game channel '{channel}'")))
    }

    pub fn lottery_mut(&mut self, channel: &str) -> Result<&mut LotteryChannel, Rejection> {
        self.lotteries
            .get_mut(channel)
            .ok_or_else(|| Rejection::InvalidState(format!("unknown game channel '{channel}'")))
    }

    /// A guess attempt: moderation gate, per-channel cooldown (privileged
    /// users exempt), then the match itself.
    pub fn guess(
        &mut self,
        user_id: UserId,
        channel: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<GuessReport, Rejection> {
        self.member_gate(user_id, now)?;

        let (active, interval) = {
            let game = self.game(channel)?;
            (game.is_active(), game.attempt_interval())
        };
        if !active {
            return Err(Rejection::InvalidState(
                "no active round, wait for the next contest".to_owned(),
            ));
        }

        if !self.role_of(user_id).is_privileged() {
            self.cooldowns
                .try_consume(user_id, ActionKey::Guess(channel.to_owned()), interval, now)
                .map_err(|remaining| Rejection::RateLimited {
                    remaining_secs: remaining,
                })?;
        }

        let display_name = self
            .registry
            .get(user_id)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| format!("id_{user_id}"));
        let outcome = self.game_mut(channel)?.guess(&display_name, text)?;

        Ok(GuessReport {
            outcome,
            interval_secs: interval.num_seconds(),
        })
    }

    /// Member post gate (reports): moderation state plus the post cooldown.
    pub fn try_post(&mut self, user_id: UserId, now: DateTime<Utc>) -> Result<(), Rejection> {
        self.member_gate(user_id, now)?;
        if self.role_of(user_id).is_privileged() {
            return Ok(());
        }
        self.cooldowns
            .try_consume(
                user_id,
                ActionKey::Post,
                Duration::seconds(self.settings.post_cooldown_secs),
                now,
            )
            .map_err(|remaining| Rejection::RateLimited {
                remaining_secs: remaining,
            })
    }

    /// Dispatch one inbound event: registry update, mute sweep, role and
    /// moderation gates, then the action itself.
    pub fn on_event(&mut self, event: Event, rng: &mut impl Rng, now: DateTime<Utc>) -> Outcome {
        let role = self.observe(event.user_id, event.display_name.as_deref(), now);
        self.sweep_expired_mutes(now);

        match self.apply(event, role, rng, now) {
            Ok(outcome) => outcome,
            Err(rejection) => Outcome::Denied(rejection),
        }
    }

    /// Apply an action for an already-observed event with a resolved role.
    /// Callers that have not yet touched the registry go through
    /// [`on_event`](Self::on_event) instead.
    pub(crate) fn apply(
        &mut self,
        event: Event,
        role: Role,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> Result<Outcome, Rejection> {
        let user_id = event.user_id;
        match event.action {
            Action::Guess { channel, text } => {
                let report = self.guess(user_id, &channel, &text, now)?;
                Ok(match report.outcome {
                    GuessOutcome::Correct { word } => {
                        Outcome::StateChanged(format!("round won, the word was '{word}'"))
                    }
                    GuessOutcome::Wrong { .. } => Outcome::Allowed,
                })
            }
            Action::StartRound { channel } => {
                require_admin(role)?;
                let start = self.game_mut(&channel)?.start_round(rng)?;
                Ok(Outcome::StateChanged(format!(
                    "contest started: {}",
                    start.description
                )))
            }
            Action::StopRound { channel } => {
                require_admin(role)?;
                let summary = self.game_mut(&channel)?.stop_round()?;
                let word = summary.word.unwrap_or_else(|| "not selected".to_owned());
                let winners = if summary.winners.is_empty() {
                    "no winners".to_owned()
                } else {
                    summary.winners.join(", ")
                };
                Ok(Outcome::StateChanged(format!(
                    "contest stopped, the word was '{word}', winners: {winners}"
                )))
            }
            Action::AddWord {
                channel,
                word,
                description,
            } => {
                require_admin(role)?;
                let word = self.game_mut(&channel)?.add_word(&word, description);
                Ok(Outcome::StateChanged(format!(
                    "word '{word}' added to the bank"
                )))
            }
            Action::EditWord {
                channel,
                word,
                description,
            } => {
                require_admin(role)?;
                self.game_mut(&channel)?.edit_word(&word, description)?;
                Ok(Outcome::StateChanged(format!("word '{word}' updated")))
            }
            Action::AttachMedia {
                channel,
                word,
                file_id,
            } => {
                require_admin(role)?;
                let count = self.game_mut(&channel)?.attach_media(&word, file_id)?;
                Ok(Outcome::StateChanged(format!(
                    "media attached to '{word}' ({count} total)"
                )))
            }
            Action::SetAttemptInterval { channel, minutes } => {
                require_admin(role)?;
                self.game_mut(&channel)?.set_attempt_interval(minutes);
                Ok(Outcome::StateChanged(format!(
                    "attempt interval set to {minutes} min"
                )))
            }
            Action::JoinLottery { channel } => {
                self.member_gate(user_id, now)?;
                let display_name = self
                    .registry
                    .get(user_id)
                    .map(|p| p.display_name.clone())
                    .unwrap_or_else(|| format!("id_{user_id}"));
                let joined = self
                    .lottery_mut(&channel)?
                    .join(user_id, &display_name, rng, now);
                Ok(Outcome::StateChanged(if joined.already_joined {
                    format!("you already have number {}", joined.number)
                } else {
                    format!(
                        "your lottery number: {} ({} participants)",
                        joined.number, joined.total_participants
                    )
                }))
            }
            Action::DrawLottery { channel, count } => {
                require_admin(role)?;
                let result = self.lottery(&channel)?.draw(count, rng)?;
                let winners: Vec<String> = result
                    .winners
                    .iter()
                    .map(|w| format!("@{} ({})", w.display_name, w.number))
                    .collect();
                Ok(Outcome::StateChanged(format!(
                    "winning number {}, winners: {}",
                    result.winning_number,
                    winners.join(", ")
                )))
            }
            Action::ResetLottery { channel } => {
                require_admin(role)?;
                let removed = self.lottery_mut(&channel)?.reset();
                Ok(Outcome::StateChanged(format!(
                    "lottery reset, {removed} participants removed"
                )))
            }
            Action::Ban { target, reason } => {
                require_moderator(role)?;
                let profile = self.ban(&target, reason, now)?;
                Ok(Outcome::StateChanged(format!(
                    "@{} banned",
                    profile.display_name
                )))
            }
            Action::Unban { target } => {
                require_moderator(role)?;
                let profile = self.unban(&target)?;
                Ok(Outcome::StateChanged(format!(
                    "@{} unbanned",
                    profile.display_name
                )))
            }
            Action::Mute {
                target,
                duration_secs,
            } => {
                require_moderator(role)?;
                let profile = self.mute(&target, Duration::seconds(duration_secs), now)?;
                Ok(Outcome::StateChanged(format!(
                    "@{} muted for {duration_secs}s",
                    profile.display_name
                )))
            }
            Action::Unmute { target } => {
                require_moderator(role)?;
                let profile = self.unmute(&target, now)?;
                Ok(Outcome::StateChanged(format!(
                    "@{} unmuted",
                    profile.display_name
                )))
            }
            Action::Post => {
                self.try_post(user_id, now)?;
                Ok(Outcome::Allowed)
            }
        }
    }
}

fn require_admin(role: Role) -> Result<(), Rejection> {
    if role.is_admin() {
        Ok(())
    } else {
        Err(Rejection::PermissionDenied)
    }
}

fn require_moderator(role: Role) -> Result<(), Rejection> {
    if role.is_privileged() {
        Ok(())
    } else {
        Err(Rejection::PermissionDenied)
    }
}

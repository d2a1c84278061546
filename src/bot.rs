//! Long-running Telegram bot: command parsing and reply delivery.
//!
//! All decisions happen inside [`CommunityState`] behind a mutex; handlers
//! translate commands into core calls, render the typed outcome and deliver
//! it. Moderation-relevant events additionally land in the configured
//! moderation group, and profile changes are mirrored to sqlite best-effort.

use anyhow::{Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use teloxide::utils::command::BotCommands;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::core::{
    Action, CommunityState, Event, GuessOutcome, Outcome, Rejection, UserProfile,
};
use crate::render;
use crate::storage::{SqliteMirror, StateMirror};

/// Available bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Welcome message")]
    Start,
    #[command(description = "Show the command list")]
    Help,
    #[command(description = "Show your Telegram ID")]
    Id,
    #[command(description = "Guess the contest word")]
    Guess(String),
    #[command(description = "Current contest hint")]
    Gameinfo(String),
    #[command(description = "How the games work")]
    Gamehelp,
    #[command(description = "Get a lottery number")]
    Roll(String),
    #[command(description = "Show your lottery number")]
    Myroll(String),
    #[command(description = "Send a message to the moderators")]
    Report(String),
    #[command(description = "Ban a user (moderators)")]
    Ban(String),
    #[command(description = "Unban a user (moderators)")]
    Unban(String),
    #[command(description = "Mute a user, e.g. /mute @name 10m (moderators)")]
    Mute(String),
    #[command(description = "Unmute a user (moderators)")]
    Unmute(String),
    #[command(description = "List banned users (moderators)")]
    Banlist,
    #[command(description = "Community statistics (moderators)")]
    Stats,
    #[command(description = "Most active users (moderators)")]
    Top(String),
    #[command(description = "User activity info (moderators)")]
    Lastseen(String),
    #[command(description = "Add a word to the bank (admins)")]
    Wordadd(String),
    #[command(description = "Edit a word's description (admins)")]
    Wordedit(String),
    #[command(description = "Attach media to a word (admins)")]
    Wordmedia(String),
    #[command(description = "Start a contest round (admins)")]
    Gamestart(String),
    #[command(description = "Stop the contest round (admins)")]
    Gamestop(String),
    #[command(description = "Set the guess interval in minutes (admins)")]
    Timeset(String),
    #[command(description = "Open a fresh lottery (admins)")]
    Rollstart(String),
    #[command(description = "Reset the lottery (admins)")]
    Rollreset(String),
    #[command(description = "Draw lottery winners (admins)")]
    Rolldraw(String),
    #[command(description = "Lottery participants (admins)")]
    Rollstat(String),
}

/// Shared handler dependencies, injected through dptree.
#[derive(Clone)]
pub struct BotContext {
    pub state: Arc<Mutex<CommunityState>>,
    pub config: Arc<Config>,
    pub mirror: Option<Arc<dyn StateMirror>>,
}

/// What one command produced, collected under the state lock and delivered
/// after it is released.
#[derive(Default)]
struct Outputs {
    reply: Option<String>,
    /// Telegram file ids to send alongside the reply (round announcements).
    media: Vec<String>,
    /// Messages for the moderation group.
    notices: Vec<String>,
    /// Profiles whose moderation state changed, for the sqlite mirror.
    mirror: Vec<UserProfile>,
}

/// Main entry point for the bot.
pub async fn run(config: Config) -> Result<()> {
    let mirror: Option<Arc<dyn StateMirror>> = match &config.database_url {
        Some(url) => {
            let mirror = SqliteMirror::connect(url)
                .await
                .context("Failed to open the state mirror database")?;
            Some(Arc::new(mirror))
        }
        None => None,
    };

    let state = Arc::new(Mutex::new(CommunityState::new(config.core_settings())));
    let bot = Bot::new(&config.bot_token);
    let ctx = BotContext {
        state,
        config: Arc::new(config),
        mirror,
    };

    tracing::info!("Starting guardbot...");

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Non-command messages only feed the activity registry.
async fn handle_message(msg: Message, ctx: BotContext) -> ResponseResult<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let name = display_name(&user);
    let now = Utc::now();

    let mut state = ctx.state.lock().await;
    state.observe(user.id.0 as i64, Some(&name), now);
    state.sweep_expired_mutes(now);
    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    ctx: BotContext,
) -> ResponseResult<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let name = display_name(&user);
    let now = Utc::now();

    let outputs = {
        let mut state = ctx.state.lock().await;
        let mut rng = StdRng::from_entropy();
        dispatch(&mut state, &mut rng, user_id, &name, now, cmd)
    };

    if let Some(reply) = outputs.reply {
        bot.send_message(msg.chat.id, reply)
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
    }
    for file_id in outputs.media {
        bot.send_photo(msg.chat.id, InputFile::file_id(file_id))
            .await?;
    }
    for notice in outputs.notices {
        if let Err(e) = bot
            .send_message(ctx.config.moderation_chat_id, notice)
            .parse_mode(ParseMode::MarkdownV2)
            .await
        {
            tracing::warn!(error = %e, "failed to notify the moderation group");
        }
    }
    for profile in outputs.mirror {
        if let Some(mirror) = ctx.mirror.clone() {
            tokio::spawn(async move {
                if let Err(e) = mirror.record_user(&profile).await {
                    tracing::warn!(user = profile.id, error = %e, "state mirror write failed");
                }
            });
        }
    }

    Ok(())
}

/// Run one command against the state and collect everything to deliver.
///
/// Registers the inbound message in the registry exactly once; the
/// event-routed arms go through [`run_event`], which does not observe again.
fn dispatch(
    state: &mut CommunityState,
    rng: &mut StdRng,
    user_id: i64,
    name: &str,
    now: chrono::DateTime<Utc>,
    cmd: Command,
) -> Outputs {
    let mut out = Outputs::default();
    state.observe(user_id, Some(name), now);
    state.sweep_expired_mutes(now);

    match cmd {
        Command::Start => out.reply = Some(render::welcome()),
        Command::Help => out.reply = Some(render::help_text()),
        Command::Id => out.reply = Some(render::your_id(user_id)),

        Command::Guess(args) => {
            let (channel, text) = split_channel(state, &args);
            if text.is_empty() {
                out.reply = Some("Usage: /guess word".to_owned());
                return out;
            }
            match state.guess(user_id, &channel, text, now) {
                Ok(report) => match report.outcome {
                    GuessOutcome::Correct { word } => {
                        out.reply = Some(render::guess_correct(&channel, name, &word));
                        out.notices
                            .push(render::attempt_notice(&channel, name, user_id, text, &word));
                        out.notices
                            .push(render::winner_notice(&channel, name, user_id, &word));
                    }
                    GuessOutcome::Wrong { word } => {
                        out.reply = Some(render::guess_wrong(&channel, report.interval_secs));
                        out.notices
                            .push(render::attempt_notice(&channel, name, user_id, text, &word));
                    }
                },
                Err(rejection) => out.reply = Some(render::denial(&rejection)),
            }
        }

        Command::Gamehelp => out.reply = Some(render::game_help()),

        Command::Gameinfo(args) => {
            let (channel, _) = split_channel(state, &args);
            out.reply = match state.game(&channel) {
                Ok(game) => Some(render::game_info(&channel, &game.info())),
                Err(rejection) => Some(render::denial(&rejection)),
            };
        }

        Command::Roll(args) => {
            let (channel, _) = split_channel(state, &args);
            if let Err(rejection) = state.member_gate(user_id, now) {
                out.reply = Some(render::denial(&rejection));
                return out;
            }
            out.reply = match state.lottery_mut(&channel) {
                Ok(lottery) => {
                    let joined = lottery.join(user_id, name, rng, now);
                    Some(render::lottery_number(
                        name,
                        joined.number,
                        joined.total_participants,
                        joined.already_joined,
                    ))
                }
                Err(rejection) => Some(render::denial(&rejection)),
            };
        }

        Command::Myroll(args) => {
            let (channel, _) = split_channel(state, &args);
            out.reply = match state.lottery(&channel) {
                Ok(lottery) => Some(render::my_number(name, lottery.my_number(user_id))),
                Err(rejection) => Some(render::denial(&rejection)),
            };
        }

        Command::Report(text) => {
            let text = text.trim();
            if text.is_empty() {
                out.reply = Some("Usage: /report your message".to_owned());
                return out;
            }
            match state.try_post(user_id, now) {
                Ok(()) => {
                    out.reply = Some("✅ Your message was sent to the moderators".to_owned());
                    out.notices.push(render::report_notice(name, user_id, text));
                }
                Err(rejection) => out.reply = Some(render::denial(&rejection)),
            }
        }

        Command::Ban(args) => {
            if !state.role_of(user_id).is_privileged() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (target, reason) = split_target(&args);
            let Some(target) = target else {
                out.reply = Some("Usage: /ban user reason".to_owned());
                return out;
            };
            match state.ban(target, reason.map(str::to_owned), now) {
                Ok(profile) => {
                    let receipt = render::ban_receipt(&profile, name, now);
                    out.reply = Some(receipt.clone());
                    out.notices.push(receipt);
                    out.mirror.push(profile);
                }
                Err(rejection) => out.reply = Some(render::denial(&rejection)),
            }
        }

        Command::Unban(args) => {
            if !state.role_of(user_id).is_privileged() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (target, _) = split_target(&args);
            let Some(target) = target else {
                out.reply = Some("Usage: /unban user".to_owned());
                return out;
            };
            match state.unban(target) {
                Ok(profile) => {
                    let receipt = render::unban_receipt(&profile, name, now);
                    out.reply = Some(receipt.clone());
                    out.notices.push(receipt);
                    out.mirror.push(profile);
                }
                Err(rejection) => out.reply = Some(render::denial(&rejection)),
            }
        }

        Command::Mute(args) => {
            if !state.role_of(user_id).is_privileged() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (target, rest) = split_target(&args);
            let duration = rest.and_then(parse_duration);
            let (Some(target), Some(duration)) = (target, duration) else {
                out.reply = Some("Usage: /mute user 10m \\(s, m, h or d\\)".to_owned());
                return out;
            };
            match state.mute(target, duration, now) {
                Ok(profile) => {
                    let label = rest.unwrap_or_default().trim();
                    let receipt = render::mute_receipt(&profile, label, name);
                    out.reply = Some(receipt.clone());
                    out.notices.push(receipt);
                    out.mirror.push(profile);
                }
                Err(rejection) => out.reply = Some(render::denial(&rejection)),
            }
        }

        Command::Unmute(args) => {
            if !state.role_of(user_id).is_privileged() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (target, _) = split_target(&args);
            let Some(target) = target else {
                out.reply = Some("Usage: /unmute user".to_owned());
                return out;
            };
            match state.unmute(target, now) {
                Ok(profile) => {
                    let receipt = render::unmute_receipt(&profile, name, now);
                    out.reply = Some(receipt.clone());
                    out.notices.push(receipt);
                    out.mirror.push(profile);
                }
                Err(rejection) => out.reply = Some(render::denial(&rejection)),
            }
        }

        Command::Banlist => {
            out.reply = if state.role_of(user_id).is_privileged() {
                Some(render::banlist(&state.registry.banned_users()))
            } else {
                Some(render::denial(&Rejection::PermissionDenied))
            };
        }

        Command::Stats => {
            out.reply = if state.role_of(user_id).is_privileged() {
                Some(render::stats(&state.registry.stats(now), now))
            } else {
                Some(render::denial(&Rejection::PermissionDenied))
            };
        }

        Command::Top(args) => {
            if !state.role_of(user_id).is_privileged() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let limit = args.trim().parse::<usize>().unwrap_or(10).clamp(1, 50);
            out.reply = Some(render::top_users(&state.registry.top_users(limit)));
        }

        Command::Lastseen(args) => {
            if !state.role_of(user_id).is_privileged() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            out.reply = match state.registry.resolve(args.trim()) {
                Some(id) => state
                    .registry
                    .get(id)
                    .map(|profile| render::last_seen(profile, now)),
                None => Some(render::denial(&Rejection::NotFound)),
            };
        }

        Command::Wordadd(args) => {
            if !state.role_of(user_id).is_admin() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (channel, rest) = split_channel(state, &args);
            let (word, description) = split_target(rest);
            let Some(word) = word else {
                out.reply = Some("Usage: /wordadd word description".to_owned());
                return out;
            };
            out.reply = Some(run_event(
                state,
                rng,
                user_id,
                name,
                now,
                Action::AddWord {
                    channel,
                    word: word.to_owned(),
                    description: description.map(str::to_owned),
                },
            ));
        }

        Command::Wordedit(args) => {
            if !state.role_of(user_id).is_admin() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (channel, rest) = split_channel(state, &args);
            let (word, description) = split_target(rest);
            let (Some(word), Some(description)) = (word, description) else {
                out.reply = Some("Usage: /wordedit word new description".to_owned());
                return out;
            };
            out.reply = Some(run_event(
                state,
                rng,
                user_id,
                name,
                now,
                Action::EditWord {
                    channel,
                    word: word.to_owned(),
                    description: description.to_owned(),
                },
            ));
        }

        Command::Wordmedia(args) => {
            if !state.role_of(user_id).is_admin() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (channel, rest) = split_channel(state, &args);
            let (word, file_id) = split_target(rest);
            let (Some(word), Some(file_id)) = (word, file_id) else {
                out.reply = Some("Usage: /wordmedia word file\\_id".to_owned());
                return out;
            };
            out.reply = Some(run_event(
                state,
                rng,
                user_id,
                name,
                now,
                Action::AttachMedia {
                    channel,
                    word: word.to_owned(),
                    file_id: file_id.to_owned(),
                },
            ));
        }

        Command::Gamestart(args) => {
            if !state.role_of(user_id).is_admin() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (channel, _) = split_channel(state, &args);
            match state.game_mut(&channel).and_then(|g| g.start_round(rng)) {
                Ok(start) => {
                    out.reply = Some(render::round_started(&channel, &start));
                    out.media = start.media;
                }
                Err(rejection) => out.reply = Some(render::denial(&rejection)),
            }
        }

        Command::Gamestop(args) => {
            if !state.role_of(user_id).is_admin() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (channel, _) = split_channel(state, &args);
            match state.game_mut(&channel).and_then(|g| g.stop_round()) {
                Ok(summary) => {
                    out.reply = Some(render::round_stopped(
                        &channel,
                        summary.word.as_deref(),
                        &summary.winners,
                    ));
                }
                Err(rejection) => out.reply = Some(render::denial(&rejection)),
            }
        }

        Command::Timeset(args) => {
            if !state.role_of(user_id).is_admin() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (channel, rest) = split_channel(state, &args);
            let Ok(minutes) = rest.trim().parse::<i64>() else {
                out.reply = Some("Usage: /timeset minutes".to_owned());
                return out;
            };
            out.reply = Some(run_event(
                state,
                rng,
                user_id,
                name,
                now,
                Action::SetAttemptInterval { channel, minutes },
            ));
        }

        Command::Rollstart(args) => {
            if !state.role_of(user_id).is_admin() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (channel, _) = split_channel(state, &args);
            match state.lottery_mut(&channel) {
                Ok(lottery) => {
                    lottery.reset();
                    out.reply = Some(format!(
                        "🎲 *Lottery open* \\[{}\\]\\!\n\nUse /roll to get your number",
                        render::escape_markdown(&channel)
                    ));
                }
                Err(rejection) => out.reply = Some(render::denial(&rejection)),
            }
        }

        Command::Rollreset(args) => {
            let (channel, _) = split_channel(state, &args);
            out.reply = Some(run_event(
                state,
                rng,
                user_id,
                name,
                now,
                Action::ResetLottery { channel },
            ));
        }

        Command::Rolldraw(args) => {
            if !state.role_of(user_id).is_admin() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (channel, rest) = split_channel(state, &args);
            let count = rest.trim().parse::<usize>().unwrap_or(1);
            match state.lottery(&channel).and_then(|l| l.draw(count, rng)) {
                Ok(result) => {
                    let text = render::draw_results(&channel, &result);
                    out.reply = Some(text.clone());
                    out.notices.push(text);
                }
                Err(rejection) => out.reply = Some(render::denial(&rejection)),
            }
        }

        Command::Rollstat(args) => {
            if !state.role_of(user_id).is_admin() {
                out.reply = Some(render::denial(&Rejection::PermissionDenied));
                return out;
            }
            let (channel, _) = split_channel(state, &args);
            out.reply = match state.lottery(&channel) {
                Ok(lottery) => Some(render::lottery_status(&channel, &lottery.participants())),
                Err(rejection) => Some(render::denial(&rejection)),
            };
        }
    }

    out
}

/// Route a command action through the event machinery and render the outcome.
///
/// [`dispatch`] has already observed the message and swept mutes, so this
/// applies the action with the resolved role rather than going through
/// `on_event` (which would register the same message a second time).
fn run_event(
    state: &mut CommunityState,
    rng: &mut StdRng,
    user_id: i64,
    name: &str,
    now: chrono::DateTime<Utc>,
    action: Action,
) -> String {
    let role = state.role_of(user_id);
    let event = Event {
        user_id,
        display_name: Some(name.to_owned()),
        action,
    };
    match state.apply(event, role, rng, now) {
        Ok(Outcome::Allowed) => "✅ Done".to_owned(),
        Ok(Outcome::StateChanged(text)) => {
            format!("✅ {}", render::escape_markdown(&text))
        }
        Ok(Outcome::Denied(rejection)) | Err(rejection) => render::denial(&rejection),
    }
}

/// Prefer the username, fall back to the first name.
fn display_name(user: &teloxide::types::User) -> String {
    user.username
        .clone()
        .unwrap_or_else(|| user.first_name.clone())
}

/// Split a leading channel token off command arguments. An unrecognized first
/// token leaves the arguments intact and targets the default channel.
fn split_channel<'a>(state: &CommunityState, args: &'a str) -> (String, &'a str) {
    let trimmed = args.trim();
    if let Some((first, rest)) = trimmed.split_once(char::is_whitespace) {
        if let Some(channel) = state.resolve_channel(first) {
            return (channel.to_owned(), rest.trim_start());
        }
    } else if let Some(channel) = state.resolve_channel(trimmed) {
        return (channel.to_owned(), "");
    }
    (state.default_channel().to_owned(), trimmed)
}

/// Split arguments into a target token and the optional remainder.
fn split_target(args: &str) -> (Option<&str>, Option<&str>) {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return (None, None);
    }
    match trimmed.split_once(char::is_whitespace) {
        Some((target, rest)) => (Some(target), Some(rest.trim_start())),
        None => (Some(trimmed), None),
    }
}

/// Parse a mute duration like `30s`, `10m`, `2h` or `1d`.
fn parse_duration(token: &str) -> Option<chrono::Duration> {
    let token = token.trim();
    let mut chars = token.chars();
    let unit = chars.next_back()?;
    let value: i64 = chars.as_str().parse().ok()?;
    if value <= 0 {
        return None;
    }
    match unit {
        's' => Some(chrono::Duration::seconds(value)),
        'm' => Some(chrono::Duration::minutes(value)),
        'h' => Some(chrono::Duration::hours(value)),
        'd' => Some(chrono::Duration::days(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CoreSettings;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(chrono::Duration::seconds(30)));
        assert_eq!(parse_duration("10m"), Some(chrono::Duration::minutes(10)));
        assert_eq!(parse_duration("2h"), Some(chrono::Duration::hours(2)));
        assert_eq!(parse_duration("1d"), Some(chrono::Duration::days(1)));
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("0m"), None);
        assert_eq!(parse_duration("-5m"), None);
        assert_eq!(parse_duration("tenm"), None);
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target(""), (None, None));
        assert_eq!(split_target("  @alice "), (Some("@alice"), None));
        assert_eq!(
            split_target("@alice spam and more"),
            (Some("@alice"), Some("spam and more"))
        );
    }

    #[test]
    fn test_split_channel() {
        let mut settings = CoreSettings::default();
        settings.game_channels = vec!["try".to_owned(), "more".to_owned()];
        let state = CommunityState::new(settings);

        assert_eq!(split_channel(&state, "try budapest"), ("try".to_owned(), "budapest"));
        assert_eq!(split_channel(&state, "MORE x"), ("more".to_owned(), "x"));
        assert_eq!(split_channel(&state, "budapest"), ("try".to_owned(), "budapest"));
        assert_eq!(split_channel(&state, "more"), ("more".to_owned(), ""));
        assert_eq!(split_channel(&state, ""), ("try".to_owned(), ""));
    }

    #[test]
    fn test_dispatch_guess_flow_produces_notices() {
        let mut settings = CoreSettings::default();
        settings.admins.insert(100);
        let mut state = CommunityState::new(settings);
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();

        state.game_mut("main").unwrap().add_word("budapest", None);
        state.game_mut("main").unwrap().start_round(&mut rng).unwrap();

        let out = dispatch(
            &mut state,
            &mut rng,
            1,
            "alice",
            now,
            Command::Guess("Budapest".to_owned()),
        );
        assert!(out.reply.is_some_and(|r| r.contains("Congratulations")));
        // Attempt notice plus winner notice for the moderation group.
        assert_eq!(out.notices.len(), 2);
    }

    #[test]
    fn test_dispatch_moderation_requires_privilege() {
        let mut state = CommunityState::new(CoreSettings::default());
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();
        state.registry.touch(2, Some("bob"), now);

        let out = dispatch(
            &mut state,
            &mut rng,
            1,
            "alice",
            now,
            Command::Ban("@bob spam".to_owned()),
        );
        assert!(out.reply.is_some_and(|r| r.contains("permission")));
        assert!(out.notices.is_empty());
        assert!(!state.is_banned(2));
    }

    #[test]
    fn test_dispatch_ban_mirrors_profile() {
        let mut settings = CoreSettings::default();
        settings.moderators.insert(1);
        let mut state = CommunityState::new(settings);
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();
        state.registry.touch(2, Some("bob"), now);

        let out = dispatch(
            &mut state,
            &mut rng,
            1,
            "mod",
            now,
            Command::Ban("@bob spam".to_owned()),
        );
        assert_eq!(out.mirror.len(), 1);
        assert!(out.mirror[0].banned);
        assert_eq!(out.notices.len(), 1);
        assert!(state.is_banned(2));
    }

    #[test]
    fn test_commands_register_activity_exactly_once() {
        let mut settings = CoreSettings::default();
        settings.admins.insert(100);
        let mut state = CommunityState::new(settings);
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();

        // Event-routed command: one inbound message, one registry bump.
        dispatch(
            &mut state,
            &mut rng,
            100,
            "root",
            now,
            Command::Wordadd("budapest".to_owned()),
        );
        assert_eq!(state.registry.get(100).unwrap().message_count, 1);

        // Typed command from the same user counts the next message.
        dispatch(&mut state, &mut rng, 100, "root", now, Command::Id);
        assert_eq!(state.registry.get(100).unwrap().message_count, 2);

        // Members are registered too.
        dispatch(&mut state, &mut rng, 1, "alice", now, Command::Gamehelp);
        assert_eq!(state.registry.get(1).unwrap().message_count, 1);
    }

    #[test]
    fn test_admin_usage_hints_hidden_from_members() {
        let mut state = CommunityState::new(CoreSettings::default());
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();

        // Bad or missing arguments must not leak usage lines past the gate.
        for cmd in [
            Command::Wordadd(String::new()),
            Command::Wordedit(String::new()),
            Command::Wordmedia(String::new()),
            Command::Timeset("abc".to_owned()),
        ] {
            let out = dispatch(&mut state, &mut rng, 1, "alice", now, cmd);
            assert!(out.reply.is_some_and(|r| r.contains("permission")));
        }
    }

    #[test]
    fn test_dispatch_wordadd_routes_through_events() {
        let mut settings = CoreSettings::default();
        settings.admins.insert(100);
        let mut state = CommunityState::new(settings);
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();

        let out = dispatch(
            &mut state,
            &mut rng,
            100,
            "root",
            now,
            Command::Wordadd("budapest".to_owned()),
        );
        assert!(out.reply.is_some_and(|r| r.starts_with("✅")));
        assert_eq!(state.game("main").unwrap().word_count(), 1);

        let out = dispatch(
            &mut state,
            &mut rng,
            1,
            "alice",
            now,
            Command::Wordadd("prague".to_owned()),
        );
        assert!(out.reply.is_some_and(|r| r.contains("permission")));
    }
}

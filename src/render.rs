//! MarkdownV2 reply templates.
//!
//! The core returns typed outcomes; everything user-facing is formatted here
//! so handler code stays free of string assembly. All dynamic content goes
//! through [`escape_markdown`].

use chrono::{DateTime, Duration, Utc};

use crate::core::{
    DrawResult, Participant, Rejection, RegistryStats, RoundStart, UserId, UserProfile,
};

const DATE_FMT: &str = "%d.%m.%Y %H:%M";

/// Escape special characters for Telegram MarkdownV2 format.
pub fn escape_markdown(text: &str) -> String {
    let special_chars = [
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut result = String::with_capacity(text.len() * 2);

    for c in text.chars() {
        if special_chars.contains(&c) {
            result.push('\\');
        }
        result.push(c);
    }

    result
}

fn mention(name: &str) -> String {
    format!("@{}", escape_markdown(name))
}

fn stamp(at: DateTime<Utc>) -> String {
    escape_markdown(&at.format(DATE_FMT).to_string())
}

/// Human-friendly "how long ago" for last-seen displays.
pub fn humanize_ago(delta: Duration) -> String {
    if delta.num_days() > 0 {
        format!("{} days ago", delta.num_days())
    } else if delta.num_hours() > 0 {
        format!("{} hours ago", delta.num_hours())
    } else if delta.num_minutes() > 0 {
        format!("{} minutes ago", delta.num_minutes())
    } else {
        "just now".to_owned()
    }
}

/// A rejection as a reply line.
pub fn denial(rejection: &Rejection) -> String {
    format!("❌ {}", escape_markdown(&rejection.to_string()))
}

pub fn welcome() -> String {
    "👋 *Welcome\\!*\n\n\
     This community is moderated by guardbot\\. Use /help for the command list\\."
        .to_owned()
}

pub fn help_text() -> String {
    "📖 *Commands*\n\n\
     *Games:*\n\
     /guess word — try to guess the contest word\n\
     /gameinfo — current contest hint\n\
     /roll — get a lottery number\n\
     /myroll — show your lottery number\n\n\
     *Community:*\n\
     /id — show your Telegram ID\n\
     /report text — message the moderators\n\n\
     *Moderation \\(staff\\):*\n\
     /ban, /unban, /mute, /unmute, /banlist, /stats, /top, /lastseen\n\n\
     *Game admin:*\n\
     /wordadd, /wordedit, /wordmedia, /gamestart, /gamestop, /timeset,\n\
     /rollstart, /rollreset, /rollstat"
        .to_owned()
}

pub fn game_help() -> String {
    "🎮 *How the games work*\n\n\
     *Word contest:*\n\
     An administrator starts a round and the bot posts a hint\\. Send\n\
     /guess word to take part\\. Wrong guesses start a personal cooldown,\n\
     the first correct guess wins and closes the round\\.\n\n\
     *Lottery:*\n\
     Use /roll to get a random number from 1 to 9999\\. When the draw\n\
     happens, the participants closest to the winning number win\\.\n\
     /myroll shows your number again\\."
        .to_owned()
}

pub fn your_id(user_id: UserId) -> String {
    format!("🪪 Your ID: `{user_id}`")
}

// ============================================================================
// Moderation receipts
// ============================================================================

pub fn ban_receipt(profile: &UserProfile, moderator: &str, now: DateTime<Utc>) -> String {
    format!(
        "🚫 *User banned*\n\n\
         👤 {} \\(ID: {}\\)\n\
         📝 Reason: {}\n\
         👮 Moderator: {}\n\
         ⏰ {}",
        mention(&profile.display_name),
        profile.id,
        escape_markdown(profile.ban_reason.as_deref().unwrap_or("not specified")),
        mention(moderator),
        stamp(now)
    )
}

pub fn unban_receipt(profile: &UserProfile, moderator: &str, now: DateTime<Utc>) -> String {
    format!(
        "✅ *User unbanned*\n\n\
         👤 {} \\(ID: {}\\)\n\
         👮 Moderator: {}\n\
         ⏰ {}",
        mention(&profile.display_name),
        profile.id,
        mention(moderator),
        stamp(now)
    )
}

pub fn mute_receipt(profile: &UserProfile, duration_label: &str, moderator: &str) -> String {
    let until = profile
        .muted_until
        .map(stamp)
        .unwrap_or_else(|| "?".to_owned());
    format!(
        "🔇 *User muted*\n\n\
         👤 {} \\(ID: {}\\)\n\
         ⏱️ Duration: {}\n\
         🕐 Until: {}\n\
         👮 Moderator: {}",
        mention(&profile.display_name),
        profile.id,
        escape_markdown(duration_label),
        until,
        mention(moderator)
    )
}

pub fn unmute_receipt(profile: &UserProfile, moderator: &str, now: DateTime<Utc>) -> String {
    format!(
        "🔊 *User unmuted*\n\n\
         👤 {} \\(ID: {}\\)\n\
         👮 Moderator: {}\n\
         ⏰ {}",
        mention(&profile.display_name),
        profile.id,
        mention(moderator),
        stamp(now)
    )
}

pub fn banlist(banned: &[&UserProfile]) -> String {
    if banned.is_empty() {
        return "📋 The ban list is empty".to_owned();
    }

    let mut text = format!("🚫 *Banned users* \\({}\\):\n\n", banned.len());
    for (i, profile) in banned.iter().enumerate() {
        let date = profile
            .banned_at
            .map(|at| escape_markdown(&at.format("%d.%m.%Y").to_string()))
            .unwrap_or_else(|| "?".to_owned());
        text.push_str(&format!(
            "{}\\. {} \\(ID: {}\\)\n   📝 {}\n   📅 {}\n\n",
            i + 1,
            mention(&profile.display_name),
            profile.id,
            escape_markdown(profile.ban_reason.as_deref().unwrap_or("not specified")),
            date
        ));
    }
    text
}

pub fn stats(stats: &RegistryStats, now: DateTime<Utc>) -> String {
    let avg = if stats.total_users > 0 {
        stats.total_messages / stats.total_users as u64
    } else {
        0
    };
    format!(
        "📊 *Bot statistics*\n\n\
         👥 Users: {} total, {} active 24h, {} active 7d\n\
         💬 Messages: {} total, {} per user\n\
         🔨 Moderation: {} banned, {} muted\n\
         ⏰ {}",
        stats.total_users,
        stats.active_24h,
        stats.active_7d,
        stats.total_messages,
        avg,
        stats.banned,
        stats.muted,
        stamp(now)
    )
}

pub fn top_users(users: &[&UserProfile]) -> String {
    if users.is_empty() {
        return "📊 No user data yet".to_owned();
    }

    let mut text = format!("🏆 *Top {} active users*\n\n", users.len());
    for (i, profile) in users.iter().enumerate() {
        let medal = match i {
            0 => "🥇".to_owned(),
            1 => "🥈".to_owned(),
            2 => "🥉".to_owned(),
            n => format!("{}\\.", n + 1),
        };
        text.push_str(&format!(
            "{} {} — {} messages\n",
            medal,
            mention(&profile.display_name),
            profile.message_count
        ));
    }
    text
}

pub fn last_seen(profile: &UserProfile, now: DateTime<Utc>) -> String {
    let status = if profile.banned {
        "🚫 Banned"
    } else if profile.muted_until.is_some_and(|until| now < until) {
        "🔇 Muted"
    } else {
        "✅ Active"
    };

    format!(
        "👤 *User info*\n\n\
         Name: {}\n\
         ID: `{}`\n\
         Status: {}\n\
         💬 Messages: {}\n\
         📅 Joined: {}\n\
         ⏰ Last active: {} \\({}\\)",
        mention(&profile.display_name),
        profile.id,
        status,
        profile.message_count,
        stamp(profile.joined_at),
        stamp(profile.last_active_at),
        escape_markdown(&humanize_ago(now - profile.last_active_at))
    )
}

// ============================================================================
// Game replies
// ============================================================================

pub fn round_started(channel: &str, start: &RoundStart) -> String {
    format!(
        "🎮 *Contest started* \\[{}\\]\n\n\
         📝 {}\n\n\
         🎯 Use /guess to take part\n\
         ⏰ One attempt per {} min",
        escape_markdown(channel),
        escape_markdown(&start.description),
        start.interval_secs / 60
    )
}

pub fn round_stopped(channel: &str, word: Option<&str>, winners: &[String]) -> String {
    let winner_line = if winners.is_empty() {
        "🏆 No winners this time".to_owned()
    } else {
        let list: Vec<String> = winners.iter().map(|w| mention(w)).collect();
        format!("🏆 Winners: {}", list.join(", "))
    };
    format!(
        "🛑 *Contest finished* \\[{}\\]\n\n\
         🎯 The word was: {}\n\
         {}",
        escape_markdown(channel),
        escape_markdown(word.unwrap_or("not selected")),
        winner_line
    )
}

pub fn game_info(channel: &str, info: &RoundStart) -> String {
    format!(
        "ℹ️ *Contest info* \\[{}\\]\n\n📝 {}",
        escape_markdown(channel),
        escape_markdown(&info.description)
    )
}

pub fn guess_correct(channel: &str, display_name: &str, word: &str) -> String {
    format!(
        "🎉 *Congratulations* \\[{}\\]\\!\n\n\
         {}, you guessed the word '{}' and won\\!\n\n\
         👑 An administrator will contact you shortly\\.",
        escape_markdown(channel),
        mention(display_name),
        escape_markdown(word)
    )
}

pub fn guess_wrong(channel: &str, interval_secs: i64) -> String {
    format!(
        "❌ Wrong \\[{}\\]\\. Try again in {} min",
        escape_markdown(channel),
        interval_secs / 60
    )
}

/// Moderation-group notice for every guess attempt.
pub fn attempt_notice(
    channel: &str,
    display_name: &str,
    user_id: UserId,
    guess: &str,
    word: &str,
) -> String {
    format!(
        "🎮 *Guess attempt* \\[{}\\]\n\n\
         👤 {} \\(ID: {}\\)\n\
         🎯 Attempt: {}\n\
         ✅ Answer: {}",
        escape_markdown(channel),
        mention(display_name),
        user_id,
        escape_markdown(guess),
        escape_markdown(word)
    )
}

/// Moderation-group notice when somebody wins.
pub fn winner_notice(channel: &str, display_name: &str, user_id: UserId, word: &str) -> String {
    format!(
        "🏆 *Winner* \\[{}\\]\\!\n\n\
         👤 {} \\(ID: {}\\)\n\
         🎯 Guessed: {}\n\n\
         Contact the winner\\!",
        escape_markdown(channel),
        mention(display_name),
        user_id,
        escape_markdown(word)
    )
}

// ============================================================================
// Lottery replies
// ============================================================================

pub fn lottery_number(display_name: &str, number: u32, total: usize, existing: bool) -> String {
    if existing {
        format!(
            "{}, you already have number *{}*",
            mention(display_name),
            number
        )
    } else {
        format!(
            "{}, your lottery number: *{}*\n\n🎲 Participants: {}",
            mention(display_name),
            number,
            total
        )
    }
}

pub fn my_number(display_name: &str, number: Option<u32>) -> String {
    match number {
        Some(number) => format!("{}, your number: *{}*", mention(display_name), number),
        None => format!(
            "{}, you are not in the lottery yet\\. Use /roll to join",
            mention(display_name)
        ),
    }
}

pub fn draw_results(channel: &str, result: &DrawResult) -> String {
    let mut text = format!(
        "🎉 *Lottery results* \\[{}\\]\\!\n\n\
         🎲 Winning number: *{}*\n\n\
         🏆 Winners:\n",
        escape_markdown(channel),
        result.winning_number
    );
    for (i, winner) in result.winners.iter().enumerate() {
        text.push_str(&format!(
            "{}\\. {} \\({}, distance {}\\)\n",
            i + 1,
            mention(&winner.display_name),
            winner.number,
            winner.distance
        ));
    }
    text.push_str("\n🎊 Congratulations\\!");
    text
}

pub fn lottery_status(channel: &str, participants: &[(&Participant, UserId)]) -> String {
    if participants.is_empty() {
        return format!(
            "📊 Lottery \\[{}\\]: no participants",
            escape_markdown(channel)
        );
    }

    let mut text = format!(
        "📊 *Lottery status* \\[{}\\]\n\n👥 Participants: {}\n\n",
        escape_markdown(channel),
        participants.len()
    );
    for (i, (participant, _)) in participants.iter().enumerate() {
        text.push_str(&format!(
            "{}\\. {} — {}\n",
            i + 1,
            mention(&participant.display_name),
            participant.number
        ));
    }
    text
}

/// Moderation-group copy of a member report.
pub fn report_notice(display_name: &str, user_id: UserId, text: &str) -> String {
    format!(
        "📣 *Report*\n\n👤 {} \\(ID: {}\\)\n\n{}",
        mention(display_name),
        user_id,
        escape_markdown(text)
    )
}

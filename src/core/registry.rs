//! In-memory user registry.
//!
//! One profile per Telegram user id, created on the first observed event and
//! updated on every subsequent one. Profiles are never removed; moderation
//! toggles flags on them.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use super::UserId;

/// A single community member as observed by the bot.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: UserId,
    /// Last-seen display name; updated whenever the user shows up with one.
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub message_count: u64,
    pub banned: bool,
    pub ban_reason: Option<String>,
    pub banned_at: Option<DateTime<Utc>>,
    pub muted_until: Option<DateTime<Utc>>,
}

impl UserProfile {
    fn new(id: UserId, display_name: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name,
            joined_at: now,
            last_active_at: now,
            message_count: 0,
            banned: false,
            ban_reason: None,
            banned_at: None,
            muted_until: None,
        }
    }
}

/// Aggregate counters over the registry, rendered by `/stats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_users: usize,
    pub active_24h: usize,
    pub active_7d: usize,
    pub total_messages: u64,
    pub banned: usize,
    pub muted: usize,
}

/// Map of every user the bot has ever seen.
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: HashMap<UserId, UserProfile>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create-or-update a profile for an observed event.
    ///
    /// Bumps `message_count` and `last_active_at`; a provided display name
    /// overwrites the stored one (last seen wins).
    pub fn touch(
        &mut self,
        id: UserId,
        display_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> &mut UserProfile {
        let profile = self.users.entry(id).or_insert_with(|| {
            let name = display_name
                .map(str::to_owned)
                .unwrap_or_else(|| format!("id_{id}"));
            UserProfile::new(id, name, now)
        });

        profile.last_active_at = now;
        profile.message_count += 1;
        if let Some(name) = display_name {
            if profile.display_name != name {
                profile.display_name = name.to_owned();
            }
        }
        profile
    }

    pub fn get(&self, id: UserId) -> Option<&UserProfile> {
        self.users.get(&id)
    }

    pub fn get_mut(&mut self, id: UserId) -> Option<&mut UserProfile> {
        self.users.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Resolve a command target: either a numeric id or an `@name`
    /// (case-insensitive, leading `@` optional).
    pub fn resolve(&self, target: &str) -> Option<UserId> {
        let target = target.trim();
        if let Ok(id) = target.parse::<UserId>() {
            return self.users.contains_key(&id).then_some(id);
        }

        let name = target.strip_prefix('@').unwrap_or(target);
        self.users
            .values()
            .find(|p| p.display_name.eq_ignore_ascii_case(name))
            .map(|p| p.id)
    }

    /// Profiles with the ban flag set, ordered by ban time (oldest first).
    pub fn banned_users(&self) -> Vec<&UserProfile> {
        let mut banned: Vec<_> = self.users.values().filter(|p| p.banned).collect();
        banned.sort_by_key(|p| p.banned_at);
        banned
    }

    /// Most active profiles by message count, descending.
    pub fn top_users(&self, limit: usize) -> Vec<&UserProfile> {
        let mut users: Vec<_> = self.users.values().collect();
        users.sort_by(|a, b| b.message_count.cmp(&a.message_count));
        users.truncate(limit);
        users
    }

    pub fn stats(&self, now: DateTime<Utc>) -> RegistryStats {
        let day = Duration::days(1);
        let week = Duration::days(7);
        RegistryStats {
            total_users: self.users.len(),
            active_24h: self
                .users
                .values()
                .filter(|p| now - p.last_active_at <= day)
                .count(),
            active_7d: self
                .users
                .values()
                .filter(|p| now - p.last_active_at <= week)
                .count(),
            total_messages: self.users.values().map(|p| p.message_count).sum(),
            banned: self.users.values().filter(|p| p.banned).count(),
            muted: self
                .users
                .values()
                .filter(|p| p.muted_until.is_some_and(|until| now < until))
                .count(),
        }
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut UserProfile> {
        self.users.values_mut()
    }
}

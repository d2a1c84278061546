//! Ban and mute operations over the registry.
//!
//! Moderation state lives on the user profiles themselves; these operations
//! enforce the two hard rules: the target must exist in the registry, and a
//! privileged user can never be targeted. Mute expiry is swept explicitly
//! rather than cleared as a side effect of reads.

use chrono::{DateTime, Duration, Utc};

use super::registry::UserProfile;
use super::{CommunityState, Rejection, UserId};

impl CommunityState {
    /// Ban a user. Idempotent: re-banning overwrites reason and timestamp.
    ///
    /// Returns a snapshot of the updated profile for rendering and mirroring.
    pub fn ban(
        &mut self,
        target: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, Rejection> {
        let id = self.resolve_unprivileged(target)?;
        let profile = self.registry.get_mut(id).ok_or(Rejection::NotFound)?;
        profile.banned = true;
        profile.ban_reason = Some(reason.unwrap_or_else(|| "not specified".to_owned()));
        profile.banned_at = Some(now);
        tracing::info!(user = id, "user banned");
        Ok(profile.clone())
    }

    /// Lift a ban, clearing reason and timestamp. The user's cooldowns are
    /// dropped too, so the penalty ends with a clean slate.
    pub fn unban(&mut self, target: &str) -> Result<UserProfile, Rejection> {
        let id = self
            .registry
            .resolve(target)
            .ok_or(Rejection::NotFound)?;
        let profile = self.registry.get_mut(id).ok_or(Rejection::NotFound)?;
        if !profile.banned {
            return Err(Rejection::InvalidState("user is not banned".to_owned()));
        }
        profile.banned = false;
        profile.ban_reason = None;
        profile.banned_at = None;
        self.cooldowns.clear(id);
        tracing::info!(user = id, "user unbanned");
        Ok(profile.clone())
    }

    /// Mute a user for `duration`. Idempotent: overwrites any existing mute.
    pub fn mute(
        &mut self,
        target: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, Rejection> {
        let id = self.resolve_unprivileged(target)?;
        let profile = self.registry.get_mut(id).ok_or(Rejection::NotFound)?;
        profile.muted_until = Some(now + duration);
        tracing::info!(user = id, secs = duration.num_seconds(), "user muted");
        Ok(profile.clone())
    }

    /// Lift a mute early. Clears the user's cooldowns like [`unban`](Self::unban).
    pub fn unmute(&mut self, target: &str, now: DateTime<Utc>) -> Result<UserProfile, Rejection> {
        let id = self
            .registry
            .resolve(target)
            .ok_or(Rejection::NotFound)?;
        let profile = self.registry.get_mut(id).ok_or(Rejection::NotFound)?;
        if !profile.muted_until.is_some_and(|until| now < until) {
            return Err(Rejection::InvalidState("user is not muted".to_owned()));
        }
        profile.muted_until = None;
        self.cooldowns.clear(id);
        tracing::info!(user = id, "user unmuted");
        Ok(profile.clone())
    }

    pub fn is_banned(&self, id: UserId) -> bool {
        self.registry.get(id).is_some_and(|p| p.banned)
    }

    /// Pure query: a mute is active iff `now < muted_until`. Expired mutes
    /// stay on the profile until [`sweep_expired_mutes`](Self::sweep_expired_mutes).
    pub fn is_muted(&self, id: UserId, now: DateTime<Utc>) -> bool {
        self.registry
            .get(id)
            .and_then(|p| p.muted_until)
            .is_some_and(|until| now < until)
    }

    /// Clear every expired mute; returns how many were cleared. Idempotent.
    pub fn sweep_expired_mutes(&mut self, now: DateTime<Utc>) -> usize {
        let mut cleared = 0;
        for profile in self.registry.iter_mut() {
            if profile.muted_until.is_some_and(|until| until <= now) {
                profile.muted_until = None;
                cleared += 1;
            }
        }
        cleared
    }

    /// Check that a member may act: not banned, not muted.
    pub fn member_gate(&self, id: UserId, now: DateTime<Utc>) -> Result<(), Rejection> {
        if self.is_banned(id) {
            return Err(Rejection::Banned);
        }
        if let Some(until) = self.registry.get(id).and_then(|p| p.muted_until) {
            if now < until {
                return Err(Rejection::Muted {
                    remaining_secs: (until - now).num_seconds().max(1),
                });
            }
        }
        Ok(())
    }

    /// Resolve a target string and reject privileged targets before any
    /// mutation happens.
    fn resolve_unprivileged(&self, target: &str) -> Result<UserId, Rejection> {
        let id = self
            .registry
            .resolve(target)
            .ok_or(Rejection::NotFound)?;
        if self.role_of(id).is_privileged() {
            return Err(Rejection::PrivilegeViolation);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CoreSettings, Role};

    fn state() -> CommunityState {
        let mut settings = CoreSettings::default();
        settings.admins.insert(100);
        settings.moderators.insert(200);
        CommunityState::new(settings)
    }

    fn seeded() -> (CommunityState, DateTime<Utc>) {
        let mut state = state();
        let now = Utc::now();
        state.registry.touch(1, Some("alice"), now);
        state.registry.touch(100, Some("root"), now);
        state.registry.touch(200, Some("mod"), now);
        (state, now)
    }

    #[test]
    fn test_ban_unban_round_trip() {
        let (mut state, now) = seeded();

        let profile = state.ban("@alice", Some("spam".into()), now).unwrap();
        assert!(profile.banned);
        assert_eq!(profile.ban_reason.as_deref(), Some("spam"));
        assert!(state.is_banned(1));

        let profile = state.unban("1").unwrap();
        assert!(!profile.banned);
        assert!(profile.ban_reason.is_none());
        assert!(profile.banned_at.is_none());
        assert!(!state.is_banned(1));
    }

    #[test]
    fn test_ban_is_idempotent_overwrite() {
        let (mut state, now) = seeded();
        state.ban("1", Some("first".into()), now).unwrap();
        let profile = state
            .ban("1", Some("second".into()), now + Duration::seconds(5))
            .unwrap();
        assert_eq!(profile.ban_reason.as_deref(), Some("second"));
        assert_eq!(profile.banned_at, Some(now + Duration::seconds(5)));
    }

    #[test]
    fn test_ban_missing_reason_gets_placeholder() {
        let (mut state, now) = seeded();
        let profile = state.ban("1", None, now).unwrap();
        assert_eq!(profile.ban_reason.as_deref(), Some("not specified"));
    }

    #[test]
    fn test_unban_requires_active_ban() {
        let (mut state, _) = seeded();
        assert!(matches!(
            state.unban("1"),
            Err(Rejection::InvalidState(_))
        ));
    }

    #[test]
    fn test_privileged_targets_rejected_before_mutation() {
        let (mut state, now) = seeded();

        assert_eq!(
            state.ban("@root", None, now),
            Err(Rejection::PrivilegeViolation)
        );
        assert_eq!(
            state.mute("@mod", Duration::minutes(5), now),
            Err(Rejection::PrivilegeViolation)
        );
        assert!(!state.is_banned(100));
        assert!(!state.is_muted(200, now));
    }

    #[test]
    fn test_unknown_target_not_found() {
        let (mut state, now) = seeded();
        assert_eq!(state.ban("@ghost", None, now), Err(Rejection::NotFound));
        assert_eq!(state.unban("9999"), Err(Rejection::NotFound));
    }

    #[test]
    fn test_mute_expiry_is_pure_and_sweepable() {
        let (mut state, now) = seeded();
        state.mute("1", Duration::seconds(60), now).unwrap();

        assert!(state.is_muted(1, now + Duration::seconds(59)));
        // Pure query at/after expiry: reports unmuted without clearing.
        assert!(!state.is_muted(1, now + Duration::seconds(60)));
        assert!(state.registry.get(1).unwrap().muted_until.is_some());

        let swept = state.sweep_expired_mutes(now + Duration::seconds(60));
        assert_eq!(swept, 1);
        assert!(state.registry.get(1).unwrap().muted_until.is_none());

        // Sweeping again is a no-op.
        assert_eq!(state.sweep_expired_mutes(now + Duration::seconds(61)), 0);
        assert!(!state.is_muted(1, now + Duration::seconds(61)));
    }

    #[test]
    fn test_unmute_requires_active_mute() {
        let (mut state, now) = seeded();
        assert!(matches!(
            state.unmute("1", now),
            Err(Rejection::InvalidState(_))
        ));

        state.mute("1", Duration::minutes(10), now).unwrap();
        let profile = state.unmute("1", now).unwrap();
        assert!(profile.muted_until.is_none());
    }

    #[test]
    fn test_member_gate() {
        let (mut state, now) = seeded();
        assert!(state.member_gate(1, now).is_ok());

        state.mute("1", Duration::seconds(30), now).unwrap();
        assert_eq!(
            state.member_gate(1, now),
            Err(Rejection::Muted { remaining_secs: 30 })
        );
        assert!(state.member_gate(1, now + Duration::seconds(30)).is_ok());

        state.ban("1", None, now).unwrap();
        assert_eq!(state.member_gate(1, now), Err(Rejection::Banned));
    }

    #[test]
    fn test_lifting_a_penalty_resets_cooldowns() {
        use crate::core::ActionKey;

        let (mut state, now) = seeded();
        let interval = Duration::seconds(60);
        state.cooldowns.record(1, ActionKey::Post, now);
        state
            .cooldowns
            .record(1, ActionKey::Guess("main".into()), now);

        state.ban("1", None, now).unwrap();
        state.unban("1").unwrap();
        assert!(state.cooldowns.allow(1, &ActionKey::Post, interval, now).is_ok());
        assert!(state
            .cooldowns
            .allow(1, &ActionKey::Guess("main".into()), interval, now)
            .is_ok());

        state.cooldowns.record(1, ActionKey::Post, now);
        state.mute("1", Duration::minutes(10), now).unwrap();
        state.unmute("1", now).unwrap();
        assert!(state.cooldowns.allow(1, &ActionKey::Post, interval, now).is_ok());
    }

    #[test]
    fn test_roles_resolved_from_settings() {
        let (state, _) = seeded();
        assert_eq!(state.role_of(100), Role::Admin);
        assert_eq!(state.role_of(200), Role::Moderator);
        assert_eq!(state.role_of(1), Role::Member);
    }
}

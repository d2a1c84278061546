//! Per-user action cooldowns.
//!
//! A cooldown is the minimum gap between two actions of the same kind by the
//! same user. The tracker only stores the last permitted action's timestamp;
//! intervals are supplied by the caller because they differ per action kind
//! (post cooldown from config, guess interval per game channel).
//!
//! Comparison is whole-second: an action is permitted once
//! `now - last_action >= interval`, and the reported remaining time is never
//! negative.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use super::UserId;

/// What kind of action a cooldown entry guards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKey {
    /// Posting to the community (reports, publications).
    Post,
    /// A guess attempt in the named game channel.
    Guess(String),
}

/// Last-action timestamps keyed by (user, action kind).
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_action: HashMap<(UserId, ActionKey), DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `user` may perform the action now.
    ///
    /// Returns the remaining whole seconds on denial. Does not mutate; pair
    /// with [`record`](Self::record), or use [`try_consume`](Self::try_consume)
    /// to do both in one step.
    pub fn allow(
        &self,
        user: UserId,
        key: &ActionKey,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), i64> {
        let Some(last) = self.last_action.get(&(user, key.clone())) else {
            return Ok(());
        };

        let elapsed = (now - *last).num_seconds();
        let remaining = interval.num_seconds() - elapsed;
        if remaining > 0 {
            Err(remaining)
        } else {
            Ok(())
        }
    }

    /// Overwrite the last-action timestamp with `now`.
    pub fn record(&mut self, user: UserId, key: ActionKey, now: DateTime<Utc>) {
        self.last_action.insert((user, key), now);
    }

    /// Atomic check-and-record: permits the action and stamps it in one call,
    /// so two rapid events cannot both pass the check before either records.
    pub fn try_consume(
        &mut self,
        user: UserId,
        key: ActionKey,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), i64> {
        self.allow(user, &key, interval, now)?;
        self.record(user, key, now);
        Ok(())
    }

    /// Drop every entry for a user (moderator reset).
    pub fn clear(&mut self, user: UserId) {
        self.last_action.retain(|(id, _), _| *id != user);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_fresh_user_is_allowed() {
        let tracker = CooldownTracker::new();
        let interval = Duration::seconds(60);
        assert!(tracker.allow(1, &ActionKey::Post, interval, t0()).is_ok());
        assert!(tracker
            .allow(1, &ActionKey::Guess("main".into()), interval, t0())
            .is_ok());
    }

    #[test]
    fn test_denied_within_interval_allowed_after() {
        let mut tracker = CooldownTracker::new();
        let interval = Duration::seconds(60);
        let start = t0();

        tracker.record(1, ActionKey::Post, start);

        let denied = tracker.allow(1, &ActionKey::Post, interval, start + Duration::seconds(30));
        assert_eq!(denied, Err(30));

        assert!(tracker
            .allow(1, &ActionKey::Post, interval, start + Duration::seconds(60))
            .is_ok());
        assert!(tracker
            .allow(1, &ActionKey::Post, interval, start + Duration::seconds(61))
            .is_ok());
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut tracker = CooldownTracker::new();
        let interval = Duration::seconds(60);
        let start = t0();

        tracker.record(1, ActionKey::Post, start);

        assert!(tracker
            .allow(1, &ActionKey::Guess("main".into()), interval, start)
            .is_ok());
        assert!(tracker
            .allow(2, &ActionKey::Post, interval, start)
            .is_ok());
    }

    #[test]
    fn test_try_consume_records_on_success_only() {
        let mut tracker = CooldownTracker::new();
        let interval = Duration::seconds(60);
        let start = t0();
        let key = ActionKey::Guess("main".into());

        assert!(tracker
            .try_consume(1, key.clone(), interval, start)
            .is_ok());
        // Second call in the same instant is denied and must not move the stamp.
        assert_eq!(
            tracker.try_consume(1, key.clone(), interval, start + Duration::seconds(10)),
            Err(50)
        );
        assert_eq!(
            tracker.try_consume(1, key, interval, start + Duration::seconds(59)),
            Err(1)
        );
    }

    #[test]
    fn test_clear_resets_all_kinds() {
        let mut tracker = CooldownTracker::new();
        let interval = Duration::seconds(60);
        let start = t0();

        tracker.record(1, ActionKey::Post, start);
        tracker.record(1, ActionKey::Guess("main".into()), start);
        tracker.clear(1);

        assert!(tracker.allow(1, &ActionKey::Post, interval, start).is_ok());
        assert!(tracker
            .allow(1, &ActionKey::Guess("main".into()), interval, start)
            .is_ok());
    }
}

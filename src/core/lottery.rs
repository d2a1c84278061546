//! Number-lottery game channel.
//!
//! Every participant gets a number in [1, 9999], unique best-effort: up to
//! 100 random draws before accepting a collision (logged, not fatal). A draw
//! picks one winning number and ranks participants by absolute distance to
//! it, ties broken by join order.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;

use super::{Rejection, UserId};

const NUMBER_RANGE: std::ops::RangeInclusive<u32> = 1..=9999;
const ASSIGN_ATTEMPTS: usize = 100;

/// Winners are clamped to this many per draw.
pub const MAX_WINNERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub display_name: String,
    pub number: u32,
    pub joined_at: DateTime<Utc>,
}

/// Result of joining: the number plus whether it already existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub number: u32,
    pub already_joined: bool,
    pub total_participants: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotteryWinner {
    pub user_id: UserId,
    pub display_name: String,
    pub number: u32,
    pub distance: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawResult {
    pub winning_number: u32,
    pub winners: Vec<LotteryWinner>,
}

/// One independently-stateful lottery instance.
#[derive(Debug, Default)]
pub struct LotteryChannel {
    participants: HashMap<UserId, Participant>,
    /// Join order, used as the deterministic tie-break in draws.
    order: Vec<UserId>,
}

impl LotteryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Join the lottery; idempotent — an existing participant gets their
    /// original number back.
    pub fn join(
        &mut self,
        user_id: UserId,
        display_name: &str,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> JoinOutcome {
        if let Some(existing) = self.participants.get(&user_id) {
            return JoinOutcome {
                number: existing.number,
                already_joined: true,
                total_participants: self.participants.len(),
            };
        }

        let number = self.assign_number(rng);
        self.participants.insert(
            user_id,
            Participant {
                display_name: display_name.to_owned(),
                number,
                joined_at: now,
            },
        );
        self.order.push(user_id);

        JoinOutcome {
            number,
            already_joined: false,
            total_participants: self.participants.len(),
        }
    }

    pub fn my_number(&self, user_id: UserId) -> Option<u32> {
        self.participants.get(&user_id).map(|p| p.number)
    }

    /// Participants in join order, for the status listing.
    pub fn participants(&self) -> Vec<(&Participant, UserId)> {
        self.order
            .iter()
            .filter_map(|id| self.participants.get(id).map(|p| (p, *id)))
            .collect()
    }

    /// Run a draw: one winning number, participants ranked by distance.
    ///
    /// `count` is clamped to [1, MAX_WINNERS]; there must be at least that
    /// many participants. Does not mutate — the admin resets explicitly.
    pub fn draw(&self, count: usize, rng: &mut impl Rng) -> Result<DrawResult, Rejection> {
        let count = count.clamp(1, MAX_WINNERS);
        if self.participants.len() < count {
            return Err(Rejection::InvalidState(format!(
                "insufficient participants: {} joined, {count} winners requested",
                self.participants.len()
            )));
        }

        let winning_number = rng.gen_range(NUMBER_RANGE);

        let mut ranked: Vec<LotteryWinner> = self
            .order
            .iter()
            .filter_map(|id| self.participants.get(id).map(|p| (*id, p)))
            .map(|(user_id, p)| LotteryWinner {
                user_id,
                display_name: p.display_name.clone(),
                number: p.number,
                distance: p.number.abs_diff(winning_number),
            })
            .collect();
        // Stable sort over the join-ordered list keeps ties deterministic.
        ranked.sort_by_key(|w| w.distance);
        ranked.truncate(count);

        Ok(DrawResult {
            winning_number,
            winners: ranked,
        })
    }

    /// Drop all participants; returns how many were removed.
    pub fn reset(&mut self) -> usize {
        let count = self.participants.len();
        self.participants.clear();
        self.order.clear();
        count
    }

    fn assign_number(&self, rng: &mut impl Rng) -> u32 {
        let taken: std::collections::HashSet<u32> =
            self.participants.values().map(|p| p.number).collect();

        for _ in 0..ASSIGN_ATTEMPTS {
            let candidate = rng.gen_range(NUMBER_RANGE);
            if !taken.contains(&candidate) {
                return candidate;
            }
        }

        // Accepted limitation: after the retry budget a duplicate may slip in.
        let fallback = rng.gen_range(NUMBER_RANGE);
        tracing::warn!(
            participants = self.participants.len(),
            number = fallback,
            "lottery number assignment fell back to a possibly-colliding value"
        );
        fallback
    }
}

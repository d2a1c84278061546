//! Word-guessing game channel.
//!
//! One `GameChannel` per configured game name. A channel is `Idle` until an
//! admin starts a round, which picks one word from the bank uniformly at
//! random. Guesses are normalized before comparison; the first exact match
//! wins, closes the round and keeps the word around for the summary.

use chrono::Duration;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

use super::Rejection;

/// A bank entry: the prompt shown when the word is in play, plus optional
/// Telegram media file ids sent alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordEntry {
    pub description: String,
    pub media: Vec<String>,
}

/// Everything a round announcement needs without revealing the word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStart {
    pub description: String,
    pub media: Vec<String>,
    pub interval_secs: i64,
}

/// The word and winners of a finished (or force-stopped) round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    pub word: Option<String>,
    pub winners: Vec<String>,
}

/// Result of a single guess attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    Correct { word: String },
    Wrong { word: String },
}

/// One independently-stateful instance of the word game.
#[derive(Debug)]
pub struct GameChannel {
    pub name: String,
    word_bank: BTreeMap<String, WordEntry>,
    current_word: Option<String>,
    active: bool,
    winners: Vec<String>,
    attempt_interval: Duration,
    /// Status line shown by the info command while no round is running.
    notice: String,
}

/// Comparison form of a word: lowercased, trimmed, `ё` folded to `е`.
pub fn normalize(word: &str) -> String {
    word.trim().to_lowercase().replace('ё', "е")
}

impl GameChannel {
    pub fn new(name: impl Into<String>, attempt_interval_secs: i64) -> Self {
        Self {
            name: name.into(),
            word_bank: BTreeMap::new(),
            current_word: None,
            active: false,
            winners: Vec::new(),
            attempt_interval: Duration::seconds(attempt_interval_secs),
            notice: "No contest is running right now".to_owned(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn attempt_interval(&self) -> Duration {
        self.attempt_interval
    }

    pub fn set_attempt_interval(&mut self, minutes: i64) {
        self.attempt_interval = Duration::minutes(minutes.max(1));
    }

    pub fn word_count(&self) -> usize {
        self.word_bank.len()
    }

    pub fn winners(&self) -> &[String] {
        &self.winners
    }

    /// Status line for the info command: the current word's prompt while a
    /// round runs, the last summary notice otherwise.
    pub fn info(&self) -> RoundStart {
        if let Some(entry) = self
            .active
            .then_some(())
            .and_then(|()| self.current_word.as_ref())
            .and_then(|w| self.word_bank.get(w))
        {
            RoundStart {
                description: entry.description.clone(),
                media: entry.media.clone(),
                interval_secs: self.attempt_interval.num_seconds(),
            }
        } else {
            RoundStart {
                description: self.notice.clone(),
                media: Vec::new(),
                interval_secs: self.attempt_interval.num_seconds(),
            }
        }
    }

    /// Add a word to the bank (normalized). Overwrites an existing entry.
    pub fn add_word(&mut self, word: &str, description: Option<String>) -> String {
        let word = normalize(word);
        let description =
            description.unwrap_or_else(|| format!("Guess the word ({} letters)", word.chars().count()));
        self.word_bank.insert(
            word.clone(),
            WordEntry {
                description,
                media: Vec::new(),
            },
        );
        word
    }

    pub fn edit_word(&mut self, word: &str, description: String) -> Result<(), Rejection> {
        let word = normalize(word);
        match self.word_bank.get_mut(&word) {
            Some(entry) => {
                entry.description = description;
                Ok(())
            }
            None => Err(Rejection::InvalidState(format!(
                "word '{word}' is not in the bank"
            ))),
        }
    }

    /// Attach a media file id to a word; returns the new media count.
    pub fn attach_media(&mut self, word: &str, file_id: String) -> Result<usize, Rejection> {
        let word = normalize(word);
        match self.word_bank.get_mut(&word) {
            Some(entry) => {
                entry.media.push(file_id);
                Ok(entry.media.len())
            }
            None => Err(Rejection::InvalidState(format!(
                "word '{word}' is not in the bank"
            ))),
        }
    }

    /// Start a new round: pick a word uniformly at random, clear winners.
    ///
    /// Valid only while idle; fails with no words available when the bank is
    /// empty (reported, not retried).
    pub fn start_round(&mut self, rng: &mut impl Rng) -> Result<RoundStart, Rejection> {
        if self.active {
            return Err(Rejection::InvalidState(
                "a round is already running".to_owned(),
            ));
        }
        let keys: Vec<&String> = self.word_bank.keys().collect();
        let Some(word) = keys.choose(rng).map(|w| (*w).clone()) else {
            return Err(Rejection::InvalidState("no words available".to_owned()));
        };

        let entry = &self.word_bank[&word];
        let start = RoundStart {
            description: entry.description.clone(),
            media: entry.media.clone(),
            interval_secs: self.attempt_interval.num_seconds(),
        };

        self.current_word = Some(word);
        self.winners.clear();
        self.active = true;
        self.notice = "A contest is running, send your guesses".to_owned();
        Ok(start)
    }

    /// Compare a guess against the current word.
    ///
    /// Valid only while a round is active. On a match the guesser is appended
    /// to the winners and the round closes; the word stays set for the
    /// post-round summary. Cooldown checks are the caller's job and happen
    /// before this touches any state.
    pub fn guess(&mut self, display_name: &str, text: &str) -> Result<GuessOutcome, Rejection> {
        if !self.active {
            return Err(Rejection::InvalidState(
                "no active round, wait for the next contest".to_owned(),
            ));
        }
        // Invariant: current_word is always set while active.
        let word = self
            .current_word
            .clone()
            .ok_or_else(|| Rejection::InvalidState("no word selected".to_owned()))?;

        if normalize(text) == word {
            self.winners.push(display_name.to_owned());
            self.active = false;
            self.notice = format!("@{display_name} guessed the word '{word}'. Wait for the next contest.");
            Ok(GuessOutcome::Correct { word })
        } else {
            Ok(GuessOutcome::Wrong { word })
        }
    }

    /// Force-close the active round, keeping word and winners for the summary.
    pub fn stop_round(&mut self) -> Result<RoundSummary, Rejection> {
        if !self.active {
            return Err(Rejection::InvalidState("no active round".to_owned()));
        }
        self.active = false;
        let summary = RoundSummary {
            word: self.current_word.clone(),
            winners: self.winners.clone(),
        };
        self.notice = match summary.word.as_deref() {
            Some(word) => format!("Last contest finished, the word was '{word}'"),
            None => "Last contest finished".to_owned(),
        };
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_normalize_folds_case_space_and_yo() {
        assert_eq!(normalize(" ALPHA "), "alpha");
        assert_eq!(normalize("Ёлка"), "елка");
        assert_eq!(normalize("budapest"), "budapest");
    }

    #[test]
    fn test_start_round_requires_words() {
        let mut game = GameChannel::new("main", 60);
        let err = game.start_round(&mut rng()).unwrap_err();
        assert!(matches!(err, Rejection::InvalidState(_)));
        assert!(!game.is_active());
    }

    #[test]
    fn test_start_round_picks_from_bank() {
        let mut game = GameChannel::new("main", 60);
        game.add_word("alpha", None);
        game.add_word("beta", None);

        game.start_round(&mut rng()).unwrap();
        assert!(game.is_active());
        let word = game.current_word.clone().unwrap();
        assert!(word == "alpha" || word == "beta");
    }

    #[test]
    fn test_start_round_rejected_while_active() {
        let mut game = GameChannel::new("main", 60);
        game.add_word("alpha", None);
        game.start_round(&mut rng()).unwrap();
        assert!(game.start_round(&mut rng()).is_err());
    }

    #[test]
    fn test_guess_normalizes_and_closes_round() {
        let mut game = GameChannel::new("main", 60);
        game.add_word("alpha", None);
        game.start_round(&mut rng()).unwrap();

        let outcome = game.guess("alice", "ALPHA ").unwrap();
        assert_eq!(
            outcome,
            GuessOutcome::Correct {
                word: "alpha".into()
            }
        );
        assert!(!game.is_active());
        assert_eq!(game.winners(), ["alice"]);
        // Word is retained for the post-round summary.
        assert_eq!(game.current_word.as_deref(), Some("alpha"));
    }

    #[test]
    fn test_second_guess_after_win_is_rejected() {
        let mut game = GameChannel::new("main", 60);
        game.add_word("budapest", None);
        game.start_round(&mut rng()).unwrap();

        game.guess("a", "Budapest").unwrap();
        let err = game.guess("b", "budapest").unwrap_err();
        assert!(matches!(err, Rejection::InvalidState(_)));
        assert_eq!(game.winners(), ["a"]);
    }

    #[test]
    fn test_wrong_guess_keeps_round_open() {
        let mut game = GameChannel::new("main", 60);
        game.add_word("alpha", None);
        game.start_round(&mut rng()).unwrap();

        let outcome = game.guess("bob", "beta").unwrap();
        assert!(matches!(outcome, GuessOutcome::Wrong { .. }));
        assert!(game.is_active());
        assert!(game.winners().is_empty());
    }

    #[test]
    fn test_stop_round_preserves_summary() {
        let mut game = GameChannel::new("main", 60);
        game.add_word("alpha", None);
        game.start_round(&mut rng()).unwrap();
        game.guess("alice", "alpha").unwrap();

        // Already closed by the win.
        assert!(game.stop_round().is_err());

        game.start_round(&mut rng()).unwrap();
        let summary = game.stop_round().unwrap();
        assert_eq!(summary.word.as_deref(), Some("alpha"));
        assert!(summary.winners.is_empty());
    }

    #[test]
    fn test_new_round_resets_winners() {
        let mut game = GameChannel::new("main", 60);
        game.add_word("alpha", None);
        game.start_round(&mut rng()).unwrap();
        game.guess("alice", "alpha").unwrap();
        assert_eq!(game.winners().len(), 1);

        game.start_round(&mut rng()).unwrap();
        assert!(game.winners().is_empty());
    }

    #[test]
    fn test_edit_and_media_require_known_word() {
        let mut game = GameChannel::new("main", 60);
        assert!(game.edit_word("ghost", "x".into()).is_err());
        assert!(game.attach_media("ghost", "file".into()).is_err());

        game.add_word("Alpha", Some("first letter".into()));
        game.edit_word("ALPHA", "the first letter".into()).unwrap();
        assert_eq!(game.attach_media("alpha", "file1".into()).unwrap(), 1);
        assert_eq!(game.attach_media("alpha", "file2".into()).unwrap(), 2);
    }
}

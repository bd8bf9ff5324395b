use arena_types::{Match, MatchStatus};
use chrono::{DateTime, Duration, Utc};

use crate::MatchStateMachine;

/// Age limits after which match records are deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchReaper {
    pub waiting_ttl: Duration,  // Nobody joined
    pub playing_ttl: Duration,  // Both players vanished mid-match
    pub finished_ttl: Duration, // Kept around for late result views
}

impl Default for MatchReaper {
    fn default() -> Self {
        Self {
            waiting_ttl: Duration::minutes(30),
            playing_ttl: Duration::hours(2),
            finished_ttl: Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapCutoffs {
    pub waiting_before: DateTime<Utc>,
    pub playing_before: DateTime<Utc>,
    pub finished_before: DateTime<Utc>,
}

impl MatchReaper {
    pub fn new(waiting_ttl: Duration, playing_ttl: Duration, finished_ttl: Duration) -> Self {
        Self {
            waiting_ttl,
            playing_ttl,
            finished_ttl,
        }
    }

    pub fn ttl_for(&self, status: MatchStatus) -> Duration {
        match status {
            MatchStatus::Waiting => self.waiting_ttl,
            MatchStatus::Playing => self.playing_ttl,
            MatchStatus::Finished => self.finished_ttl,
        }
    }

    /// Creation-time cutoffs per status; records created earlier are stale
    pub fn cutoffs(&self, now: DateTime<Utc>) -> ReapCutoffs {
        ReapCutoffs {
            waiting_before: now - self.ttl_for(MatchStatus::Waiting),
            playing_before: now - self.ttl_for(MatchStatus::Playing),
            finished_before: now - self.ttl_for(MatchStatus::Finished),
        }
    }

    pub fn is_stale(&self, game: &Match, now: DateTime<Utc>) -> bool {
        match game.created_at_utc() {
            Some(created) => now.signed_duration_since(created) > self.ttl_for(game.status),
            // Unparseable timestamps can never become fresh
            None => true,
        }
    }

    pub fn reason_for(status: MatchStatus) -> &'static str {
        match status {
            MatchStatus::Waiting => "No opponent joined in time",
            MatchStatus::Playing => "Match exceeded maximum duration",
            MatchStatus::Finished => "Finished match expired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewMatch, new_waiting_match};
    use arena_types::PlayerSlot;

    fn match_created_at(created: DateTime<Utc>) -> Match {
        new_waiting_match(
            "old".to_string(),
            "OLD000".to_string(),
            NewMatch {
                host: PlayerSlot::new("u", "U"),
                questions: Vec::new(),
                mode: "all".to_string(),
                region: "global".to_string(),
                private: false,
            },
            created,
        )
    }

    #[test]
    fn test_default_configuration() {
        let reaper = MatchReaper::default();
        assert_eq!(reaper.waiting_ttl, Duration::minutes(30));
        assert_eq!(reaper.playing_ttl, Duration::hours(2));
        assert_eq!(reaper.finished_ttl, Duration::hours(24));
    }

    #[test]
    fn test_stale_per_status() {
        let reaper = MatchReaper::default();
        let now = Utc::now();
        let mut game = match_created_at(now - Duration::hours(1));

        assert!(reaper.is_stale(&game, now));

        game.status = MatchStatus::Playing;
        assert!(!reaper.is_stale(&game, now));

        game.status = MatchStatus::Finished;
        assert!(!reaper.is_stale(&game, now));
        assert!(reaper.is_stale(&game, now + Duration::hours(24)));
    }

    #[test]
    fn test_bad_timestamp_is_stale() {
        let mut game = match_created_at(Utc::now());
        game.created_at = "yesterday".to_string();
        assert!(MatchReaper::default().is_stale(&game, Utc::now()));
    }

    #[test]
    fn test_cutoffs() {
        let reaper = MatchReaper::new(Duration::minutes(1), Duration::minutes(2), Duration::minutes(3));
        let now = Utc::now();
        let cutoffs = reaper.cutoffs(now);
        assert_eq!(cutoffs.waiting_before, now - Duration::minutes(1));
        assert_eq!(cutoffs.playing_before, now - Duration::minutes(2));
        assert_eq!(cutoffs.finished_before, now - Duration::minutes(3));
    }
}

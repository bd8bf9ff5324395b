use std::collections::HashSet;
use std::sync::Arc;

use arena_core::{
    DEFAULT_MODE, DEFAULT_REGION, MatchStateMachine, NewMatch, QuestionBank, generate_code,
    mode_filter, new_waiting_match,
};
use arena_persistence::MatchRepository;
use arena_types::{
    ArenaError, FieldError, Filter, Match, MatchRole, MatchStatus, MatchTicket, PlayerSlot, Seat,
};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MatchSettings;
use crate::validation::{validate_code, validate_display_name};

// Code lookups race other joiners; a fresh read settles it quickly
const JOIN_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("{}", .0.message)]
    InvalidField(FieldError),
    #[error("No waiting match with code {0}")]
    CodeNotFound(String),
    #[error("No questions available for mode {0}")]
    NoQuestions(String),
    #[error(transparent)]
    Rules(#[from] ArenaError),
    #[error("Match store unavailable: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl From<FieldError> for MatchmakingError {
    fn from(error: FieldError) -> Self {
        MatchmakingError::InvalidField(error)
    }
}

/// A ticket plus the match as it was written.
#[derive(Debug, Clone)]
pub struct Matched {
    pub ticket: MatchTicket,
    pub game: Match,
}

impl Matched {
    fn new(game: Match, role: MatchRole, seat: Seat) -> Self {
        Self {
            ticket: MatchTicket {
                match_id: game.id.clone(),
                code: game.code.clone(),
                role,
                seat,
            },
            game,
        }
    }
}

/// Pairs players through shared waiting records in the match store.
pub struct Matchmaker {
    matches: MatchRepository,
    bank: Arc<QuestionBank>,
    settings: MatchSettings,
}

impl Matchmaker {
    pub fn new(matches: MatchRepository, bank: Arc<QuestionBank>, settings: MatchSettings) -> Self {
        Self {
            matches,
            bank,
            settings,
        }
    }

    /// Claim the oldest fresh waiting match, or open a new one.
    pub async fn find_match(
        &self,
        uid: &str,
        display_name: &str,
        mode: Option<&str>,
        region: Option<&str>,
    ) -> Result<Matched, MatchmakingError> {
        let name = validate_display_name(display_name)?;
        let now = Utc::now();

        let candidates = self
            .matches
            .find_waiting(
                self.settings.candidate_limit,
                uid,
                now - self.settings.freshness_window,
                mode,
                region,
            )
            .await?;
        debug!("{} waiting candidates for {}", candidates.len(), uid);

        for mut candidate in candidates {
            // The query already filters these; a clock edge can still slip one through
            if candidate.player1.uid == uid
                || !candidate.is_fresh(self.settings.freshness_window, now)
            {
                continue;
            }
            if let Err(e) = candidate.join(PlayerSlot::new(uid, name.clone())) {
                debug!("Skipping match {}: {}", candidate.id, e);
                continue;
            }

            if self.matches.compare_and_swap(&mut candidate).await? {
                info!("Player {} joined match {}", uid, candidate.id);
                return Ok(Matched::new(candidate, MatchRole::Joined, Seat::Player2));
            }
            debug!("Lost the race for match {}", candidate.id);
        }

        let mode = mode.unwrap_or(DEFAULT_MODE);
        let region = region.unwrap_or(DEFAULT_REGION);
        let game = self.open_match(uid, &name, mode, region, false).await?;
        Ok(Matched::new(game, MatchRole::Created, Seat::Player1))
    }

    /// Open a match that only players holding its code can join.
    pub async fn create_private_match(
        &self,
        uid: &str,
        display_name: &str,
        mode: Option<&str>,
    ) -> Result<Matched, MatchmakingError> {
        let name = validate_display_name(display_name)?;
        let mode = mode.unwrap_or(DEFAULT_MODE);
        let game = self
            .open_match(uid, &name, mode, DEFAULT_REGION, true)
            .await?;
        Ok(Matched::new(game, MatchRole::Created, Seat::Player1))
    }

    pub async fn join_by_code(
        &self,
        uid: &str,
        display_name: &str,
        code: &str,
    ) -> Result<Matched, MatchmakingError> {
        let name = validate_display_name(display_name)?;
        let code = validate_code(code)?;

        for _ in 0..JOIN_ATTEMPTS {
            let Some(mut game) = self.matches.find_waiting_by_code(&code).await? else {
                return Err(MatchmakingError::CodeNotFound(code));
            };

            game.join(PlayerSlot::new(uid, name.clone()))?;

            if self.matches.compare_and_swap(&mut game).await? {
                info!("Player {} joined match {} by code", uid, game.id);
                return Ok(Matched::new(game, MatchRole::Joined, Seat::Player2));
            }
            debug!("Version conflict joining {}, retrying", code);
        }

        warn!("Gave up joining {} after {} attempts", code, JOIN_ATTEMPTS);
        Err(MatchmakingError::CodeNotFound(code))
    }

    /// Withdraw a waiting match the caller opened. Returns whether it was deleted.
    pub async fn cancel_search(&self, uid: &str, match_id: &str) -> Result<bool, MatchmakingError> {
        let Some(game) = self.matches.get(match_id).await? else {
            return Ok(false);
        };

        if game.player1.uid != uid {
            return Err(ArenaError::NotInMatch.into());
        }
        if game.status != MatchStatus::Waiting {
            return Ok(false);
        }

        let deleted = self.matches.delete_if_version(match_id, game.version).await?;
        if deleted {
            info!("Player {} cancelled match {}", uid, match_id);
        }
        Ok(deleted)
    }

    pub async fn count_by_status(&self, status: MatchStatus) -> anyhow::Result<u64> {
        self.matches.count_by_status(status).await
    }

    async fn open_match(
        &self,
        uid: &str,
        name: &str,
        mode: &str,
        region: &str,
        private: bool,
    ) -> Result<Match, MatchmakingError> {
        let questions = self.bank.random_questions(
            self.settings.questions_per_match,
            mode_filter(mode),
            Filter::Any,
            &HashSet::new(),
        );
        if questions.is_empty() {
            return Err(MatchmakingError::NoQuestions(mode.to_string()));
        }

        let code = generate_code(&mut rand::thread_rng());
        let game = new_waiting_match(
            Uuid::new_v4().to_string(),
            code,
            NewMatch {
                host: PlayerSlot::new(uid, name),
                questions,
                mode: mode.to_string(),
                region: region.to_string(),
                private,
            },
            Utc::now(),
        );

        self.matches.create(&game).await?;
        info!(
            "Player {} opened {} match {} ({})",
            uid,
            if private { "private" } else { "public" },
            game.id,
            game.code
        );
        Ok(game)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_persistence::connection::connect_to_memory_database;
    use arena_types::{Category, Difficulty, QuestionSnapshot};
    use migration::{Migrator, MigratorTrait};

    fn test_bank() -> Arc<QuestionBank> {
        let questions = (0..12)
            .map(|i| QuestionSnapshot {
                id: format!("q{}", i),
                prompt: format!("Question {}?", i),
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_index: 0,
                category: if i % 2 == 0 {
                    Category::OldTestament
                } else {
                    Category::Miracles
                },
                difficulty: Difficulty::Easy,
                reference: String::new(),
            })
            .collect();
        Arc::new(QuestionBank::new(questions))
    }

    async fn setup() -> (Matchmaker, MatchRepository) {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let repo = MatchRepository::new(db);
        let matchmaker = Matchmaker::new(repo.clone(), test_bank(), MatchSettings::default());
        (matchmaker, repo)
    }

    #[tokio::test]
    async fn test_first_player_creates_second_joins() {
        let (matchmaker, repo) = setup().await;

        let first = matchmaker.find_match("alice", "Alice", None, None).await.unwrap();
        assert_eq!(first.ticket.role, MatchRole::Created);
        assert_eq!(first.ticket.seat, Seat::Player1);
        assert_eq!(first.game.questions.len(), 10);

        let second = matchmaker.find_match("bob", "Bob", None, None).await.unwrap();
        assert_eq!(second.ticket.role, MatchRole::Joined);
        assert_eq!(second.ticket.match_id, first.ticket.match_id);

        let stored = repo.get(&first.ticket.match_id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Playing);
        assert_eq!(stored.player2.unwrap().uid, "bob");
    }

    fn waiting_match(host: &str, created: chrono::DateTime<Utc>) -> Match {
        new_waiting_match(
            Uuid::new_v4().to_string(),
            "OLD000".to_string(),
            NewMatch {
                host: PlayerSlot::new(host, host),
                questions: test_bank().random_questions(
                    3,
                    Filter::Any,
                    Filter::Any,
                    &HashSet::new(),
                ),
                mode: DEFAULT_MODE.to_string(),
                region: DEFAULT_REGION.to_string(),
                private: false,
            },
            created,
        )
    }

    #[tokio::test]
    async fn test_stale_backlog_does_not_hide_fresh_match() {
        let (matchmaker, repo) = setup().await;
        let old = Utc::now() - chrono::Duration::minutes(10);

        // A full page of abandoned searches, older than the freshness window
        for i in 0..MatchSettings::default().candidate_limit {
            repo.create(&waiting_match(&format!("ghost{}", i), old))
                .await
                .unwrap();
        }

        let alice = matchmaker.find_match("alice", "Alice", None, None).await.unwrap();
        assert_eq!(alice.ticket.role, MatchRole::Created);

        let bob = matchmaker.find_match("bob", "Bob", None, None).await.unwrap();
        assert_eq!(bob.ticket.role, MatchRole::Joined);
        assert_eq!(bob.ticket.match_id, alice.ticket.match_id);
    }

    #[tokio::test]
    async fn test_stale_candidate_is_skipped() {
        let (matchmaker, repo) = setup().await;
        let stale = waiting_match("ghost", Utc::now() - chrono::Duration::minutes(6));
        repo.create(&stale).await.unwrap();

        let found = matchmaker.find_match("bob", "Bob", None, None).await.unwrap();
        assert_eq!(found.ticket.role, MatchRole::Created);
        assert_ne!(found.ticket.match_id, stale.id);

        let untouched = repo.get(&stale.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, MatchStatus::Waiting);
        assert!(untouched.player2.is_none());
    }

    #[tokio::test]
    async fn test_never_joins_own_match() {
        let (matchmaker, _repo) = setup().await;

        let first = matchmaker.find_match("alice", "Alice", None, None).await.unwrap();
        let again = matchmaker.find_match("alice", "Alice", None, None).await.unwrap();

        assert_eq!(again.ticket.role, MatchRole::Created);
        assert_ne!(again.ticket.match_id, first.ticket.match_id);
        assert_eq!(again.game.player1.uid, "alice");
    }

    #[tokio::test]
    async fn test_mode_limits_questions_and_pairing() {
        let (matchmaker, _repo) = setup().await;

        let miracles = matchmaker
            .find_match("alice", "Alice", Some("miracles"), None)
            .await
            .unwrap();
        assert_eq!(miracles.game.questions.len(), 6);
        assert!(
            miracles
                .game
                .questions
                .iter()
                .all(|q| q.category == Category::Miracles)
        );

        // Different mode does not pair
        let other = matchmaker
            .find_match("bob", "Bob", Some("old-testament"), None)
            .await
            .unwrap();
        assert_eq!(other.ticket.role, MatchRole::Created);

        let same = matchmaker
            .find_match("carol", "Carol", Some("miracles"), None)
            .await
            .unwrap();
        assert_eq!(same.ticket.match_id, miracles.ticket.match_id);
    }

    #[tokio::test]
    async fn test_private_match_hidden_from_search() {
        let (matchmaker, _repo) = setup().await;

        let private = matchmaker
            .create_private_match("alice", "Alice", None)
            .await
            .unwrap();
        let found = matchmaker.find_match("bob", "Bob", None, None).await.unwrap();
        assert_ne!(found.ticket.match_id, private.ticket.match_id);

        let joined = matchmaker
            .join_by_code("carol", "Carol", &private.ticket.code.to_lowercase())
            .await
            .unwrap();
        assert_eq!(joined.ticket.match_id, private.ticket.match_id);
        assert_eq!(joined.ticket.seat, Seat::Player2);
    }

    #[tokio::test]
    async fn test_join_by_code_errors() {
        let (matchmaker, _repo) = setup().await;

        let created = matchmaker
            .create_private_match("alice", "Alice", None)
            .await
            .unwrap();

        let own = matchmaker
            .join_by_code("alice", "Alice", &created.ticket.code)
            .await;
        assert!(matches!(
            own,
            Err(MatchmakingError::Rules(ArenaError::CannotJoinOwnMatch))
        ));

        let missing = matchmaker.join_by_code("bob", "Bob", "ZZZZZZ").await;
        assert!(matches!(missing, Err(MatchmakingError::CodeNotFound(_))));

        let malformed = matchmaker.join_by_code("bob", "Bob", "abc").await;
        assert!(matches!(malformed, Err(MatchmakingError::InvalidField(_))));
    }

    #[tokio::test]
    async fn test_invalid_name_rejected_before_store() {
        let (matchmaker, _repo) = setup().await;

        let result = matchmaker.find_match("alice", "   ", None, None).await;
        assert!(matches!(result, Err(MatchmakingError::InvalidField(_))));
        assert_eq!(
            matchmaker.count_by_status(MatchStatus::Waiting).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_cancel_search() {
        let (matchmaker, repo) = setup().await;

        let created = matchmaker.find_match("alice", "Alice", None, None).await.unwrap();
        let id = created.ticket.match_id;

        let stranger = matchmaker.cancel_search("bob", &id).await;
        assert!(matches!(
            stranger,
            Err(MatchmakingError::Rules(ArenaError::NotInMatch))
        ));

        assert!(matchmaker.cancel_search("alice", &id).await.unwrap());
        assert!(repo.get(&id).await.unwrap().is_none());

        // Already gone
        assert!(!matchmaker.cancel_search("alice", &id).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_after_join_is_noop() {
        let (matchmaker, repo) = setup().await;

        let created = matchmaker.find_match("alice", "Alice", None, None).await.unwrap();
        matchmaker.find_match("bob", "Bob", None, None).await.unwrap();

        let id = created.ticket.match_id;
        assert!(!matchmaker.cancel_search("alice", &id).await.unwrap());
        assert!(repo.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_mode_has_no_questions() {
        let (matchmaker, _repo) = setup().await;

        let result = matchmaker
            .find_match("alice", "Alice", Some("psalms-proverbs"), None)
            .await;
        assert!(matches!(result, Err(MatchmakingError::NoQuestions(_))));
    }
}

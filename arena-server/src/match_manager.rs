use std::sync::Arc;

use arena_core::{Advance, AnswerOutcome, MatchEvent, MatchReaper, MatchStateMachine};
use arena_persistence::{MatchRepository, UserRepository};
use arena_types::{AnswerChoice, ArenaError, Match, MatchId, MatchStatus, MatchView, Seat};
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::MatchSettings;

const CHANNEL_CAPACITY: usize = 64;

// Only the two players write a match, so conflicts settle within a few rounds
const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Rules(#[from] ArenaError),
    #[error("Match {0} kept changing during the write")]
    Contention(MatchId),
    #[error("Match store unavailable: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Drives live matches: answer writes, pointer advancement, deadlines and
/// fan-out of every persisted change to the match's watchers.
pub struct MatchManager {
    matches: MatchRepository,
    users: UserRepository,
    channels: DashMap<MatchId, broadcast::Sender<MatchEvent>>,
    settings: MatchSettings,
}

impl MatchManager {
    pub fn new(matches: MatchRepository, users: UserRepository, settings: MatchSettings) -> Self {
        Self {
            matches,
            users,
            channels: DashMap::new(),
            settings,
        }
    }

    pub fn subscribe(&self, match_id: &str) -> broadcast::Receiver<MatchEvent> {
        self.channels
            .entry(match_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    fn publish(&self, event: MatchEvent) {
        if let Some(sender) = self.channels.get(event.match_id()) {
            // No receivers is fine, the view is re-read on watch
            let _ = sender.send(event);
        }
    }

    async fn load(&self, match_id: &str) -> Result<Match, SyncError> {
        self.matches
            .get(match_id)
            .await?
            .ok_or_else(|| {
                ArenaError::MatchNotFound {
                    match_id: match_id.to_string(),
                }
                .into()
            })
    }

    pub async fn view(&self, match_id: &str) -> Result<Option<MatchView>, SyncError> {
        let game = self.matches.get(match_id).await?;
        Ok(game.as_ref().map(MatchView::from))
    }

    /// Subscribe, then read, so no change between the two is missed.
    pub async fn watch(
        &self,
        match_id: &str,
    ) -> Result<(MatchView, broadcast::Receiver<MatchEvent>), SyncError> {
        let receiver = self.subscribe(match_id);
        let game = self.load(match_id).await?;
        Ok((MatchView::from(&game), receiver))
    }

    pub fn match_created(&self, game: &Match) {
        self.publish(MatchEvent::Updated {
            view: MatchView::from(game),
        });
    }

    /// Second player is in: announce it and start the first countdown.
    pub fn match_started(self: &Arc<Self>, game: &Match) {
        info!("Match {} started with {} questions", game.id, game.question_count());
        self.publish(MatchEvent::Updated {
            view: MatchView::from(game),
        });
        self.schedule_deadline(game.id.clone(), game.current_question_index);
    }

    pub fn match_removed(&self, match_id: &str, reason: &str) {
        self.publish(MatchEvent::Removed {
            match_id: match_id.to_string(),
            reason: reason.to_string(),
        });
        self.channels.remove(match_id);
    }

    /// Record the caller's answer in their own slot.
    ///
    /// A conflicting write by the opponent is retried against a fresh read;
    /// rule violations are returned as-is.
    pub async fn submit_answer(
        self: &Arc<Self>,
        match_id: &str,
        uid: &str,
        question_index: u32,
        answer: AnswerChoice,
    ) -> Result<AnswerOutcome, SyncError> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut game = self.load(match_id).await?;
            let outcome = game.record_answer(uid, question_index, answer)?;

            if self.matches.compare_and_swap(&mut game).await? {
                debug!(
                    "Player {} answered question {} of {} (+{})",
                    uid, question_index, match_id, outcome.points
                );
                self.after_write(&game);
                return Ok(outcome);
            }
            debug!("Answer write conflict on {} (attempt {})", match_id, attempt);
        }

        Err(SyncError::Contention(match_id.to_string()))
    }

    fn after_write(self: &Arc<Self>, game: &Match) {
        self.publish(MatchEvent::Updated {
            view: MatchView::from(game),
        });
        if game.status == MatchStatus::Playing && game.both_answered() {
            self.schedule_advance(game.id.clone(), game.current_question_index);
        }
    }

    fn schedule_advance(self: &Arc<Self>, match_id: MatchId, expected_index: u32) {
        let manager = Arc::clone(self);
        let delay = self.settings.advance_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = manager.advance(&match_id, expected_index).await {
                error!("Failed to advance match {}: {}", match_id, e);
            }
        });
    }

    fn schedule_deadline(self: &Arc<Self>, match_id: MatchId, question_index: u32) {
        let manager = Arc::clone(self);
        let timeout = self.settings.answer_timeout;

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Err(e) = manager.expire_question(&match_id, question_index).await {
                warn!(
                    "Deadline for question {} of {} failed: {}",
                    question_index, match_id, e
                );
            }
        });
    }

    /// Move past `expected_index` if both players have answered it.
    ///
    /// Safe to call any number of times: once the pointer has moved, further
    /// calls for the same index return `Advance::Stale`.
    pub async fn advance(
        self: &Arc<Self>,
        match_id: &str,
        expected_index: u32,
    ) -> Result<Advance, SyncError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let Some(mut game) = self.matches.get(match_id).await? else {
                // Reaped or cancelled
                return Ok(Advance::Stale);
            };

            let step = game.advance(expected_index)?;
            if matches!(step, Advance::NotReady | Advance::Stale) {
                return Ok(step);
            }

            if !self.matches.compare_and_swap(&mut game).await? {
                continue;
            }

            match step {
                Advance::Next(index) => {
                    debug!("Match {} moved to question {}", match_id, index);
                    self.publish(MatchEvent::Updated {
                        view: MatchView::from(&game),
                    });
                    self.schedule_deadline(game.id.clone(), index);
                }
                Advance::Finished => self.finish(&game).await,
                Advance::NotReady | Advance::Stale => {}
            }
            return Ok(step);
        }

        Err(SyncError::Contention(match_id.to_string()))
    }

    /// Give the no-answer sentinel to whoever is still silent on `question_index`.
    pub async fn expire_question(
        self: &Arc<Self>,
        match_id: &str,
        question_index: u32,
    ) -> Result<Vec<Seat>, SyncError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let Some(mut game) = self.matches.get(match_id).await? else {
                return Ok(Vec::new());
            };

            let filled = game.fill_missing_answers(question_index);
            if filled.is_empty() {
                return Ok(filled);
            }

            if self.matches.compare_and_swap(&mut game).await? {
                info!(
                    "Question {} of {} timed out for {:?}",
                    question_index, match_id, filled
                );
                self.after_write(&game);
                return Ok(filled);
            }
        }

        Err(SyncError::Contention(match_id.to_string()))
    }

    /// Runs once per match: only the writer that flipped it to finished gets here.
    async fn finish(&self, game: &Match) {
        let mut results = Vec::new();

        for seat in [Seat::Player1, Seat::Player2] {
            let Some(slot) = game.slot(seat) else {
                continue;
            };
            let Some(result) = game.result_for(&slot.uid) else {
                continue;
            };

            match self.users.apply_match_result(&result, &slot.name).await {
                Ok(true) => info!(
                    "Recorded {} for {} in match {}",
                    result.outcome.as_str(),
                    slot.uid,
                    game.id
                ),
                Ok(false) => debug!("Result for {} in {} already recorded", slot.uid, game.id),
                Err(e) => error!(
                    "Failed to record result for {} in {}: {:#}",
                    slot.uid, game.id, e
                ),
            }
            results.push(result);
        }

        info!(
            "Match {} finished {}-{}",
            game.id,
            game.player1.score,
            game.player2.as_ref().map(|p| p.score).unwrap_or(0)
        );
        self.publish(MatchEvent::Finished {
            view: MatchView::from(game),
            results,
        });
    }

    /// Re-arm timers for matches left in play by a previous process.
    ///
    /// A question both players answered gets its advance; anything else gets a
    /// fresh deadline. Matches already past their TTL are left to the reaper.
    pub async fn resume_playing(self: &Arc<Self>, reaper: &MatchReaper) -> Result<usize, SyncError> {
        let now = Utc::now();
        let mut resumed = 0;

        for game in self.matches.find_by_status(MatchStatus::Playing).await? {
            if reaper.is_stale(&game, now) {
                continue;
            }
            if game.both_answered() {
                self.schedule_advance(game.id.clone(), game.current_question_index);
            } else {
                self.schedule_deadline(game.id.clone(), game.current_question_index);
            }
            resumed += 1;
        }

        if resumed > 0 {
            info!("Resumed timers for {} matches in play", resumed);
        }
        Ok(resumed)
    }

    /// Delete records past their TTL and tell anyone still watching.
    pub async fn reap_stale(&self, reaper: &MatchReaper) -> Result<usize, SyncError> {
        let cutoffs = reaper.cutoffs(Utc::now());
        let mut removed = 0;

        for (status, before) in [
            (MatchStatus::Waiting, cutoffs.waiting_before),
            (MatchStatus::Playing, cutoffs.playing_before),
            (MatchStatus::Finished, cutoffs.finished_before),
        ] {
            let ids = self.matches.delete_created_before(status, before).await?;
            for id in &ids {
                self.match_removed(id, MatchReaper::reason_for(status));
            }
            removed += ids.len();
        }

        // Channels nobody listens to any more
        self.channels.retain(|_, sender| sender.receiver_count() > 0);

        if removed > 0 {
            info!("Reaped {} stale matches", removed);
        }
        Ok(removed)
    }
}

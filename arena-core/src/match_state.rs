use arena_types::{
    AnswerChoice, ArenaError, Match, MatchOutcome, MatchResult, MatchStatus, PlayerSlot,
    QuestionSnapshot, Seat,
};
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::ScoringEngine;

pub const CODE_LENGTH: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const DEFAULT_MODE: &str = "all";
pub const DEFAULT_REGION: &str = "global";

/// Random share code, uppercase letters and digits
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

#[derive(Debug, Clone)]
pub struct NewMatch {
    pub host: PlayerSlot,
    pub questions: Vec<QuestionSnapshot>,
    pub mode: String,
    pub region: String,
    pub private: bool,
}

/// Build a match waiting for its second player
pub fn new_waiting_match(id: String, code: String, params: NewMatch, now: DateTime<Utc>) -> Match {
    Match {
        id,
        code,
        player1: params.host,
        player2: None,
        status: MatchStatus::Waiting,
        questions: params.questions,
        current_question_index: 0,
        created_at: now.to_rfc3339(),
        mode: params.mode,
        region: params.region,
        private: params.private,
        version: 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub points: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Pointer moved to this index
    Next(u32),
    Finished,
    /// Someone still has to answer
    NotReady,
    /// The pointer already moved past the expected index
    Stale,
}

/// State transitions for a shared match record.
///
/// Every method mutates the in-memory copy only; callers persist the result
/// through a version-checked write.
pub trait MatchStateMachine {
    fn join(&mut self, guest: PlayerSlot) -> Result<(), ArenaError>;
    fn record_answer(
        &mut self,
        uid: &str,
        question_index: u32,
        answer: AnswerChoice,
    ) -> Result<AnswerOutcome, ArenaError>;
    fn both_answered(&self) -> bool;
    fn fill_missing_answers(&mut self, question_index: u32) -> Vec<Seat>;
    fn advance(&mut self, expected_index: u32) -> Result<Advance, ArenaError>;
    fn outcome_for(&self, uid: &str) -> Option<MatchOutcome>;
    fn result_for(&self, uid: &str) -> Option<MatchResult>;
    fn created_at_utc(&self) -> Option<DateTime<Utc>>;
    fn is_fresh(&self, window: chrono::Duration, now: DateTime<Utc>) -> bool;
}

impl MatchStateMachine for Match {
    fn join(&mut self, guest: PlayerSlot) -> Result<(), ArenaError> {
        if self.status != MatchStatus::Waiting {
            return Err(ArenaError::InvalidMatchState {
                current_state: self.status.as_str().to_string(),
            });
        }
        if self.player1.uid == guest.uid {
            return Err(ArenaError::CannotJoinOwnMatch);
        }
        if self.player2.is_some() {
            return Err(ArenaError::MatchFull);
        }

        self.player2 = Some(guest);
        self.status = MatchStatus::Playing;
        Ok(())
    }

    fn record_answer(
        &mut self,
        uid: &str,
        question_index: u32,
        answer: AnswerChoice,
    ) -> Result<AnswerOutcome, ArenaError> {
        let seat = self.seat_of(uid).ok_or(ArenaError::NotInMatch)?;

        if self.status != MatchStatus::Playing {
            return Err(ArenaError::InvalidMatchState {
                current_state: self.status.as_str().to_string(),
            });
        }
        if question_index != self.current_question_index {
            return Err(ArenaError::WrongQuestion {
                expected: self.current_question_index,
                received: question_index,
            });
        }

        let question = self
            .current_question()
            .cloned()
            .ok_or_else(|| ArenaError::InvalidMatchState {
                current_state: "no current question".to_string(),
            })?;

        if let AnswerChoice::Picked(index) = answer {
            if index as usize >= question.options.len() {
                return Err(ArenaError::AnswerOutOfRange {
                    index,
                    options: question.options.len() as u8,
                });
            }
        }

        let slot = self.slot_mut(seat).ok_or(ArenaError::NotInMatch)?;
        if slot.has_answered() {
            return Err(ArenaError::AlreadyAnswered);
        }

        let is_correct = answer.picked().is_some_and(|index| question.is_correct(index));
        let points = ScoringEngine::answer_points(question.difficulty, is_correct);

        slot.current_answer = Some(answer);
        slot.score += points;
        if is_correct {
            slot.correct += 1;
        }

        Ok(AnswerOutcome { is_correct, points })
    }

    fn both_answered(&self) -> bool {
        self.player1.has_answered()
            && self
                .player2
                .as_ref()
                .is_some_and(PlayerSlot::has_answered)
    }

    /// Give the no-answer sentinel to every seat still silent on `question_index`
    fn fill_missing_answers(&mut self, question_index: u32) -> Vec<Seat> {
        if self.status != MatchStatus::Playing || self.current_question_index != question_index {
            return Vec::new();
        }

        let mut filled = Vec::new();
        for seat in [Seat::Player1, Seat::Player2] {
            if let Some(slot) = self.slot_mut(seat) {
                if !slot.has_answered() {
                    slot.current_answer = Some(AnswerChoice::NoAnswer);
                    filled.push(seat);
                }
            }
        }
        filled
    }

    fn advance(&mut self, expected_index: u32) -> Result<Advance, ArenaError> {
        match self.status {
            MatchStatus::Playing => {}
            MatchStatus::Finished => return Ok(Advance::Stale),
            MatchStatus::Waiting => {
                return Err(ArenaError::InvalidMatchState {
                    current_state: self.status.as_str().to_string(),
                });
            }
        }

        if self.current_question_index != expected_index {
            return Ok(Advance::Stale);
        }
        if !self.both_answered() {
            return Ok(Advance::NotReady);
        }

        self.player1.current_answer = None;
        if let Some(player2) = self.player2.as_mut() {
            player2.current_answer = None;
        }

        let next = self.current_question_index + 1;
        if next >= self.question_count() {
            self.status = MatchStatus::Finished;
            Ok(Advance::Finished)
        } else {
            self.current_question_index = next;
            Ok(Advance::Next(next))
        }
    }

    fn outcome_for(&self, uid: &str) -> Option<MatchOutcome> {
        if self.status != MatchStatus::Finished {
            return None;
        }
        let seat = self.seat_of(uid)?;
        let mine = self.slot(seat)?.score;
        let theirs = self.slot(seat.other())?.score;
        Some(MatchOutcome::from_scores(mine, theirs))
    }

    fn result_for(&self, uid: &str) -> Option<MatchResult> {
        let outcome = self.outcome_for(uid)?;
        let seat = self.seat_of(uid)?;
        let me = self.slot(seat)?;
        let opponent = self.slot(seat.other())?;

        Some(MatchResult {
            match_id: self.id.clone(),
            uid: me.uid.clone(),
            outcome,
            your_score: me.score,
            opponent_score: opponent.score,
            correct_answers: me.correct,
            questions_played: self.question_count(),
        })
    }

    fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    fn is_fresh(&self, window: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.created_at_utc()
            .is_some_and(|created| now.signed_duration_since(created) <= window)
    }
}

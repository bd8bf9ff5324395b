use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::question::{PublicQuestion, QuestionSnapshot};

pub type MatchId = String;
pub type UserId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MatchStatus {
    Waiting,  // One player, discoverable
    Playing,  // Both slots filled
    Finished, // Pointer ran past the last question
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Waiting => "waiting",
            MatchStatus::Playing => "playing",
            MatchStatus::Finished => "finished",
        }
    }
}

/// What a player submitted for the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum AnswerChoice {
    Picked(u8),
    /// Countdown expired before the player picked anything
    NoAnswer,
}

impl AnswerChoice {
    pub fn picked(&self) -> Option<u8> {
        match self {
            AnswerChoice::Picked(index) => Some(*index),
            AnswerChoice::NoAnswer => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerSlot {
    pub uid: UserId,
    pub name: String,
    pub score: i32,
    #[serde(default)]
    pub correct: u32,
    pub current_answer: Option<AnswerChoice>,
    pub ready: bool,
}

impl PlayerSlot {
    pub fn new(uid: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            score: 0,
            correct: 0,
            current_answer: None,
            ready: true,
        }
    }

    pub fn has_answered(&self) -> bool {
        self.current_answer.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Seat {
    Player1,
    Player2,
}

impl Seat {
    pub fn other(&self) -> Seat {
        match self {
            Seat::Player1 => Seat::Player2,
            Seat::Player2 => Seat::Player1,
        }
    }
}

/// The shared record two players coordinate through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Match {
    pub id: MatchId,
    pub code: String,
    pub player1: PlayerSlot,
    pub player2: Option<PlayerSlot>,
    pub status: MatchStatus,
    pub questions: Vec<QuestionSnapshot>,
    pub current_question_index: u32,
    pub created_at: String, // ISO 8601 string
    pub mode: String,
    pub region: String,
    pub private: bool,
    /// Bumped on every persisted mutation; writes are applied only against the version read
    pub version: u64,
}

impl Match {
    pub fn slot(&self, seat: Seat) -> Option<&PlayerSlot> {
        match seat {
            Seat::Player1 => Some(&self.player1),
            Seat::Player2 => self.player2.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, seat: Seat) -> Option<&mut PlayerSlot> {
        match seat {
            Seat::Player1 => Some(&mut self.player1),
            Seat::Player2 => self.player2.as_mut(),
        }
    }

    pub fn seat_of(&self, uid: &str) -> Option<Seat> {
        if self.player1.uid == uid {
            Some(Seat::Player1)
        } else if self.player2.as_ref().is_some_and(|p| p.uid == uid) {
            Some(Seat::Player2)
        } else {
            None
        }
    }

    pub fn current_question(&self) -> Option<&QuestionSnapshot> {
        self.questions.get(self.current_question_index as usize)
    }

    pub fn question_count(&self) -> u32 {
        self.questions.len() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MatchOutcome {
    Win,
    Draw,
    Loss,
}

impl MatchOutcome {
    pub fn from_scores(mine: i32, theirs: i32) -> Self {
        if mine > theirs {
            MatchOutcome::Win
        } else if mine == theirs {
            MatchOutcome::Draw
        } else {
            MatchOutcome::Loss
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Win => "win",
            MatchOutcome::Draw => "draw",
            MatchOutcome::Loss => "loss",
        }
    }
}

/// Final standing from one player's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MatchResult {
    pub match_id: MatchId,
    pub uid: UserId,
    pub outcome: MatchOutcome,
    pub your_score: i32,
    pub opponent_score: i32,
    pub correct_answers: u32,
    pub questions_played: u32,
}

/// Match state safe to broadcast: no correct answers for questions still in play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MatchView {
    pub id: MatchId,
    pub code: String,
    pub status: MatchStatus,
    pub player1: PlayerSlot,
    pub player2: Option<PlayerSlot>,
    pub current_question_index: u32,
    pub question_count: u32,
    pub current_question: Option<PublicQuestion>,
    /// Revealed once both players have answered the current question
    pub revealed_answer: Option<u8>,
    pub mode: String,
    pub region: String,
    pub created_at: String,
    pub version: u64,
}

impl From<&Match> for MatchView {
    fn from(game: &Match) -> Self {
        let both_answered = game.player1.has_answered()
            && game.player2.as_ref().is_some_and(PlayerSlot::has_answered);

        let current = match game.status {
            MatchStatus::Playing => game.current_question(),
            _ => None,
        };

        MatchView {
            id: game.id.clone(),
            code: game.code.clone(),
            status: game.status,
            player1: game.player1.clone(),
            player2: game.player2.clone(),
            current_question_index: game.current_question_index,
            question_count: game.question_count(),
            current_question: current.map(PublicQuestion::from),
            revealed_answer: current
                .filter(|_| both_answered)
                .map(|q| q.correct_index),
            mode: game.mode.clone(),
            region: game.region.clone(),
            created_at: game.created_at.clone(),
            version: game.version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum MatchRole {
    Created,
    Joined,
}

/// Handed back by matchmaking so the client can start watching its match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MatchTicket {
    pub match_id: MatchId,
    pub code: String,
    pub role: MatchRole,
    pub seat: Seat,
}

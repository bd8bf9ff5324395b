use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ArenaError {
    MatchNotFound { match_id: String },
    NotInMatch,
    CannotJoinOwnMatch,
    MatchFull,
    InvalidMatchState { current_state: String },
    WrongQuestion { expected: u32, received: u32 },
    AlreadyAnswered,
    AnswerOutOfRange { index: u8, options: u8 },
    RateLimitExceeded,
    AuthenticationRequired,
}

impl std::fmt::Display for ArenaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArenaError::MatchNotFound { match_id } => write!(f, "Match not found: {}", match_id),
            ArenaError::NotInMatch => write!(f, "Not a player in this match"),
            ArenaError::CannotJoinOwnMatch => write!(f, "Cannot join your own match"),
            ArenaError::MatchFull => write!(f, "Match already has two players"),
            ArenaError::InvalidMatchState { current_state } => {
                write!(f, "Invalid match state: {}", current_state)
            }
            ArenaError::WrongQuestion { expected, received } => write!(
                f,
                "Answer for question {} but current question is {}",
                received, expected
            ),
            ArenaError::AlreadyAnswered => write!(f, "Already answered this question"),
            ArenaError::AnswerOutOfRange { index, options } => write!(
                f,
                "Answer index {} out of range for {} options",
                index, options
            ),
            ArenaError::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            ArenaError::AuthenticationRequired => write!(f, "Authentication required"),
        }
    }
}

impl std::error::Error for ArenaError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

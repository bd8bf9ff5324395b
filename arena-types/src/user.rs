use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::game::UserId;

/// Identity resolved from an auth token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: UserId,
    pub email: Option<String>,
    pub display_name: String,
    pub is_anonymous: bool,
}

/// Lifetime statistics kept in the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserStats {
    pub uid: UserId,
    pub display_name: String,
    pub total_score: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub level: i32,
    pub highest_streak: i32,
    pub quizzes_won: i32,
    pub quizzes_lost: i32,
    pub badges: Vec<String>,
    pub last_online: Option<String>, // ISO 8601 string
    pub last_played: Option<String>,
}

impl UserStats {
    pub fn new(uid: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
            total_score: 0,
            total_questions: 0,
            correct_answers: 0,
            level: 1,
            highest_streak: 0,
            quizzes_won: 0,
            quizzes_lost: 0,
            badges: Vec::new(),
            last_online: None,
            last_played: None,
        }
    }
}

/// Aggregates kept on the player's own device between solo quizzes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserProgress {
    pub total_score: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub level: i32,
    pub level_name: String,
    pub level_progress: f64,
    pub badges: Vec<String>,
    pub highest_streak: i32,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            total_score: 0,
            total_questions: 0,
            correct_answers: 0,
            level: 1,
            level_name: "Beginner".to_string(),
            level_progress: 0.0,
            badges: Vec::new(),
            highest_streak: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: String,
    pub score: i32,
    pub date: String, // ISO 8601 string
    pub accuracy: u32,
}

/// Row of the server-side ranking built from `users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RankedUser {
    pub user: UserStats,
    pub rank: u32,
}

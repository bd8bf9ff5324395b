use arena_types::{Difficulty, UserProgress, UserStats};

pub struct Level {
    pub name: &'static str,
    pub min_score: i32,
}

pub const LEVELS: [Level; 8] = [
    Level { name: "Beginner", min_score: 0 },
    Level { name: "Disciple", min_score: 100 },
    Level { name: "Apprentice", min_score: 300 },
    Level { name: "Scholar", min_score: 600 },
    Level { name: "Teacher", min_score: 1000 },
    Level { name: "Master", min_score: 1500 },
    Level { name: "Prophet", min_score: 2500 },
    Level { name: "Sage", min_score: 4000 },
];

/// Points needed past the last threshold to fill the top level's progress bar
const TOP_LEVEL_SPAN: i32 = 1000;

pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const BADGES: [Badge; 6] = [
    Badge {
        id: "first-quiz",
        name: "First Steps",
        description: "Complete your first quiz",
    },
    Badge {
        id: "perfect-10",
        name: "Perfect 10",
        description: "Get 10 correct in a row",
    },
    Badge {
        id: "scholar",
        name: "Scholar",
        description: "Answer 50 questions correctly",
    },
    Badge {
        id: "hard-mode",
        name: "Challenger",
        description: "Complete a hard quiz",
    },
    // No award rule; kept so clients can render the full badge shelf
    Badge {
        id: "all-categories",
        name: "Well-Rounded",
        description: "Play quizzes from all categories",
    },
    Badge {
        id: "streak-master",
        name: "Streak Master",
        description: "Get a 15 question streak",
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct LevelInfo {
    /// 1-based
    pub level: i32,
    pub name: &'static str,
    /// Percent towards the next threshold, clamped to 0..=100
    pub progress: f64,
}

/// Summary of one finished solo quiz, fed into the lifetime progress.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSummary {
    pub score: i32,
    pub correct: i32,
    pub total: i32,
    pub max_streak: i32,
    pub difficulty: Option<Difficulty>,
}

pub struct ScoringEngine;

impl ScoringEngine {
    pub fn difficulty_points(difficulty: Difficulty) -> i32 {
        match difficulty {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 30,
        }
    }

    /// Bonus for a correct answer given the streak held before answering
    pub fn streak_bonus(streak_before: u32, is_correct: bool) -> i32 {
        if is_correct && streak_before >= 2 {
            (streak_before * 2) as i32
        } else {
            0
        }
    }

    /// Points for one live-match answer. No streak bonus online.
    pub fn answer_points(difficulty: Difficulty, is_correct: bool) -> i32 {
        if is_correct {
            Self::difficulty_points(difficulty)
        } else {
            0
        }
    }

    pub fn level_for_score(score: i32) -> LevelInfo {
        let index = LEVELS
            .iter()
            .rposition(|level| score >= level.min_score)
            .unwrap_or(0);

        let current_min = LEVELS[index].min_score;
        let next_min = LEVELS
            .get(index + 1)
            .map(|level| level.min_score)
            .unwrap_or(current_min + TOP_LEVEL_SPAN);

        let progress =
            (score - current_min) as f64 / (next_min - current_min) as f64 * 100.0;

        LevelInfo {
            level: index as i32 + 1,
            name: LEVELS[index].name,
            progress: progress.clamp(0.0, 100.0),
        }
    }

    pub fn accuracy(correct: i32, total: i32) -> u32 {
        if total <= 0 {
            return 0;
        }
        (correct as f64 / total as f64 * 100.0).round() as u32
    }

    /// Badges earned by this quiz that `owned` doesn't already contain
    pub fn new_badges(owned: &[String], summary: &QuizSummary, correct_lifetime: i32) -> Vec<String> {
        let rules = [
            ("first-quiz", true),
            ("perfect-10", summary.max_streak >= 10),
            ("scholar", correct_lifetime >= 50),
            ("hard-mode", summary.difficulty == Some(Difficulty::Hard)),
            ("streak-master", summary.max_streak >= 15),
        ];

        rules
            .into_iter()
            .filter(|(id, earned)| *earned && !owned.iter().any(|b| b == id))
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Merge a finished quiz into the lifetime progress
    pub fn update_progress(current: &UserProgress, summary: &QuizSummary) -> UserProgress {
        let total_score = current.total_score + summary.score;
        let correct_answers = current.correct_answers + summary.correct;
        let level = Self::level_for_score(total_score);

        let mut badges = current.badges.clone();
        badges.extend(Self::new_badges(&current.badges, summary, correct_answers));

        UserProgress {
            total_score,
            total_questions: current.total_questions + summary.total,
            correct_answers,
            level: level.level,
            level_name: level.name.to_string(),
            level_progress: level.progress,
            badges,
            highest_streak: current.highest_streak.max(summary.max_streak),
        }
    }

    /// Fold a finished live match into a player's lifetime stats
    pub fn apply_match_result(
        stats: &mut UserStats,
        score: i32,
        correct: i32,
        questions: i32,
        won: bool,
        lost: bool,
    ) {
        stats.total_score += score;
        stats.total_questions += questions;
        stats.correct_answers += correct;
        if won {
            stats.quizzes_won += 1;
        }
        if lost {
            stats.quizzes_lost += 1;
        }
        stats.level = Self::level_for_score(stats.total_score).level;
    }
}

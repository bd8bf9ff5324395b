use anyhow::{Result, anyhow};
use arena_types::{Category, Difficulty, Filter, QuestionId, QuestionSnapshot, UserProgress};
use rand::Rng;
use std::collections::HashSet;

use crate::{QuestionBank, QuizSummary, ScoringEngine, progress::ProgressStore, shuffle_options};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoloAnswer {
    pub is_correct: bool,
    pub points: i32,
    pub streak: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizResults {
    pub total_questions: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub score: i32,
    pub max_streak: u32,
    pub accuracy: u32,
}

#[derive(Debug, Clone)]
struct SessionQuestion {
    question: QuestionSnapshot,
    options: Vec<String>,
    correct_index: u8,
    answer: Option<u8>,
}

/// One solo run through a set of questions.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<SessionQuestion>,
    difficulty: Filter<Difficulty>,
    current_index: usize,
    score: i32,
    streak: u32,
    max_streak: u32,
    complete: bool,
}

impl QuizSession {
    /// Draws questions the player hasn't seen recently and records them in `used_ids`
    pub fn start(
        bank: &QuestionBank,
        count: usize,
        category: Filter<Category>,
        difficulty: Filter<Difficulty>,
        used_ids: &mut HashSet<QuestionId>,
    ) -> Result<Self> {
        Self::start_with(&mut rand::thread_rng(), bank, count, category, difficulty, used_ids)
    }

    pub fn start_with<R: Rng + ?Sized>(
        rng: &mut R,
        bank: &QuestionBank,
        count: usize,
        category: Filter<Category>,
        difficulty: Filter<Difficulty>,
        used_ids: &mut HashSet<QuestionId>,
    ) -> Result<Self> {
        let picked = bank.random_questions_with(rng, count, category, difficulty, used_ids);
        if picked.is_empty() {
            return Err(anyhow!("No unused questions match this quiz setup"));
        }

        let questions = picked
            .into_iter()
            .map(|question| {
                let (options, correct_index) = shuffle_options(&question, rng);
                used_ids.insert(question.id.clone());
                SessionQuestion {
                    question,
                    options,
                    correct_index,
                    answer: None,
                }
            })
            .collect();

        Ok(Self {
            questions,
            difficulty,
            current_index: 0,
            score: 0,
            streak: 0,
            max_streak: 0,
            complete: false,
        })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&QuestionSnapshot> {
        self.questions.get(self.current_index).map(|q| &q.question)
    }

    /// Options of the current question in display order
    pub fn current_options(&self) -> &[String] {
        self.questions
            .get(self.current_index)
            .map(|q| q.options.as_slice())
            .unwrap_or(&[])
    }

    pub fn correct_index(&self) -> Option<u8> {
        self.questions.get(self.current_index).map(|q| q.correct_index)
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Percent of the quiz reached, counting the current question
    pub fn progress(&self) -> f64 {
        if self.questions.is_empty() {
            return 0.0;
        }
        (self.current_index + 1) as f64 / self.questions.len() as f64 * 100.0
    }

    pub fn answer(&mut self, index: u8) -> Result<SoloAnswer> {
        if self.complete {
            return Err(anyhow!("Quiz is already complete"));
        }
        let entry = self
            .questions
            .get_mut(self.current_index)
            .ok_or_else(|| anyhow!("No current question"))?;
        if entry.answer.is_some() {
            return Err(anyhow!("Question {} already answered", self.current_index));
        }
        if index as usize >= entry.options.len() {
            return Err(anyhow!(
                "Answer index {} out of range for {} options",
                index,
                entry.options.len()
            ));
        }

        let is_correct = index == entry.correct_index;
        let points = ScoringEngine::answer_points(entry.question.difficulty, is_correct)
            + ScoringEngine::streak_bonus(self.streak, is_correct);

        entry.answer = Some(index);
        self.score += points;
        self.streak = if is_correct { self.streak + 1 } else { 0 };
        self.max_streak = self.max_streak.max(self.streak);

        Ok(SoloAnswer {
            is_correct,
            points,
            streak: self.streak,
        })
    }

    /// Move to the next question, completing the quiz after the last one
    pub fn next_question(&mut self) {
        if self.current_index + 1 >= self.questions.len() {
            self.complete = true;
        } else {
            self.current_index += 1;
        }
    }

    pub fn results(&self) -> Option<QuizResults> {
        if !self.complete {
            return None;
        }

        let total = self.questions.len() as u32;
        let correct = self
            .questions
            .iter()
            .filter(|q| q.answer == Some(q.correct_index))
            .count() as u32;

        Some(QuizResults {
            total_questions: total,
            correct,
            incorrect: total - correct,
            score: self.score,
            max_streak: self.max_streak,
            accuracy: ScoringEngine::accuracy(correct as i32, total as i32),
        })
    }

    pub fn summary(&self) -> Option<QuizSummary> {
        let results = self.results()?;
        Some(QuizSummary {
            score: results.score,
            correct: results.correct as i32,
            total: results.total_questions as i32,
            max_streak: results.max_streak as i32,
            difficulty: match self.difficulty {
                Filter::Only(difficulty) => Some(difficulty),
                Filter::Any => None,
            },
        })
    }

    /// Merge a completed quiz into the stored progress and leaderboard
    pub fn finish(&self, store: &dyn ProgressStore, player_name: &str) -> Result<UserProgress> {
        let results = self
            .results()
            .ok_or_else(|| anyhow!("Quiz is not complete"))?;
        let summary = self
            .summary()
            .ok_or_else(|| anyhow!("Quiz is not complete"))?;

        let progress = store.merge_quiz(&summary)?;
        store.add_to_leaderboard(player_name, results.score, results.accuracy)?;

        tracing::info!(
            "Solo quiz finished by {}: {} points, {}% accuracy",
            player_name,
            results.score,
            results.accuracy
        );
        Ok(progress)
    }
}

use anyhow::Result;
use arena_core::ScoringEngine;
use arena_types::{MatchOutcome, MatchResult, RankedUser, UserProgress, UserStats};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};

use crate::entities::{match_results, prelude::*, users};

#[derive(Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_stats(model: users::Model) -> UserStats {
        let badges = serde_json::from_str(&model.badges).unwrap_or_else(|e| {
            tracing::warn!("Unreadable badges for {}: {}", model.id, e);
            Vec::new()
        });

        UserStats {
            uid: model.id,
            display_name: model.display_name,
            total_score: model.total_score,
            total_questions: model.total_questions,
            correct_answers: model.correct_answers,
            level: model.level,
            highest_streak: model.highest_streak,
            quizzes_won: model.quizzes_won,
            quizzes_lost: model.quizzes_lost,
            badges,
            last_online: model.last_online.map(|t| t.to_rfc3339()),
            last_played: model.last_played.map(|t| t.to_rfc3339()),
        }
    }

    fn stats_to_active(stats: &UserStats, created_at: DateTime<Utc>) -> Result<users::ActiveModel> {
        let parse = |value: &Option<String>| {
            value
                .as_deref()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        };

        Ok(users::ActiveModel {
            id: Set(stats.uid.clone()),
            display_name: Set(stats.display_name.clone()),
            total_score: Set(stats.total_score),
            total_questions: Set(stats.total_questions),
            correct_answers: Set(stats.correct_answers),
            level: Set(stats.level),
            highest_streak: Set(stats.highest_streak),
            quizzes_won: Set(stats.quizzes_won),
            quizzes_lost: Set(stats.quizzes_lost),
            badges: Set(serde_json::to_string(&stats.badges)?),
            last_online: Set(parse(&stats.last_online)),
            last_played: Set(parse(&stats.last_played)),
            created_at: Set(created_at.into()),
            updated_at: Set(Utc::now().into()),
        })
    }

    async fn find_model<C: ConnectionTrait>(conn: &C, uid: &str) -> Result<Option<users::Model>> {
        Ok(Users::find_by_id(uid.to_string()).one(conn).await?)
    }

    /// Load the row for `uid`, creating a blank profile if there is none
    async fn load_or_new<C: ConnectionTrait>(
        conn: &C,
        uid: &str,
        display_name: &str,
    ) -> Result<(UserStats, Option<DateTime<Utc>>)> {
        match Self::find_model(conn, uid).await? {
            Some(model) => {
                let created_at = model.created_at.with_timezone(&Utc);
                Ok((Self::model_to_stats(model), Some(created_at)))
            }
            None => Ok((UserStats::new(uid, display_name), None)),
        }
    }

    async fn store<C: ConnectionTrait>(
        conn: &C,
        stats: &UserStats,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        match created_at {
            Some(created_at) => {
                let model = Self::stats_to_active(stats, created_at)?;
                Users::update(model).exec(conn).await?;
            }
            None => {
                let model = Self::stats_to_active(stats, Utc::now())?;
                Users::insert(model).exec(conn).await?;
            }
        }
        Ok(())
    }

    pub async fn find_by_id(&self, uid: &str) -> Result<Option<UserStats>> {
        let model = Self::find_model(&self.db, uid).await?;
        Ok(model.map(Self::model_to_stats))
    }

    /// Fetch a profile, creating it on first sight. A changed display name is saved.
    pub async fn ensure_user(&self, uid: &str, display_name: &str) -> Result<UserStats> {
        let (mut stats, created_at) = Self::load_or_new(&self.db, uid, display_name).await?;

        if created_at.is_none() || (!display_name.is_empty() && stats.display_name != display_name) {
            stats.display_name = display_name.to_string();
            Self::store(&self.db, &stats, created_at).await?;
        }
        Ok(stats)
    }

    /// Replace aggregates with the player's merged solo progress
    pub async fn apply_solo_progress(
        &self,
        uid: &str,
        display_name: &str,
        progress: &UserProgress,
    ) -> Result<UserStats> {
        let txn = self.db.begin().await?;
        let (mut stats, created_at) = Self::load_or_new(&txn, uid, display_name).await?;

        stats.display_name = display_name.to_string();
        stats.total_score = progress.total_score;
        stats.total_questions = progress.total_questions;
        stats.correct_answers = progress.correct_answers;
        stats.level = progress.level;
        stats.highest_streak = stats.highest_streak.max(progress.highest_streak);
        for badge in &progress.badges {
            if !stats.badges.contains(badge) {
                stats.badges.push(badge.clone());
            }
        }
        stats.last_played = Some(Utc::now().to_rfc3339());

        Self::store(&txn, &stats, created_at).await?;
        txn.commit().await?;
        Ok(stats)
    }

    /// Add a finished match to the player's lifetime stats.
    ///
    /// Returns `false` without touching stats when this (match, player) pair
    /// was already applied.
    pub async fn apply_match_result(&self, result: &MatchResult, display_name: &str) -> Result<bool> {
        let txn = self.db.begin().await?;

        let marker = match_results::ActiveModel {
            match_id: Set(result.match_id.clone()),
            user_id: Set(result.uid.clone()),
            outcome: Set(result.outcome.as_str().to_string()),
            score: Set(result.your_score),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let inserted = MatchResults::insert(marker)
            .on_conflict(
                OnConflict::columns([match_results::Column::MatchId, match_results::Column::UserId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        if inserted == 0 {
            txn.rollback().await?;
            tracing::debug!("Result of {} for {} already applied", result.match_id, result.uid);
            return Ok(false);
        }

        let (mut stats, created_at) = Self::load_or_new(&txn, &result.uid, display_name).await?;
        ScoringEngine::apply_match_result(
            &mut stats,
            result.your_score,
            result.correct_answers as i32,
            result.questions_played as i32,
            result.outcome == MatchOutcome::Win,
            result.outcome == MatchOutcome::Loss,
        );
        stats.last_played = Some(Utc::now().to_rfc3339());

        Self::store(&txn, &stats, created_at).await?;
        txn.commit().await?;
        Ok(true)
    }

    pub async fn touch_presence(&self, uid: &str, display_name: &str) -> Result<()> {
        let (mut stats, created_at) = Self::load_or_new(&self.db, uid, display_name).await?;
        stats.last_online = Some(Utc::now().to_rfc3339());
        Self::store(&self.db, &stats, created_at).await
    }

    pub async fn count_online_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let since: sea_orm::prelude::DateTimeWithTimeZone = since.into();
        let count = Users::find()
            .filter(users::Column::LastOnline.gte(since))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn get_leaderboard(&self, limit: u64) -> Result<Vec<RankedUser>> {
        let users = Users::find()
            .order_by_desc(users::Column::TotalScore)
            .order_by_asc(users::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        let leaderboard = users
            .into_iter()
            .enumerate()
            .map(|(index, model)| RankedUser {
                user: Self::model_to_stats(model),
                rank: (index + 1) as u32,
            })
            .collect();

        Ok(leaderboard)
    }

    pub async fn get_user_rank(&self, uid: &str) -> Result<Option<u32>> {
        let user = Self::find_model(&self.db, uid).await?;

        if let Some(user_model) = user {
            let users_above = Users::find()
                .filter(users::Column::TotalScore.gt(user_model.total_score))
                .count(&self.db)
                .await?;

            Ok(Some(users_above as u32 + 1))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};

    async fn setup_test_db() -> UserRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        UserRepository::new(db)
    }

    fn result(match_id: &str, uid: &str, outcome: MatchOutcome, score: i32) -> MatchResult {
        MatchResult {
            match_id: match_id.to_string(),
            uid: uid.to_string(),
            outcome,
            your_score: score,
            opponent_score: 0,
            correct_answers: (score / 10) as u32,
            questions_played: 10,
        }
    }

    #[tokio::test]
    async fn test_ensure_user_creates_and_renames() {
        let repo = setup_test_db().await;

        let created = repo.ensure_user("u1", "Naomi").await.unwrap();
        assert_eq!(created.display_name, "Naomi");
        assert_eq!(created.level, 1);

        repo.ensure_user("u1", "Naomi B").await.unwrap();
        let found = repo.find_by_id("u1").await.unwrap().unwrap();
        assert_eq!(found.display_name, "Naomi B");
        assert!(repo.find_by_id("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_match_result_applied_once() {
        let repo = setup_test_db().await;
        let win = result("m1", "u1", MatchOutcome::Win, 120);

        assert!(repo.apply_match_result(&win, "Caleb").await.unwrap());
        assert!(!repo.apply_match_result(&win, "Caleb").await.unwrap());

        let stats = repo.find_by_id("u1").await.unwrap().unwrap();
        assert_eq!(stats.total_score, 120);
        assert_eq!(stats.total_questions, 10);
        assert_eq!(stats.correct_answers, 12);
        assert_eq!(stats.quizzes_won, 1);
        assert_eq!(stats.level, 2);
        assert!(stats.last_played.is_some());

        let loss = result("m2", "u1", MatchOutcome::Loss, 30);
        assert!(repo.apply_match_result(&loss, "Caleb").await.unwrap());
        let draw = result("m3", "u1", MatchOutcome::Draw, 30);
        assert!(repo.apply_match_result(&draw, "Caleb").await.unwrap());

        let stats = repo.find_by_id("u1").await.unwrap().unwrap();
        assert_eq!(stats.total_score, 180);
        assert_eq!(stats.total_questions, 30);
        assert_eq!(stats.quizzes_won, 1);
        assert_eq!(stats.quizzes_lost, 1);
    }

    #[tokio::test]
    async fn test_solo_progress_overwrites_aggregates() {
        let repo = setup_test_db().await;
        repo.apply_match_result(&result("m1", "u1", MatchOutcome::Win, 50), "Abigail")
            .await
            .unwrap();

        let progress = UserProgress {
            total_score: 640,
            total_questions: 40,
            correct_answers: 30,
            level: 4,
            level_name: "Scholar".to_string(),
            level_progress: 10.0,
            badges: vec!["first-quiz".to_string(), "perfect-10".to_string()],
            highest_streak: 11,
        };
        let stats = repo.apply_solo_progress("u1", "Abigail", &progress).await.unwrap();

        assert_eq!(stats.total_score, 640);
        assert_eq!(stats.correct_answers, 30);
        assert_eq!(stats.level, 4);
        assert_eq!(stats.highest_streak, 11);
        assert_eq!(stats.quizzes_won, 1);
        assert_eq!(stats.badges, vec!["first-quiz", "perfect-10"]);

        let stored = repo.find_by_id("u1").await.unwrap().unwrap();
        assert_eq!(stored.total_score, 640);
        assert_eq!(stored.badges, stats.badges);
        assert!(stored.last_played.is_some());
    }

    #[tokio::test]
    async fn test_presence_count() {
        let repo = setup_test_db().await;
        repo.ensure_user("idle", "Idle").await.unwrap();
        repo.touch_presence("u1", "One").await.unwrap();
        repo.touch_presence("u2", "Two").await.unwrap();

        let since = Utc::now() - chrono::Duration::minutes(5);
        assert_eq!(repo.count_online_since(since).await.unwrap(), 2);

        let future = Utc::now() + chrono::Duration::minutes(1);
        assert_eq!(repo.count_online_since(future).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_leaderboard_and_rank() {
        let repo = setup_test_db().await;
        for (uid, score) in [("a", 100), ("b", 300), ("c", 50)] {
            repo.apply_match_result(&result("m", uid, MatchOutcome::Draw, score), uid)
                .await
                .unwrap();
        }

        let leaderboard = repo.get_leaderboard(10).await.unwrap();
        let order: Vec<_> = leaderboard.iter().map(|r| r.user.uid.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert_eq!(leaderboard[0].rank, 1);
        assert_eq!(leaderboard[2].rank, 3);

        assert_eq!(repo.get_leaderboard(2).await.unwrap().len(), 2);
        assert_eq!(repo.get_user_rank("a").await.unwrap(), Some(2));
        assert_eq!(repo.get_user_rank("nobody").await.unwrap(), None);
    }
}

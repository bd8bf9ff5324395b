use anyhow::{Context, Result};
use arena_types::{Match, MatchStatus};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::entities::{matches, prelude::*};

/// Shared match records. Every write after creation is a compare-and-swap on `version`.
#[derive(Clone)]
pub struct MatchRepository {
    db: DatabaseConnection,
}

impl MatchRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_match(model: matches::Model) -> Result<Match> {
        let mut game: Match = serde_json::from_str(&model.document)
            .with_context(|| format!("Corrupt match document {}", model.id))?;
        // The column is authoritative; the document copy may lag a failed write
        game.version = model.version as u64;
        Ok(game)
    }

    fn decode_all(models: Vec<matches::Model>) -> Vec<Match> {
        models
            .into_iter()
            .filter_map(|model| match Self::model_to_match(model) {
                Ok(game) => Some(game),
                Err(e) => {
                    tracing::warn!("Skipping unreadable match: {:#}", e);
                    None
                }
            })
            .collect()
    }

    pub async fn create(&self, game: &Match) -> Result<()> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let created_at = DateTime::parse_from_rfc3339(&game.created_at).unwrap_or(now);

        let model = matches::ActiveModel {
            id: Set(game.id.clone()),
            code: Set(game.code.clone()),
            status: Set(game.status.as_str().to_string()),
            mode: Set(game.mode.clone()),
            region: Set(game.region.clone()),
            private: Set(game.private),
            player1_uid: Set(game.player1.uid.clone()),
            version: Set(game.version as i64),
            document: Set(serde_json::to_string(game)?),
            created_at: Set(created_at),
            updated_at: Set(now),
        };

        Matches::insert(model).exec(&self.db).await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Match>> {
        let model = Matches::find_by_id(id.to_string()).one(&self.db).await?;
        model.map(Self::model_to_match).transpose()
    }

    /// Most recent waiting match carrying this share code
    pub async fn find_waiting_by_code(&self, code: &str) -> Result<Option<Match>> {
        let model = Matches::find()
            .filter(matches::Column::Code.eq(code))
            .filter(matches::Column::Status.eq(MatchStatus::Waiting.as_str()))
            .order_by_desc(matches::Column::CreatedAt)
            .one(&self.db)
            .await?;
        model.map(Self::model_to_match).transpose()
    }

    /// Public waiting matches opened by someone other than `exclude_uid` at or
    /// after `created_after`, oldest first
    pub async fn find_waiting(
        &self,
        limit: u64,
        exclude_uid: &str,
        created_after: DateTime<Utc>,
        mode: Option<&str>,
        region: Option<&str>,
    ) -> Result<Vec<Match>> {
        let created_after: sea_orm::prelude::DateTimeWithTimeZone = created_after.into();
        let mut query = Matches::find()
            .filter(matches::Column::Status.eq(MatchStatus::Waiting.as_str()))
            .filter(matches::Column::Private.eq(false))
            .filter(matches::Column::Player1Uid.ne(exclude_uid))
            .filter(matches::Column::CreatedAt.gte(created_after));

        if let Some(mode) = mode {
            query = query.filter(matches::Column::Mode.eq(mode));
        }
        if let Some(region) = region {
            query = query.filter(matches::Column::Region.eq(region));
        }

        let models = query
            .order_by_asc(matches::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(Self::decode_all(models))
    }

    /// Persist `game` only if the stored version still equals `game.version`.
    ///
    /// On success the stored and in-memory versions are both bumped. Returns
    /// `false` when another writer got there first.
    pub async fn compare_and_swap(&self, game: &mut Match) -> Result<bool> {
        let expected = game.version;
        let next = expected + 1;

        let mut stored = game.clone();
        stored.version = next;
        let document = serde_json::to_string(&stored)?;
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();

        let result = Matches::update_many()
            .col_expr(matches::Column::Document, Expr::value(document))
            .col_expr(matches::Column::Status, Expr::value(game.status.as_str()))
            .col_expr(matches::Column::Version, Expr::value(next as i64))
            .col_expr(matches::Column::UpdatedAt, Expr::value(now))
            .filter(matches::Column::Id.eq(game.id.as_str()))
            .filter(matches::Column::Version.eq(expected as i64))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 1 {
            game.version = next;
            Ok(true)
        } else {
            tracing::debug!("Version conflict on match {} at v{}", game.id, expected);
            Ok(false)
        }
    }

    /// Delete a match only if nobody has written to it since `version`
    pub async fn delete_if_version(&self, id: &str, version: u64) -> Result<bool> {
        let result = Matches::delete_many()
            .filter(matches::Column::Id.eq(id))
            .filter(matches::Column::Version.eq(version as i64))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Matches currently in `status`, oldest first
    pub async fn find_by_status(&self, status: MatchStatus) -> Result<Vec<Match>> {
        let models = Matches::find()
            .filter(matches::Column::Status.eq(status.as_str()))
            .order_by_asc(matches::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(Self::decode_all(models))
    }

    /// Delete matches in `status` created before `before`, returning the ids
    /// actually removed.
    ///
    /// Each delete re-checks status and age, so a record that changed status
    /// after the scan is left alone.
    pub async fn delete_created_before(
        &self,
        status: MatchStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let before: sea_orm::prelude::DateTimeWithTimeZone = before.into();

        let ids: Vec<String> = Matches::find()
            .select_only()
            .column(matches::Column::Id)
            .filter(matches::Column::Status.eq(status.as_str()))
            .filter(matches::Column::CreatedAt.lt(before))
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if self.delete_if_stale(&id, status, before).await? {
                removed.push(id);
            }
        }

        Ok(removed)
    }

    /// Delete one match only while it is still in `status` and older than `before`
    async fn delete_if_stale(
        &self,
        id: &str,
        status: MatchStatus,
        before: sea_orm::prelude::DateTimeWithTimeZone,
    ) -> Result<bool> {
        let result = Matches::delete_many()
            .filter(matches::Column::Id.eq(id))
            .filter(matches::Column::Status.eq(status.as_str()))
            .filter(matches::Column::CreatedAt.lt(before))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn count_by_status(&self, status: MatchStatus) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        let count = Matches::find()
            .filter(matches::Column::Status.eq(status.as_str()))
            .count(&self.db)
            .await?;
        Ok(count)
    }
}

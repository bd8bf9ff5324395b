use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MatchResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MatchResults::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MatchResults::MatchId).string().not_null())
                    .col(ColumnDef::new(MatchResults::UserId).string().not_null())
                    .col(ColumnDef::new(MatchResults::Outcome).string().not_null())
                    .col(ColumnDef::new(MatchResults::Score).integer().not_null())
                    .col(
                        ColumnDef::new(MatchResults::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // A match result is applied to a player's stats at most once
        manager
            .create_index(
                Index::create()
                    .name("idx_match_results_match_user")
                    .table(MatchResults::Table)
                    .col(MatchResults::MatchId)
                    .col(MatchResults::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MatchResults::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MatchResults {
    Table,
    Id,
    MatchId,
    UserId,
    Outcome,
    Score,
    CreatedAt,
}

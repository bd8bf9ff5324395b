use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::DisplayName).string().not_null())
                    .col(
                        ColumnDef::new(Users::TotalScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::TotalQuestions)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::CorrectAnswers)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Users::Level).integer().not_null().default(1))
                    .col(
                        ColumnDef::new(Users::HighestStreak)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::QuizzesWon)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::QuizzesLost)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    // JSON array of badge ids
                    .col(
                        ColumnDef::new(Users::Badges)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(Users::LastOnline).timestamp_with_time_zone())
                    .col(ColumnDef::new(Users::LastPlayed).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Leaderboard ordering
        manager
            .create_index(
                Index::create()
                    .name("idx_users_total_score")
                    .table(Users::Table)
                    .col(Users::TotalScore)
                    .to_owned(),
            )
            .await?;

        // Online counter
        manager
            .create_index(
                Index::create()
                    .name("idx_users_last_online")
                    .table(Users::Table)
                    .col(Users::LastOnline)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    DisplayName,
    TotalScore,
    TotalQuestions,
    CorrectAnswers,
    Level,
    HighestStreak,
    QuizzesWon,
    QuizzesLost,
    Badges,
    LastOnline,
    LastPlayed,
    CreatedAt,
    UpdatedAt,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Matches::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Matches::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Matches::Code).string().not_null())
                    .col(ColumnDef::new(Matches::Status).string().not_null())
                    .col(ColumnDef::new(Matches::Mode).string().not_null())
                    .col(ColumnDef::new(Matches::Region).string().not_null())
                    .col(
                        ColumnDef::new(Matches::Private)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Matches::Player1Uid).string().not_null())
                    .col(
                        ColumnDef::new(Matches::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Matches::Document).text().not_null())
                    .col(
                        ColumnDef::new(Matches::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Matches::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Discovery scans waiting matches oldest first
        manager
            .create_index(
                Index::create()
                    .name("idx_matches_status_created_at")
                    .table(Matches::Table)
                    .col(Matches::Status)
                    .col(Matches::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_matches_code")
                    .table(Matches::Table)
                    .col(Matches::Code)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Matches::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Matches {
    Table,
    Id,
    Code,
    Status,
    Mode,
    Region,
    Private,
    Player1Uid,
    Version,
    Document,
    CreatedAt,
    UpdatedAt,
}

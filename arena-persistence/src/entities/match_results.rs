use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "match_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub match_id: String,
    pub user_id: String,
    pub outcome: String,
    pub score: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

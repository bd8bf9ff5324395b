use sea_orm::entity::prelude::*;

/// Indexed columns are copies of fields inside `document`, kept for discovery queries.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "matches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub code: String,
    pub status: String,
    pub mode: String,
    pub region: String,
    pub private: bool,
    pub player1_uid: String,
    pub version: i64,
    #[sea_orm(column_type = "Text")]
    pub document: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

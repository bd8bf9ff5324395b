use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub display_name: String,
    pub total_score: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub level: i32,
    pub highest_streak: i32,
    pub quizzes_won: i32,
    pub quizzes_lost: i32,
    #[sea_orm(column_type = "Text")]
    pub badges: String,
    pub last_online: Option<DateTimeWithTimeZone>,
    pub last_played: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub use super::match_results::Entity as MatchResults;
pub use super::matches::Entity as Matches;
pub use super::users::Entity as Users;

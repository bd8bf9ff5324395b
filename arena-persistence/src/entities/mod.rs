pub mod prelude;

pub mod match_results;
pub mod matches;
pub mod users;

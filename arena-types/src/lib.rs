pub mod bible;
pub mod errors;
pub mod game;
pub mod messages;
pub mod question;
pub mod user;

// Re-export all types
pub use bible::*;
pub use errors::*;
pub use game::*;
pub use messages::*;
pub use question::*;
pub use user::*;

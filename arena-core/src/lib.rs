pub mod cleanup;
pub mod match_events;
pub mod match_state;
pub mod progress;
pub mod question_bank;
pub mod scoring;
pub mod solo;

// Re-export main components
pub use cleanup::*;
pub use match_events::*;
pub use match_state::*;
pub use progress::*;
pub use question_bank::*;
pub use scoring::*;
pub use solo::*;

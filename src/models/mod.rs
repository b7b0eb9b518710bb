pub mod app_state;
pub mod game_record;
pub mod messages;
pub mod user;

// Re-export important types
pub use app_state::*;
pub use game_record::*;
pub use messages::*;
pub use user::*;

//! Collaborator interfaces the live game coordinator depends on, plus the
//! in-memory implementations the server runs with.

pub mod memory;

pub use memory::{MemoryAuthStore, MemoryGameStore, MemoryUserStore};

use crate::error::StoreError;
use crate::game::Color;
use crate::models::{GameId, GameRecord, UserData};

pub trait UserStore: Send + Sync {
    fn create_user(&self, user: UserData) -> Result<(), StoreError>;
    fn get_user(&self, username: &str) -> Option<UserData>;
    fn clear(&self);
}

pub trait AuthStore: Send + Sync {
    /// Issues a fresh token for `username`.
    fn create_auth(&self, username: &str) -> Result<String, StoreError>;
    fn get_username(&self, auth_token: &str) -> Result<String, StoreError>;
    fn delete_auth(&self, auth_token: &str) -> Result<(), StoreError>;
    fn clear(&self);
}

pub trait GameStore: Send + Sync {
    fn create_game(&self, game_name: &str) -> Result<GameId, StoreError>;
    fn get_game(&self, game_id: GameId) -> Result<GameRecord, StoreError>;
    fn list_games(&self) -> Vec<GameRecord>;
    fn update_game(&self, game_id: GameId, record: GameRecord) -> Result<(), StoreError>;
    /// Seats `username` as `color` unless someone already sits there.
    fn claim_seat(&self, game_id: GameId, color: Color, username: &str) -> Result<(), StoreError>;
    /// Removes every game. Ids keep counting up.
    fn clear(&self);
}

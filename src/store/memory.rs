use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

use super::{AuthStore, GameStore, UserStore};
use crate::error::StoreError;
use crate::game::Color;
use crate::models::{GameId, GameRecord, UserData};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserData>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryUserStore {
    fn create_user(&self, user: UserData) -> Result<(), StoreError> {
        if [&user.username, &user.password, &user.email]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(StoreError::BadRequest(
                "username, password and email are required".to_string(),
            ));
        }

        let mut users = self.users.write();
        if users.contains_key(&user.username) {
            return Err(StoreError::AlreadyTaken(format!("username {}", user.username)));
        }
        debug!("Registered user {}", user.username);
        users.insert(user.username.clone(), user);
        Ok(())
    }

    fn get_user(&self, username: &str) -> Option<UserData> {
        self.users.read().get(username).cloned()
    }

    fn clear(&self) {
        self.users.write().clear();
    }
}

#[derive(Default)]
pub struct MemoryAuthStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthStore for MemoryAuthStore {
    fn create_auth(&self, username: &str) -> Result<String, StoreError> {
        let token = Uuid::new_v4().to_string();
        self.tokens
            .write()
            .insert(token.clone(), username.to_string());
        Ok(token)
    }

    fn get_username(&self, auth_token: &str) -> Result<String, StoreError> {
        self.tokens
            .read()
            .get(auth_token)
            .cloned()
            .ok_or(StoreError::Unauthorized)
    }

    fn delete_auth(&self, auth_token: &str) -> Result<(), StoreError> {
        self.tokens
            .write()
            .remove(auth_token)
            .map(|_| ())
            .ok_or(StoreError::Unauthorized)
    }

    fn clear(&self) {
        self.tokens.write().clear();
    }
}

pub struct MemoryGameStore {
    games: RwLock<HashMap<GameId, GameRecord>>,
    next_id: AtomicU32,
}

impl Default for MemoryGameStore {
    fn default() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(game_id: GameId) -> StoreError {
    StoreError::NotFound(format!("game {}", game_id))
}

impl GameStore for MemoryGameStore {
    fn create_game(&self, game_name: &str) -> Result<GameId, StoreError> {
        if game_name.trim().is_empty() {
            return Err(StoreError::BadRequest("game name is required".to_string()));
        }

        let mut games = self.games.write();
        if games.values().any(|g| g.game_name == game_name) {
            return Err(StoreError::AlreadyTaken(format!("game name {}", game_name)));
        }

        let game_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        games.insert(game_id, GameRecord::new(game_id, game_name));
        debug!("Created game {} ({})", game_id, game_name);
        Ok(game_id)
    }

    fn get_game(&self, game_id: GameId) -> Result<GameRecord, StoreError> {
        self.games
            .read()
            .get(&game_id)
            .cloned()
            .ok_or_else(|| not_found(game_id))
    }

    fn list_games(&self) -> Vec<GameRecord> {
        let mut games: Vec<GameRecord> = self.games.read().values().cloned().collect();
        games.sort_by_key(|g| g.game_id);
        games
    }

    fn update_game(&self, game_id: GameId, record: GameRecord) -> Result<(), StoreError> {
        match self.games.write().get_mut(&game_id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(not_found(game_id)),
        }
    }

    fn claim_seat(&self, game_id: GameId, color: Color, username: &str) -> Result<(), StoreError> {
        let mut games = self.games.write();
        let record = games.get_mut(&game_id).ok_or_else(|| not_found(game_id))?;
        if record.username_for(color).is_some() {
            return Err(StoreError::AlreadyTaken(format!("{} seat", color)));
        }
        record.set_username(color, Some(username.to_string()));
        Ok(())
    }

    fn clear(&self) {
        self.games.write().clear();
    }
}

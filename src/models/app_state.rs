use std::sync::Arc;

use crate::store::{AuthStore, GameStore, MemoryAuthStore, MemoryGameStore, MemoryUserStore, UserStore};
use crate::websocket::{ConnectionRegistry, GameCoordinator};

/// Application state shared between connections
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub auth: Arc<dyn AuthStore>,
    pub games: Arc<dyn GameStore>,
    pub coordinator: GameCoordinator,
    /// Outbound queue size for each websocket actor
    pub mailbox_capacity: usize,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        auth: Arc<dyn AuthStore>,
        games: Arc<dyn GameStore>,
        mailbox_capacity: usize,
    ) -> Self {
        let coordinator = GameCoordinator::new(
            auth.clone(),
            games.clone(),
            Arc::new(ConnectionRegistry::new()),
        );
        Self {
            users,
            auth,
            games,
            coordinator,
            mailbox_capacity,
        }
    }

    pub fn in_memory(mailbox_capacity: usize) -> Self {
        Self::new(
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryAuthStore::new()),
            Arc::new(MemoryGameStore::new()),
            mailbox_capacity,
        )
    }
}

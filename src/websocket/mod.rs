pub mod connections;
pub mod coordinator;
pub mod handler;

pub use connections::{Connection, ConnectionRegistry, MessageSink, SendError};
pub use coordinator::{CommandOutcome, GameCoordinator};
pub use handler::{ws_index, ChessWebSocket};

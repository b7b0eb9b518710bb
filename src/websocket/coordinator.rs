//! Live game protocol: resolves who sent a command, validates it against the
//! rules engine, persists the result and fans messages out to everyone
//! watching the game.

use dashmap::DashMap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use super::connections::{Connection, ConnectionRegistry};
use crate::error::{CommandError, StoreError};
use crate::game::{Color, GameStatus};
use crate::models::{ClientMessage, CommandType, GameId, ServerMessage};
use crate::store::{AuthStore, GameStore};

/// What a handled command means for the socket that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The socket is now registered on the game under this token.
    Joined { game_id: GameId, auth_token: String },
    /// The socket's registration on the game was dropped.
    Left { game_id: GameId, auth_token: String },
    Done,
    /// An error was sent back to the socket.
    Rejected,
}

pub struct GameCoordinator {
    auth: Arc<dyn AuthStore>,
    games: Arc<dyn GameStore>,
    connections: Arc<ConnectionRegistry>,
    locks: DashMap<GameId, Arc<Mutex<()>>>,
}

impl GameCoordinator {
    pub fn new(
        auth: Arc<dyn AuthStore>,
        games: Arc<dyn GameStore>,
        connections: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            auth,
            games,
            connections,
            locks: DashMap::new(),
        }
    }

    /// Runs `f` while holding the game's lock. Every read-decide-write
    /// sequence on a game record goes through here. Locks exist only for
    /// games the store knows about; an unknown id fails with `NotFound`
    /// before anything is allocated.
    pub fn with_game_lock<T, E>(
        &self,
        game_id: GameId,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let lock = self.game_lock(game_id)?;
        let _guard = lock.lock();
        f()
    }

    /// Drops the locks of games the store no longer has.
    pub fn prune_locks(&self) {
        self.locks
            .retain(|game_id, _| self.games.get_game(*game_id).is_ok());
        debug!("{} game lock(s) remain after pruning", self.locks.len());
    }

    fn game_lock(&self, game_id: GameId) -> Result<Arc<Mutex<()>>, StoreError> {
        if let Some(lock) = self.locks.get(&game_id) {
            return Ok(lock.clone());
        }
        self.games.get_game(game_id)?;
        Ok(self.locks.entry(game_id).or_default().clone())
    }

    /// Parses and handles one raw frame from `origin`.
    pub fn handle_text(&self, origin: &Connection, text: &str) -> CommandOutcome {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(command) => self.handle_command(origin, command),
            Err(e) => {
                warn!("Error parsing client message from {}: {}", origin.id(), e);
                self.reject(origin, CommandError::from(e));
                CommandOutcome::Rejected
            }
        }
    }

    pub fn handle_command(&self, origin: &Connection, command: ClientMessage) -> CommandOutcome {
        info!(
            "Connection {} sent {:?} for game {}",
            origin.id(),
            command.command_type,
            command.game_id
        );

        let result = match command.command_type {
            CommandType::Connect => self.handle_connect(origin, &command),
            CommandType::MakeMove => self.handle_move(&command),
            CommandType::Leave => self.handle_leave(&command),
            CommandType::Resign => self.handle_resign(&command),
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.reject(origin, e);
                CommandOutcome::Rejected
            }
        }
    }

    /// The socket went away without sending LEAVE. Seats are kept.
    pub fn disconnect(&self, game_id: GameId, auth_token: &str, connection_id: Uuid) {
        if self
            .connections
            .remove_connection(game_id, auth_token, connection_id)
        {
            info!("Removed connection {} from game {}", connection_id, game_id);
        }
    }

    fn handle_connect(
        &self,
        origin: &Connection,
        command: &ClientMessage,
    ) -> Result<CommandOutcome, CommandError> {
        let username = self.auth.get_username(&command.auth_token)?;
        let game_id = command.game_id;
        let token = command.auth_token.as_str();

        self.with_game_lock(game_id, || {
            let record = self.games.get_game(game_id)?;
            let role = record
                .seat_of(&username)
                .map_or_else(|| "observer".to_string(), |color| color.to_string());

            self.connections.add(game_id, token, origin.clone());
            self.connections.broadcast(
                game_id,
                token,
                &ServerMessage::notification(format!("{} joined as {}", username, role)),
            );

            if let Err(e) = origin.send(&ServerMessage::load_game(record.game)) {
                warn!("Could not send game {} to {}: {}", game_id, origin.id(), e);
                self.connections.remove_connection(game_id, token, origin.id());
            }

            info!("{} joined game {} as {}", username, game_id, role);
            Ok(CommandOutcome::Joined {
                game_id,
                auth_token: command.auth_token.clone(),
            })
        })
    }

    fn handle_move(&self, command: &ClientMessage) -> Result<CommandOutcome, CommandError> {
        let mv = command
            .chess_move
            .ok_or_else(|| CommandError::Protocol("MAKE_MOVE requires a move".to_string()))?;
        let username = self.auth.get_username(&command.auth_token)?;
        let game_id = command.game_id;
        let token = command.auth_token.as_str();

        self.with_game_lock(game_id, || {
            let mut record = self.games.get_game(game_id)?;

            let color = record
                .seat_of(&username)
                .ok_or_else(|| CommandError::Unauthorized("only players may move".to_string()))?;
            if record.game_over {
                return Err(CommandError::InvalidMove("the game is already over".to_string()));
            }
            if record.game.team_turn() != color {
                return Err(CommandError::InvalidMove("it is not your turn".to_string()));
            }
            if !record.game.is_valid_move(&mv)? {
                return Err(CommandError::InvalidMove(format!("{} is not a legal move", mv)));
            }

            record.game.make_move(&mv)?;

            let opponent = color.opposite();
            let status = record.game.status(opponent)?;
            if status.is_terminal() {
                record.game_over = true;
            }
            self.games.update_game(game_id, record.clone())?;
            info!("{} played {} in game {} ({:?})", username, mv, game_id, status);

            self.connections.broadcast(
                game_id,
                token,
                &ServerMessage::notification(format!("{} made the move {}", username, mv)),
            );
            self.connections
                .broadcast_all(game_id, &ServerMessage::load_game(record.game.clone()));

            let opponent_name = record
                .username_for(opponent)
                .map_or_else(|| opponent.to_string(), str::to_string);
            let follow_up = match status {
                GameStatus::Checkmate => Some(format!(
                    "{} is in checkmate. {} wins!",
                    opponent_name, username
                )),
                GameStatus::Stalemate => Some(format!(
                    "{} is in stalemate. The game is a draw.",
                    opponent_name
                )),
                GameStatus::Check => Some(format!("{} is in check", opponent_name)),
                GameStatus::Ongoing => None,
            };
            if let Some(text) = follow_up {
                self.connections
                    .broadcast_all(game_id, &ServerMessage::notification(text));
            }

            Ok(CommandOutcome::Done)
        })
    }

    fn handle_leave(&self, command: &ClientMessage) -> Result<CommandOutcome, CommandError> {
        let username = self.auth.get_username(&command.auth_token)?;
        let game_id = command.game_id;
        let token = command.auth_token.as_str();

        self.with_game_lock(game_id, || {
            let mut record = self.games.get_game(game_id)?;
            self.connections.remove(game_id, token);

            let mut vacated = false;
            for color in [Color::White, Color::Black] {
                if record.username_for(color) == Some(username.as_str()) {
                    record.set_username(color, None);
                    vacated = true;
                }
            }
            if vacated {
                self.games.update_game(game_id, record)?;
                debug!("{} gave up their seat in game {}", username, game_id);
            }

            self.connections.broadcast(
                game_id,
                token,
                &ServerMessage::notification(format!("{} left the game", username)),
            );
            info!("{} left game {}", username, game_id);

            Ok(CommandOutcome::Left {
                game_id,
                auth_token: command.auth_token.clone(),
            })
        })
    }

    fn handle_resign(&self, command: &ClientMessage) -> Result<CommandOutcome, CommandError> {
        let username = self.auth.get_username(&command.auth_token)?;
        let game_id = command.game_id;

        self.with_game_lock(game_id, || {
            let mut record = self.games.get_game(game_id)?;

            let color = record
                .seat_of(&username)
                .ok_or_else(|| CommandError::Unauthorized("only players may resign".to_string()))?;
            if record.game_over {
                return Err(CommandError::InvalidMove("the game is already over".to_string()));
            }

            record.game_over = true;
            self.games.update_game(game_id, record)?;

            self.connections.broadcast_all(
                game_id,
                &ServerMessage::notification(format!(
                    "{} resigned. {} wins.",
                    username,
                    color.opposite()
                )),
            );
            info!("{} resigned game {}", username, game_id);

            Ok(CommandOutcome::Done)
        })
    }

    /// Sends the error to the originating socket only.
    fn reject(&self, origin: &Connection, err: CommandError) {
        match &err {
            CommandError::Internal(_) => error!("Command from {} failed: {}", origin.id(), err),
            _ => warn!("Rejected command from {}: {}", origin.id(), err),
        }
        if let Err(e) = origin.send(&ServerMessage::from(&err)) {
            debug!("Could not deliver error to {}: {}", origin.id(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Board, ChessGame, ChessMove, Piece, PieceType, Position};
    use crate::models::ServerMessageType;
    use crate::store::{MemoryAuthStore, MemoryGameStore};
    use crate::websocket::connections::testing::{recording, RecordingSink};
    use std::sync::Barrier;

    struct Fixture {
        coordinator: Arc<GameCoordinator>,
        games: Arc<MemoryGameStore>,
        registry: Arc<ConnectionRegistry>,
        game_id: GameId,
        alice: String,
        bob: String,
        carol: String,
    }

    /// alice plays white, bob plays black, carol watches.
    fn fixture() -> Fixture {
        let auth = Arc::new(MemoryAuthStore::new());
        let games = Arc::new(MemoryGameStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let coordinator = Arc::new(GameCoordinator::new(
            auth.clone(),
            games.clone(),
            registry.clone(),
        ));

        let game_id = games.create_game("friendly").unwrap();
        games.claim_seat(game_id, Color::White, "alice").unwrap();
        games.claim_seat(game_id, Color::Black, "bob").unwrap();

        Fixture {
            coordinator,
            games,
            registry,
            game_id,
            alice: auth.create_auth("alice").unwrap(),
            bob: auth.create_auth("bob").unwrap(),
            carol: auth.create_auth("carol").unwrap(),
        }
    }

    fn pos(s: &str) -> Position {
        s.parse().unwrap()
    }

    fn command(kind: CommandType, token: &str, game_id: GameId, mv: Option<ChessMove>) -> String {
        serde_json::to_string(&ClientMessage {
            command_type: kind,
            auth_token: token.to_string(),
            game_id,
            chess_move: mv,
        })
        .unwrap()
    }

    fn move_cmd(token: &str, game_id: GameId, from: &str, to: &str) -> String {
        command(
            CommandType::MakeMove,
            token,
            game_id,
            Some(ChessMove::new(pos(from), pos(to), None)),
        )
    }

    fn join(fx: &Fixture, token: &str) -> (Arc<RecordingSink>, Connection) {
        let (sink, conn) = recording();
        let outcome = fx
            .coordinator
            .handle_text(&conn, &command(CommandType::Connect, token, fx.game_id, None));
        assert!(matches!(outcome, CommandOutcome::Joined { .. }));
        (sink, conn)
    }

    fn notifications(sink: &RecordingSink) -> Vec<String> {
        sink.messages()
            .into_iter()
            .filter_map(|m| m.message)
            .collect()
    }

    fn errors(sink: &RecordingSink) -> Vec<String> {
        sink.messages()
            .into_iter()
            .filter_map(|m| m.error_message)
            .collect()
    }

    #[test]
    fn connect_loads_game_for_self_and_notifies_others() {
        let fx = fixture();
        let (alice, _) = join(&fx, &fx.alice);

        let first = alice.messages();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].message_type, ServerMessageType::LoadGame);
        assert_eq!(first[0].game, Some(ChessGame::new()));

        let (carol, _) = join(&fx, &fx.carol);
        assert_eq!(carol.messages().len(), 1);
        assert_eq!(carol.messages()[0].message_type, ServerMessageType::LoadGame);
        assert_eq!(notifications(&alice), vec!["carol joined as observer"]);

        let (_, _) = join(&fx, &fx.bob);
        assert_eq!(notifications(&carol), vec!["bob joined as black"]);
        assert_eq!(fx.registry.connection_count(fx.game_id), 3);
    }

    #[test]
    fn bad_token_errors_only_to_origin() {
        let fx = fixture();
        let (alice, _) = join(&fx, &fx.alice);
        alice.clear();

        let (stranger, conn) = recording();
        let outcome = fx.coordinator.handle_text(
            &conn,
            &command(CommandType::Connect, "forged", fx.game_id, None),
        );

        assert_eq!(outcome, CommandOutcome::Rejected);
        assert_eq!(errors(&stranger).len(), 1);
        assert!(errors(&stranger)[0].starts_with("Error: unauthorized"));
        assert!(alice.messages().is_empty());
        assert_eq!(fx.registry.connection_count(fx.game_id), 1);
    }

    #[test]
    fn unknown_game_is_not_registered() {
        let fx = fixture();
        let (sink, conn) = recording();
        let outcome = fx
            .coordinator
            .handle_text(&conn, &command(CommandType::Connect, &fx.alice, 404, None));

        assert_eq!(outcome, CommandOutcome::Rejected);
        assert_eq!(errors(&sink), vec!["Error: not found: game 404"]);
        assert!(!fx.registry.contains_game(404));
    }

    #[test]
    fn malformed_frames_are_protocol_errors() {
        let fx = fixture();
        let (bob, _) = join(&fx, &fx.bob);
        bob.clear();

        let (sink, conn) = recording();
        assert_eq!(
            fx.coordinator.handle_text(&conn, "{not json"),
            CommandOutcome::Rejected
        );
        assert_eq!(
            fx.coordinator
                .handle_text(&conn, &command(CommandType::MakeMove, &fx.alice, fx.game_id, None)),
            CommandOutcome::Rejected
        );

        let errs = errors(&sink);
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|e| e.starts_with("Error: malformed command")));
        assert!(bob.messages().is_empty());
    }

    #[test]
    fn move_is_applied_persisted_and_broadcast() {
        let fx = fixture();
        let (alice, alice_conn) = join(&fx, &fx.alice);
        let (bob, _) = join(&fx, &fx.bob);
        let (carol, _) = join(&fx, &fx.carol);
        for sink in [&alice, &bob, &carol] {
            sink.clear();
        }

        let outcome = fx
            .coordinator
            .handle_text(&alice_conn, &move_cmd(&fx.alice, fx.game_id, "e2", "e4"));
        assert_eq!(outcome, CommandOutcome::Done);

        let stored = fx.games.get_game(fx.game_id).unwrap();
        assert_eq!(stored.game.team_turn(), Color::Black);
        assert_eq!(
            stored.game.board().get(pos("e4")),
            Some(Piece::new(Color::White, PieceType::Pawn))
        );

        let mine = alice.messages();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].game.as_ref(), Some(&stored.game));

        for sink in [&bob, &carol] {
            let got = sink.messages();
            assert_eq!(got.len(), 2);
            assert_eq!(
                got[0],
                ServerMessage::notification("alice made the move e2 to e4")
            );
            assert_eq!(got[1], ServerMessage::load_game(stored.game.clone()));
        }
    }

    #[test]
    fn observers_cannot_move() {
        let fx = fixture();
        let (alice, _) = join(&fx, &fx.alice);
        let (carol, carol_conn) = join(&fx, &fx.carol);
        alice.clear();
        carol.clear();

        fx.coordinator
            .handle_text(&carol_conn, &move_cmd(&fx.carol, fx.game_id, "e2", "e4"));

        assert_eq!(
            errors(&carol),
            vec!["Error: unauthorized: only players may move"]
        );
        assert!(alice.messages().is_empty());
        assert_eq!(fx.games.get_game(fx.game_id).unwrap().game, ChessGame::new());
    }

    #[test]
    fn out_of_turn_and_illegal_moves_are_rejected() {
        let fx = fixture();
        let (alice, alice_conn) = join(&fx, &fx.alice);
        let (bob, bob_conn) = join(&fx, &fx.bob);
        alice.clear();
        bob.clear();

        fx.coordinator
            .handle_text(&bob_conn, &move_cmd(&fx.bob, fx.game_id, "e7", "e5"));
        assert_eq!(errors(&bob), vec!["Error: invalid move: it is not your turn"]);
        assert!(alice.messages().is_empty());

        fx.coordinator
            .handle_text(&alice_conn, &move_cmd(&fx.alice, fx.game_id, "e2", "e5"));
        assert_eq!(
            errors(&alice),
            vec!["Error: invalid move: e2 to e5 is not a legal move"]
        );

        // white may not move black's pieces on white's turn
        alice.clear();
        fx.coordinator
            .handle_text(&alice_conn, &move_cmd(&fx.alice, fx.game_id, "e7", "e6"));
        assert_eq!(errors(&alice).len(), 1);
        assert_eq!(bob.messages().len(), 1);
        assert_eq!(fx.games.get_game(fx.game_id).unwrap().game, ChessGame::new());
    }

    #[test]
    fn check_is_announced_to_everyone() {
        let fx = fixture();
        let (alice, alice_conn) = join(&fx, &fx.alice);
        let (bob, bob_conn) = join(&fx, &fx.bob);

        fx.coordinator
            .handle_text(&alice_conn, &move_cmd(&fx.alice, fx.game_id, "e2", "e4"));
        fx.coordinator
            .handle_text(&bob_conn, &move_cmd(&fx.bob, fx.game_id, "f7", "f6"));
        alice.clear();
        bob.clear();
        fx.coordinator
            .handle_text(&alice_conn, &move_cmd(&fx.alice, fx.game_id, "d1", "h5"));

        assert_eq!(notifications(&alice), vec!["bob is in check"]);
        assert_eq!(
            notifications(&bob),
            vec!["alice made the move d1 to h5", "bob is in check"]
        );
        assert!(!fx.games.get_game(fx.game_id).unwrap().game_over);
    }

    #[test]
    fn checkmate_ends_the_game() {
        let fx = fixture();
        let (_alice, alice_conn) = join(&fx, &fx.alice);
        let (bob, bob_conn) = join(&fx, &fx.bob);
        let (carol, _) = join(&fx, &fx.carol);

        let script = [
            (&alice_conn, &fx.alice, "e2", "e4"),
            (&bob_conn, &fx.bob, "f7", "f6"),
            (&alice_conn, &fx.alice, "d2", "d4"),
            (&bob_conn, &fx.bob, "g7", "g5"),
            (&alice_conn, &fx.alice, "d1", "h5"),
        ];
        for (conn, token, from, to) in script {
            assert_eq!(
                fx.coordinator
                    .handle_text(conn, &move_cmd(token, fx.game_id, from, to)),
                CommandOutcome::Done
            );
        }

        assert_eq!(
            notifications(&carol).last().map(String::as_str),
            Some("bob is in checkmate. alice wins!")
        );
        assert!(fx.games.get_game(fx.game_id).unwrap().game_over);

        bob.clear();
        fx.coordinator
            .handle_text(&bob_conn, &move_cmd(&fx.bob, fx.game_id, "h7", "h6"));
        assert_eq!(
            errors(&bob),
            vec!["Error: invalid move: the game is already over"]
        );
    }

    #[test]
    fn stalemate_ends_the_game() {
        let fx = fixture();
        let mut board = Board::default();
        board.set(pos("a8"), Some(Piece::new(Color::Black, PieceType::King)));
        board.set(pos("b5"), Some(Piece::new(Color::White, PieceType::Queen)));
        board.set(pos("h1"), Some(Piece::new(Color::White, PieceType::King)));
        let mut record = fx.games.get_game(fx.game_id).unwrap();
        record.game = ChessGame::from_board(board, Color::White);
        fx.games.update_game(fx.game_id, record).unwrap();

        let (alice, alice_conn) = join(&fx, &fx.alice);
        fx.coordinator
            .handle_text(&alice_conn, &move_cmd(&fx.alice, fx.game_id, "b5", "b6"));

        assert_eq!(
            notifications(&alice).last().map(String::as_str),
            Some("bob is in stalemate. The game is a draw.")
        );
        assert!(fx.games.get_game(fx.game_id).unwrap().game_over);
    }

    #[test]
    fn missing_king_is_reported_without_persisting() {
        let fx = fixture();
        let mut board = Board::default();
        board.set(pos("e1"), Some(Piece::new(Color::White, PieceType::King)));
        board.set(pos("a2"), Some(Piece::new(Color::White, PieceType::Pawn)));
        let mut record = fx.games.get_game(fx.game_id).unwrap();
        record.game = ChessGame::from_board(board, Color::White);
        fx.games.update_game(fx.game_id, record.clone()).unwrap();

        let (alice, alice_conn) = join(&fx, &fx.alice);
        alice.clear();
        fx.coordinator
            .handle_text(&alice_conn, &move_cmd(&fx.alice, fx.game_id, "a2", "a3"));

        assert_eq!(errors(&alice), vec!["Error: corrupt game state"]);
        assert_eq!(fx.games.get_game(fx.game_id).unwrap(), record);
    }

    #[test]
    fn resign_ends_the_game_for_everyone() {
        let fx = fixture();
        let (alice, alice_conn) = join(&fx, &fx.alice);
        let (bob, bob_conn) = join(&fx, &fx.bob);
        let (carol, carol_conn) = join(&fx, &fx.carol);
        for sink in [&alice, &bob, &carol] {
            sink.clear();
        }

        fx.coordinator.handle_text(
            &carol_conn,
            &command(CommandType::Resign, &fx.carol, fx.game_id, None),
        );
        assert_eq!(
            errors(&carol),
            vec!["Error: unauthorized: only players may resign"]
        );
        assert!(!fx.games.get_game(fx.game_id).unwrap().game_over);

        fx.coordinator.handle_text(
            &bob_conn,
            &command(CommandType::Resign, &fx.bob, fx.game_id, None),
        );
        for sink in [&alice, &bob, &carol] {
            assert_eq!(notifications(sink), vec!["bob resigned. white wins."]);
        }
        assert!(fx.games.get_game(fx.game_id).unwrap().game_over);

        alice.clear();
        fx.coordinator
            .handle_text(&alice_conn, &move_cmd(&fx.alice, fx.game_id, "e2", "e4"));
        assert_eq!(
            errors(&alice),
            vec!["Error: invalid move: the game is already over"]
        );

        fx.coordinator.handle_text(
            &alice_conn,
            &command(CommandType::Resign, &fx.alice, fx.game_id, None),
        );
        assert_eq!(errors(&alice).len(), 2);
    }

    #[test]
    fn leaving_player_gives_up_seat() {
        let fx = fixture();
        let (alice, _) = join(&fx, &fx.alice);
        let (bob, bob_conn) = join(&fx, &fx.bob);
        let (carol, _) = join(&fx, &fx.carol);
        for sink in [&alice, &bob, &carol] {
            sink.clear();
        }

        let outcome = fx.coordinator.handle_text(
            &bob_conn,
            &command(CommandType::Leave, &fx.bob, fx.game_id, None),
        );

        assert_eq!(
            outcome,
            CommandOutcome::Left {
                game_id: fx.game_id,
                auth_token: fx.bob.clone()
            }
        );
        let record = fx.games.get_game(fx.game_id).unwrap();
        assert_eq!(record.black_username, None);
        assert_eq!(record.white_username.as_deref(), Some("alice"));
        assert!(!fx.registry.is_connected(fx.game_id, &fx.bob));
        assert!(bob.messages().is_empty());
        assert_eq!(notifications(&alice), vec!["bob left the game"]);
        assert_eq!(notifications(&carol), vec!["bob left the game"]);
    }

    #[test]
    fn leaving_observer_keeps_seats() {
        let fx = fixture();
        let (alice, _) = join(&fx, &fx.alice);
        let (_, carol_conn) = join(&fx, &fx.carol);
        alice.clear();

        fx.coordinator.handle_text(
            &carol_conn,
            &command(CommandType::Leave, &fx.carol, fx.game_id, None),
        );

        let record = fx.games.get_game(fx.game_id).unwrap();
        assert_eq!(record.white_username.as_deref(), Some("alice"));
        assert_eq!(record.black_username.as_deref(), Some("bob"));
        assert_eq!(notifications(&alice), vec!["carol left the game"]);
    }

    #[test]
    fn last_leave_clears_registry_entry() {
        let fx = fixture();
        let (_, alice_conn) = join(&fx, &fx.alice);
        fx.coordinator.handle_text(
            &alice_conn,
            &command(CommandType::Leave, &fx.alice, fx.game_id, None),
        );
        assert!(!fx.registry.contains_game(fx.game_id));
    }

    #[test]
    fn disconnect_keeps_seat_and_newer_socket() {
        let fx = fixture();
        let (_, old_conn) = join(&fx, &fx.alice);
        let (new_sink, _) = join(&fx, &fx.alice);

        fx.coordinator.disconnect(fx.game_id, &fx.alice, old_conn.id());
        assert!(fx.registry.is_connected(fx.game_id, &fx.alice));

        new_sink.clear();
        fx.registry
            .broadcast_all(fx.game_id, &ServerMessage::notification("still here"));
        assert_eq!(new_sink.messages().len(), 1);
        assert_eq!(
            fx.games.get_game(fx.game_id).unwrap().white_username.as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn concurrent_moves_apply_exactly_once() {
        for _ in 0..20 {
            let fx = fixture();
            // two sockets for the white player racing each other
            let (first_sink, first_conn) = join(&fx, &fx.alice);
            let (second_sink, second_conn) = recording();
            first_sink.clear();

            let barrier = Barrier::new(2);
            let first_cmd = move_cmd(&fx.alice, fx.game_id, "e2", "e4");
            let second_cmd = move_cmd(&fx.alice, fx.game_id, "d2", "d4");
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    fx.coordinator.handle_text(&first_conn, &first_cmd);
                });
                scope.spawn(|| {
                    barrier.wait();
                    fx.coordinator.handle_text(&second_conn, &second_cmd);
                });
            });

            let record = fx.games.get_game(fx.game_id).unwrap();
            assert_eq!(record.game.team_turn(), Color::Black);
            let e4 = record.game.board().get(pos("e4")).is_some();
            let d4 = record.game.board().get(pos("d4")).is_some();
            assert!(e4 ^ d4, "exactly one pawn push must land");

            let rejected = errors(&first_sink).len() + errors(&second_sink).len();
            assert_eq!(rejected, 1);
        }
    }

    #[test]
    fn commands_on_unknown_games_allocate_no_locks() {
        let fx = fixture();
        let (sink, conn) = recording();

        for game_id in 1000..1200 {
            for kind in [
                CommandType::Connect,
                CommandType::Leave,
                CommandType::Resign,
            ] {
                let outcome = fx
                    .coordinator
                    .handle_text(&conn, &command(kind, &fx.alice, game_id, None));
                assert_eq!(outcome, CommandOutcome::Rejected);
            }
            fx.coordinator
                .handle_text(&conn, &move_cmd(&fx.alice, game_id, "e2", "e4"));
        }

        assert_eq!(errors(&sink).len(), 800);
        assert!(fx.coordinator.locks.is_empty());

        let result: Result<(), StoreError> = fx.coordinator.with_game_lock(4242, || Ok(()));
        assert_eq!(result, Err(StoreError::NotFound("game 4242".to_string())));
        assert!(fx.coordinator.locks.is_empty());
    }

    #[test]
    fn locks_are_reused_and_pruned_with_their_games() {
        let fx = fixture();
        join(&fx, &fx.alice);
        join(&fx, &fx.bob);
        assert_eq!(fx.coordinator.locks.len(), 1);

        fx.coordinator.prune_locks();
        assert_eq!(fx.coordinator.locks.len(), 1);

        fx.games.clear();
        fx.coordinator.prune_locks();
        assert!(fx.coordinator.locks.is_empty());
    }
}

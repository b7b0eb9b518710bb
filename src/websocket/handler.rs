use actix::prelude::SendError as ActixSendError;
use actix::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::connections::{Connection, MessageSink, SendError};
use super::coordinator::CommandOutcome;
use crate::error::CommandError;
use crate::models::*;

/// The registry gave up on this socket because its mailbox was full.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Evicted;

/// WebSocket handler for one client socket
pub struct ChessWebSocket {
    id: Uuid,
    app_state: web::Data<AppState>,
    connection: Option<Connection>,
    /// (game, token) pairs this socket is registered under
    joined: HashSet<(GameId, String)>,
}

impl ChessWebSocket {
    pub fn new(app_state: web::Data<AppState>) -> Self {
        Self {
            id: Uuid::new_v4(),
            app_state,
            connection: None,
            joined: HashSet::new(),
        }
    }

    fn handle_text(&mut self, text: &str) {
        let Some(connection) = &self.connection else {
            warn!("Text on {} before the actor started", self.id);
            return;
        };

        match self.app_state.coordinator.handle_text(connection, text) {
            CommandOutcome::Joined {
                game_id,
                auth_token,
            } => {
                self.joined.insert((game_id, auth_token));
            }
            CommandOutcome::Left {
                game_id,
                auth_token,
            } => {
                self.joined.remove(&(game_id, auth_token));
            }
            CommandOutcome::Done | CommandOutcome::Rejected => {}
        }
    }

    fn send_error(&self, err: CommandError, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::to_string(&ServerMessage::from(&err)) {
            Ok(json) => ctx.text(json),
            Err(e) => warn!("Error serializing message: {}", e),
        }
    }
}

impl Actor for ChessWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.set_mailbox_capacity(self.app_state.mailbox_capacity);

        let addr = ctx.address();
        let sink = ActorSink {
            messages: addr.clone().recipient(),
            evicted: addr.recipient(),
        };
        self.connection = Some(Connection::with_id(self.id, Arc::new(sink)));
        info!("WebSocket connection started: {}", self.id);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        for (game_id, auth_token) in self.joined.drain() {
            self.app_state
                .coordinator
                .disconnect(game_id, &auth_token, self.id);
        }
        self.connection = None;
        info!("WebSocket connection closed: {}", self.id);

        Running::Stop
    }
}

impl Handler<ChessWebSocketMessage> for ChessWebSocket {
    type Result = ();

    fn handle(&mut self, msg: ChessWebSocketMessage, ctx: &mut Self::Context) {
        debug!("Forwarding message to client {}: {}", self.id, msg.0);
        ctx.text(msg.0);
    }
}

impl Handler<Evicted> for ChessWebSocket {
    type Result = ();

    fn handle(&mut self, _: Evicted, ctx: &mut Self::Context) {
        warn!("Closing {}: client is not keeping up", self.id);
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Policy,
            description: Some("too many pending messages".to_string()),
        }));
        ctx.stop();
    }
}

// WebSocket message handler
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ChessWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Text(text)) => {
                debug!("Received text message on {}: {}", self.id, text);
                self.handle_text(&text);
            }
            Ok(ws::Message::Binary(_)) => {
                warn!("Binary messages are not supported");
                self.send_error(
                    CommandError::Protocol("binary frames are not supported".to_string()),
                    ctx,
                );
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Connection closed: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                warn!("Protocol error on {}: {}", self.id, e);
                ctx.stop();
            }
        }
    }
}

/// Routes registry sends into the actor's mailbox without blocking. A full
/// mailbox also tells the actor to close, since the registry drops it.
struct ActorSink {
    messages: Recipient<ChessWebSocketMessage>,
    evicted: Recipient<Evicted>,
}

impl MessageSink for ActorSink {
    fn send_text(&self, text: &str) -> Result<(), SendError> {
        match self.messages.try_send(ChessWebSocketMessage(text.to_string())) {
            Ok(()) => Ok(()),
            Err(ActixSendError::Full(_)) => {
                // do_send ignores the capacity limit
                self.evicted.do_send(Evicted);
                Err(SendError::Full)
            }
            Err(ActixSendError::Closed(_)) => Err(SendError::Closed),
        }
    }
}

/// WebSocket connection handler
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    info!("New WebSocket connection request");
    ws::start(ChessWebSocket::new(app_state), &req, stream)
}

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::game::Color;
use crate::models::{AppState, GameId, GameSummary, UserData};

const AUTH_HEADER: &str = "authorization";

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("missing authorization header")]
    MissingAuth,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingAuth | ApiError::Store(StoreError::Unauthorized) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::AlreadyTaken(_)) => StatusCode::FORBIDDEN,
            ApiError::Store(StoreError::BadRequest(_)) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            message: format!("Error: {}", self),
        })
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub username: String,
    pub auth_token: String,
}

#[derive(Deserialize)]
pub struct CreateGameRequest {
    pub game_name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateGameResponse {
    pub game_id: GameId,
}

#[derive(Deserialize)]
pub struct JoinGameRequest {
    pub player_color: Color,
    pub game_id: GameId,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ListGamesResponse {
    pub games: Vec<GameSummary>,
}

/// Resolves the caller from the `authorization` header.
fn authenticate(req: &HttpRequest, state: &AppState) -> Result<(String, String), ApiError> {
    let token = req
        .headers()
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::MissingAuth)?;
    let username = state.auth.get_username(token)?;
    Ok((token.to_string(), username))
}

/// HTTP handler for the index page
pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Chess Live")
}

fn required(field: Option<String>) -> Result<String, ApiError> {
    field
        .ok_or_else(|| StoreError::BadRequest("bad request".to_string()).into())
}

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let RegisterRequest {
        username,
        password,
        email,
    } = body.into_inner();
    let user = UserData::new(required(username)?, required(password)?, required(email)?);
    let username = user.username.clone();

    state.users.create_user(user)?;
    let auth_token = state.auth.create_auth(&username)?;
    info!("Registered user {}", username);

    Ok(HttpResponse::Ok().json(AuthResponse {
        username,
        auth_token,
    }))
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let LoginRequest { username, password } = body.into_inner();
    let (username, password) = (required(username)?, required(password)?);

    match state.users.get_user(&username) {
        Some(user) if user.password == password => {}
        _ => return Err(StoreError::Unauthorized.into()),
    }
    let auth_token = state.auth.create_auth(&username)?;
    info!("{} logged in", username);

    Ok(HttpResponse::Ok().json(AuthResponse {
        username,
        auth_token,
    }))
}

pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let (token, username) = authenticate(&req, &state)?;
    state.auth.delete_auth(&token)?;
    info!("{} logged out", username);
    Ok(HttpResponse::Ok().finish())
}

pub async fn list_games(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &state)?;
    let games = state.games.list_games().iter().map(GameSummary::from).collect();
    Ok(HttpResponse::Ok().json(ListGamesResponse { games }))
}

pub async fn create_game(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateGameRequest>,
) -> Result<HttpResponse, ApiError> {
    let (_, username) = authenticate(&req, &state)?;
    let game_id = state.games.create_game(&body.game_name)?;
    info!("{} created game {} ({})", username, game_id, body.game_name);
    Ok(HttpResponse::Ok().json(CreateGameResponse { game_id }))
}

/// Claims a seat. Runs under the game's lock so it cannot interleave with a
/// move being applied to the same record.
pub async fn join_game(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<JoinGameRequest>,
) -> Result<HttpResponse, ApiError> {
    let (_, username) = authenticate(&req, &state)?;
    let JoinGameRequest {
        player_color,
        game_id,
    } = body.into_inner();

    state.coordinator.with_game_lock(game_id, || {
        state.games.claim_seat(game_id, player_color, &username)
    })?;
    info!("{} took the {} seat in game {}", username, player_color, game_id);
    Ok(HttpResponse::Ok().finish())
}

/// Wipes users, tokens and games.
pub async fn clear(state: web::Data<AppState>) -> impl Responder {
    state.users.clear();
    state.auth.clear();
    state.games.clear();
    state.coordinator.prune_locks();
    info!("Cleared all stored data");
    HttpResponse::Ok().json(serde_json::json!({}))
}

/// Configure the HTTP routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(crate::websocket::ws_index)))
        .service(web::resource("/user").route(web::post().to(register)))
        .service(
            web::resource("/session")
                .route(web::post().to(login))
                .route(web::delete().to(logout)),
        )
        .service(
            web::resource("/game")
                .route(web::get().to(list_games))
                .route(web::post().to(create_game))
                .route(web::put().to(join_game)),
        )
        .service(web::resource("/db").route(web::delete().to(clear)))
        .service(web::resource("/").route(web::get().to(index)));
}

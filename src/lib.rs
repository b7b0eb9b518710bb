//! Live chess server: a move-validating rules engine and a websocket
//! coordinator that keeps every participant of a game in sync.

pub mod config;
pub mod error;
pub mod game;
pub mod models;
pub mod routes;
pub mod store;
pub mod websocket;

use clap::Parser;

/// Live chess server
#[derive(Parser, Debug, Clone)]
#[command(name = "chess_live", version)]
pub struct Args {
    /// Interface to bind
    #[arg(long, env = "CHESS_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "CHESS_PORT", default_value_t = 8080)]
    pub port: u16,

    /// HTTP worker threads (defaults to one per core)
    #[arg(long, env = "CHESS_WORKERS")]
    pub workers: Option<usize>,

    /// Outbound messages queued per websocket before the socket is dropped
    #[arg(long, env = "CHESS_MAILBOX_CAPACITY", default_value_t = 64)]
    pub mailbox_capacity: usize,
}

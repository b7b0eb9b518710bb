use actix_web::{web, App, HttpServer};
use clap::Parser;
use log::info;

use chess_live::config::Args;
use chess_live::models::AppState;
use chess_live::routes::configure_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();
    info!("Starting chess server at http://{}:{}", args.host, args.port);

    // Create shared application state
    let app_state = web::Data::new(AppState::in_memory(args.mailbox_capacity));

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(configure_routes)
    });
    if let Some(workers) = args.workers {
        server = server.workers(workers);
    }

    server.bind((args.host.as_str(), args.port))?.run().await
}

use actix_web::{middleware, web, App, HttpServer};

use whiteboard_server::config::Config;
use whiteboard_server::handlers::{cors, root};
use whiteboard_server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load().unwrap_or_else(|err| {
        log::warn!("Using default configuration: {}", err);
        Config::default()
    });

    let srv_tx = spawn_server(config.server_options());
    let connection_options = config.connection_options();
    let address = config.server_address();

    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(srv_tx.clone()))
            .app_data(web::Data::new(connection_options))
            .configure(root)
    })
    .bind(address.as_str())?;

    log::info!("Server running on {}", address);
    server.run().await
}

use actix_identity::IdentityMiddleware;
use actix_web::{middleware, web::Data, App, HttpServer};
use expense_tracker::{config::Config, routes, session_middleware, AppState};
use log::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env();
    let key = config.cookie_key()?;
    let state = AppState::init(&config).await?;

    info!("Database migrated successfully");

    let (host, port) = config.server_addr();
    info!("Starting HTTP server on http://{}:{}/", host, port);

    let cookie_secure = config.cookie_secure;
    HttpServer::new(move || {
        App::new()
            // enable automatic response compression - usually register this first
            .wrap(middleware::Compress::default())
            .wrap(IdentityMiddleware::default())
            .wrap(session_middleware(key.clone(), cookie_secure))
            // enable logger - always register Actix Web Logger middleware last
            .wrap(middleware::Logger::default())
            .app_data(Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}

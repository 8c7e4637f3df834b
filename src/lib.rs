#[macro_use]
extern crate lazy_static;

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use sqlx::sqlite::SqliteConnectOptions;
use tera::Tera;

pub mod aggregate;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod flash;
pub mod report;
pub mod routes;
pub mod session;
pub mod structs;
pub mod utils;

use auth::LockoutPolicy;
use config::Config;
use errors::AppError;

pub const SESSION_COOKIE: &str = "expenses_session";

#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection settings; every request opens its own connection.
    pub db: SqliteConnectOptions,
    pub lockout: LockoutPolicy,
    pub currency_symbol: String,
}

impl AppState {
    /// Prepares the database file and applies migrations.
    pub async fn init(config: &Config) -> Result<Self, AppError> {
        if let Some(parent) = config
            .database_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = db::connect_options(&config.database_path);
        db::migrate(&db).await?;
        log::info!("Database ready at {}", config.database_path.display());

        Ok(Self {
            db,
            lockout: LockoutPolicy::new(config.max_login_attempts, config.lock_minutes),
            currency_symbol: config.currency_symbol.clone(),
        })
    }
}

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        let mut tera = match Tera::new("templates/**/*") {
            Ok(t) => t,
            Err(e) => {
                log::error!("Parsing error(s): {}", e);
                ::std::process::exit(1);
            }
        };
        tera.autoescape_on(vec![".html"]);
        tera
    };
}

pub fn session_middleware(key: Key, cookie_secure: bool) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name(SESSION_COOKIE.to_string())
        .cookie_secure(cookie_secure)
        .build()
}

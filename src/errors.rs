use actix_web::{http::header, http::StatusCode, HttpResponse, ResponseError};
use sqlx::migrate::MigrateError;
use sqlx::Error as SqlxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid username or password")]
    InvalidCredential,

    #[error("Account locked. Try again later.")]
    AccountLocked,

    #[error("Username already exists")]
    IdentityTaken,

    #[error("Amount must be a non-negative number")]
    InvalidAmount,

    #[error("Login required")]
    Unauthenticated,

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Migration error: {0}")]
    Migrate(#[from] MigrateError),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Password hashing error: {0}")]
    Password(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredential | AppError::AccountLocked => StatusCode::UNAUTHORIZED,
            AppError::IdentityTaken => StatusCode::CONFLICT,
            AppError::InvalidAmount => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::SEE_OTHER,
            AppError::Database(_)
            | AppError::Migrate(_)
            | AppError::Template(_)
            | AppError::Password(_)
            | AppError::Session(_)
            | AppError::Config(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Unauthenticated => HttpResponse::SeeOther()
                .append_header((header::LOCATION, "/"))
                .finish(),
            AppError::InvalidCredential
            | AppError::AccountLocked
            | AppError::IdentityTaken
            | AppError::InvalidAmount => {
                HttpResponse::build(self.status_code()).body(self.to_string())
            }
            _ => {
                log::error!("Request failed: {}", self);
                HttpResponse::build(self.status_code()).body("Internal server error")
            }
        }
    }
}

impl From<AppError> for std::io::Error {
    fn from(err: AppError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
    }
}

//! Session gate for routes that need a logged-in user.

use std::future::{ready, Ready};

use actix_identity::IdentityExt;
use actix_web::{dev::Payload, FromRequest, HttpRequest};

use crate::errors::AppError;

/// The identity bound to the request's signed session cookie. Extraction
/// fails with [`AppError::Unauthenticated`], which redirects to the login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = req
            .get_identity()
            .ok()
            .and_then(|identity| identity.id().ok())
            .map(CurrentUser)
            .ok_or(AppError::Unauthenticated);
        ready(user)
    }
}

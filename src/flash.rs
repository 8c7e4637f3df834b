//! One-shot notices carried in the session cookie until the next page render.

use actix_session::Session;
use serde::{Deserialize, Serialize};

const FLASH_KEY: &str = "_flashes";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Danger,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

pub fn push(session: &Session, level: Level, message: impl Into<String>) {
    let mut pending = peek(session);
    pending.push(Flash {
        level,
        message: message.into(),
    });
    if let Err(e) = session.insert(FLASH_KEY, pending) {
        log::error!("Failed to store flash message: {}", e);
    }
}

pub fn success(session: &Session, message: impl Into<String>) {
    push(session, Level::Success, message)
}

pub fn danger(session: &Session, message: impl Into<String>) {
    push(session, Level::Danger, message)
}

/// Returns and clears the pending notices.
pub fn take(session: &Session) -> Vec<Flash> {
    let pending = peek(session);
    if !pending.is_empty() {
        session.remove(FLASH_KEY);
    }
    pending
}

fn peek(session: &Session) -> Vec<Flash> {
    session
        .get::<Vec<Flash>>(FLASH_KEY)
        .unwrap_or_else(|e| {
            log::warn!("Discarding unreadable flash messages: {}", e);
            None
        })
        .unwrap_or_default()
}

//! Account registration and the login lockout state machine.

use chrono::{Duration, NaiveDateTime};
use sqlx::SqliteConnection;

use crate::{db, errors::AppError, structs::Account, utils};

pub const LOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DEFAULT_LOCK_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_attempts: i64,
    pub window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            window: Duration::minutes(DEFAULT_LOCK_MINUTES),
        }
    }
}

impl LockoutPolicy {
    /// A lock length that does not fit a `Duration` falls back to five minutes.
    pub fn new(max_attempts: i64, lock_minutes: i64) -> Self {
        let window = Duration::try_minutes(lock_minutes).unwrap_or_else(|| {
            log::warn!("Lock length of {} minutes is out of range, using the default", lock_minutes);
            Duration::minutes(DEFAULT_LOCK_MINUTES)
        });
        Self { max_attempts, window }
    }

    /// When the lock on `account` expires, if it is still active at `now`.
    pub fn locked_until(&self, account: &Account, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let raw = account.lock_time.as_deref()?;
        let locked_at = match NaiveDateTime::parse_from_str(raw, LOCK_TIME_FORMAT) {
            Ok(ts) => ts,
            Err(e) => {
                log::warn!("Ignoring unreadable lock_time {:?} for {}: {}", raw, account.username, e);
                return None;
            }
        };
        // A window reaching past the calendar keeps the account locked.
        let until = locked_at
            .checked_add_signed(self.window)
            .unwrap_or(NaiveDateTime::MAX);
        (now < until).then_some(until)
    }
}

/// Creates an account; the UNIQUE constraint decides whether the name is free.
pub async fn register(
    conn: &mut SqliteConnection,
    username: &str,
    password: &str,
) -> Result<(), AppError> {
    let pwd_hash = utils::hash_password(password)?;
    match db::insert_account(conn, username, &pwd_hash).await {
        Ok(()) => {
            log::info!("Account created: {}", username);
            Ok(())
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::IdentityTaken),
        Err(e) => Err(AppError::Database(e)),
    }
}

pub async fn authenticate(
    conn: &mut SqliteConnection,
    policy: &LockoutPolicy,
    username: &str,
    password: &str,
    now: NaiveDateTime,
) -> Result<Account, AppError> {
    let Some(account) = db::find_account(conn, username).await? else {
        log::warn!("Login attempt for unknown account {:?}", username);
        return Err(AppError::InvalidCredential);
    };

    if let Some(until) = policy.locked_until(&account, now) {
        log::warn!("Login refused for locked account {} (until {})", username, until);
        return Err(AppError::AccountLocked);
    }

    if utils::verify_password(password, &account.password) {
        db::reset_attempts(conn, username).await?;
        log::info!("Login succeeded for {}", username);
        return Ok(Account {
            attempts: 0,
            lock_time: None,
            ..account
        });
    }

    let attempts = account.attempts.max(0) + 1;
    if attempts >= policy.max_attempts {
        let lock_time = now.format(LOCK_TIME_FORMAT).to_string();
        db::record_failed_attempt(conn, username, attempts, Some(&lock_time)).await?;
        log::warn!("Account {} locked after {} failed attempts", username, attempts);
        Err(AppError::AccountLocked)
    } else {
        db::record_failed_attempt(conn, username, attempts, None).await?;
        log::warn!("Wrong password for {} ({} of {})", username, attempts, policy.max_attempts);
        Err(AppError::InvalidCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::scratch;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_username_is_taken() {
        let (_dir, mut conn) = scratch::open().await;
        register(&mut conn, "alice", "pw").await.unwrap();
        let err = register(&mut conn, "alice", "other").await.unwrap_err();
        assert!(matches!(err, AppError::IdentityTaken));
    }

    #[tokio::test]
    async fn password_is_stored_hashed() {
        let (_dir, mut conn) = scratch::open().await;
        register(&mut conn, "alice", "pw").await.unwrap();
        let account = db::find_account(&mut conn, "alice").await.unwrap().unwrap();
        assert_ne!(account.password, "pw");
        assert!(account.password.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn unknown_user_is_invalid_credential() {
        let (_dir, mut conn) = scratch::open().await;
        let err = authenticate(&mut conn, &LockoutPolicy::default(), "ghost", "pw", at(9, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential));
    }

    #[tokio::test]
    async fn third_failure_locks_even_the_right_password() {
        let (_dir, mut conn) = scratch::open().await;
        let policy = LockoutPolicy::default();
        register(&mut conn, "alice", "right").await.unwrap();

        for _ in 0..2 {
            let err = authenticate(&mut conn, &policy, "alice", "wrong", at(9, 0, 0)).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidCredential));
        }
        let err = authenticate(&mut conn, &policy, "alice", "wrong", at(9, 0, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::AccountLocked));

        let err = authenticate(&mut conn, &policy, "alice", "right", at(9, 4, 59)).await.unwrap_err();
        assert!(matches!(err, AppError::AccountLocked));

        let account = db::find_account(&mut conn, "alice").await.unwrap().unwrap();
        assert_eq!(account.attempts, 3);
        assert_eq!(account.lock_time.as_deref(), Some("2024-01-15 09:00:00"));
    }

    #[tokio::test]
    async fn lock_lasts_exactly_the_window() {
        let (_dir, mut conn) = scratch::open().await;
        let policy = LockoutPolicy::default();
        register(&mut conn, "alice", "right").await.unwrap();
        for _ in 0..3 {
            let _ = authenticate(&mut conn, &policy, "alice", "wrong", at(9, 0, 0)).await;
        }

        let account = db::find_account(&mut conn, "alice").await.unwrap().unwrap();
        assert_eq!(policy.locked_until(&account, at(9, 4, 59)), Some(at(9, 5, 0)));
        assert_eq!(policy.locked_until(&account, at(9, 5, 0)), None);

        let account = authenticate(&mut conn, &policy, "alice", "right", at(9, 5, 0)).await.unwrap();
        assert_eq!(account.attempts, 0);
        let stored = db::find_account(&mut conn, "alice").await.unwrap().unwrap();
        assert_eq!(stored.attempts, 0);
        assert_eq!(stored.lock_time, None);
    }

    #[tokio::test]
    async fn success_resets_partial_failures() {
        let (_dir, mut conn) = scratch::open().await;
        let policy = LockoutPolicy::default();
        register(&mut conn, "alice", "right").await.unwrap();
        for _ in 0..2 {
            let _ = authenticate(&mut conn, &policy, "alice", "wrong", at(9, 0, 0)).await;
        }
        authenticate(&mut conn, &policy, "alice", "right", at(9, 0, 1)).await.unwrap();

        // the counter starts over, so two more failures do not lock
        for _ in 0..2 {
            let err = authenticate(&mut conn, &policy, "alice", "wrong", at(9, 0, 2)).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidCredential));
        }
    }

    #[tokio::test]
    async fn failure_after_expired_lock_relocks() {
        let (_dir, mut conn) = scratch::open().await;
        let policy = LockoutPolicy::default();
        register(&mut conn, "alice", "right").await.unwrap();
        for _ in 0..3 {
            let _ = authenticate(&mut conn, &policy, "alice", "wrong", at(9, 0, 0)).await;
        }
        let err = authenticate(&mut conn, &policy, "alice", "wrong", at(10, 0, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::AccountLocked));
        let account = db::find_account(&mut conn, "alice").await.unwrap().unwrap();
        assert_eq!(account.lock_time.as_deref(), Some("2024-01-15 10:00:00"));
    }

    #[test]
    fn oversized_lock_length_falls_back_to_default() {
        let policy = LockoutPolicy::new(3, i64::MAX);
        assert_eq!(policy.window, Duration::minutes(5));
        assert_eq!(LockoutPolicy::new(3, 60).window, Duration::minutes(60));
    }

    #[test]
    fn window_past_the_calendar_stays_locked() {
        let policy = LockoutPolicy::new(3, i64::MAX / 60_000);
        let account = Account {
            id: 1,
            username: "alice".into(),
            password: String::new(),
            attempts: 3,
            lock_time: Some("2024-01-15 09:00:00".into()),
        };
        assert_eq!(policy.locked_until(&account, at(9, 0, 0)), Some(NaiveDateTime::MAX));
    }
}

use std::path::Path;
use std::time::Duration;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    Connection, SqliteConnection,
};

use crate::{
    errors::AppError,
    structs::{Account, Expense, ExpenseRow},
    AppState,
};

const EXPENSE_COLUMNS: &str = "id, COALESCE(user, '') AS user, \
     COALESCE(CAST(amount AS TEXT), '') AS amount, \
     COALESCE(category, '') AS category, COALESCE(date, '') AS date";

pub fn connect_options(path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .read_only(false)
        .busy_timeout(Duration::from_secs(10))
}

/// Opens a connection for the duration of one request.
pub async fn connect(state: &AppState) -> Result<SqliteConnection, AppError> {
    SqliteConnection::connect_with(&state.db).await.map_err(|e| {
        log::error!("Failed to open database connection: {}", e);
        AppError::Database(e)
    })
}

pub async fn migrate(options: &SqliteConnectOptions) -> Result<(), AppError> {
    let mut conn = SqliteConnection::connect_with(options).await?;
    sqlx::migrate!().run(&mut conn).await?;
    conn.close().await?;
    Ok(())
}

// ----- accounts -----

pub async fn find_account(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>(
        "SELECT id, username, COALESCE(password, '') AS password, \
         COALESCE(attempts, 0) AS attempts, lock_time \
         FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn insert_account(
    conn: &mut SqliteConnection,
    username: &str,
    pwd_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO users (username, password) VALUES ($1, $2)")
        .bind(username)
        .bind(pwd_hash)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn reset_attempts(conn: &mut SqliteConnection, username: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET attempts = 0, lock_time = NULL WHERE username = $1")
        .bind(username)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn record_failed_attempt(
    conn: &mut SqliteConnection,
    username: &str,
    attempts: i64,
    lock_time: Option<&str>,
) -> Result<(), sqlx::Error> {
    let query = match lock_time {
        Some(lock_time) => sqlx::query(
            "UPDATE users SET attempts = $1, lock_time = $2 WHERE username = $3",
        )
        .bind(attempts)
        .bind(lock_time)
        .bind(username),
        None => sqlx::query("UPDATE users SET attempts = $1 WHERE username = $2")
            .bind(attempts)
            .bind(username),
    };
    query.execute(&mut *conn).await?;
    Ok(())
}

// ----- expenses -----

pub async fn insert_expense(
    conn: &mut SqliteConnection,
    user: &str,
    amount: f64,
    category: &str,
    date: &str,
) -> Result<i64, sqlx::Error> {
    let result =
        sqlx::query("INSERT INTO expenses (user, amount, category, date) VALUES ($1, $2, $3, $4)")
            .bind(user)
            .bind(amount)
            .bind(category)
            .bind(date)
            .execute(&mut *conn)
            .await?;
    Ok(result.last_insert_rowid())
}

/// Records of `user` in insertion order, optionally restricted to a `YYYY-MM` month.
pub async fn list_expenses(
    conn: &mut SqliteConnection,
    user: &str,
    month: Option<&str>,
) -> Result<Vec<Expense>, sqlx::Error> {
    let rows = match month {
        Some(month) => {
            sqlx::query_as::<_, ExpenseRow>(&format!(
                "SELECT {EXPENSE_COLUMNS} FROM expenses \
                 WHERE user = $1 AND substr(date, 1, 7) = $2 ORDER BY id"
            ))
            .bind(user)
            .bind(month)
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_as::<_, ExpenseRow>(&format!(
                "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE user = $1 ORDER BY id"
            ))
            .bind(user)
            .fetch_all(&mut *conn)
            .await?
        }
    };
    Ok(rows.into_iter().map(Expense::from).collect())
}

pub async fn get_expense(
    conn: &mut SqliteConnection,
    id: i64,
    user: &str,
) -> Result<Option<Expense>, sqlx::Error> {
    let row = sqlx::query_as::<_, ExpenseRow>(&format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1 AND user = $2"
    ))
    .bind(id)
    .bind(user)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Expense::from))
}

/// Full overwrite. Rows owned by someone else are left untouched.
pub async fn update_expense(
    conn: &mut SqliteConnection,
    id: i64,
    user: &str,
    amount: f64,
    category: &str,
    date: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE expenses SET amount = $1, category = $2, date = $3 WHERE id = $4 AND user = $5",
    )
    .bind(amount)
    .bind(category)
    .bind(date)
    .bind(id)
    .bind(user)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_expense(
    conn: &mut SqliteConnection,
    id: i64,
    user: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND user = $2")
        .bind(id)
        .bind(user)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_expenses_in_month(
    conn: &mut SqliteConnection,
    user: &str,
    month: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM expenses WHERE user = $1 AND substr(date, 1, 7) = $2")
        .bind(user)
        .bind(month)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_all_expenses(conn: &mut SqliteConnection, user: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM expenses WHERE user = $1")
        .bind(user)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

// ----- budgets -----

/// Replaces the budget of `user` for `month`; at most one row per pair survives.
pub async fn set_budget(
    conn: &mut SqliteConnection,
    user: &str,
    month: &str,
    amount: f64,
) -> Result<(), sqlx::Error> {
    let mut tx = conn.begin().await?;
    sqlx::query("DELETE FROM budgets WHERE user = $1 AND month = $2")
        .bind(user)
        .bind(month)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO budgets (user, month, amount) VALUES ($1, $2, $3)")
        .bind(user)
        .bind(month)
        .bind(amount)
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}

pub async fn get_budget(
    conn: &mut SqliteConnection,
    user: &str,
    month: &str,
) -> Result<Option<f64>, sqlx::Error> {
    let amount: Option<String> = sqlx::query_scalar(
        "SELECT COALESCE(CAST(amount AS TEXT), '') FROM budgets \
         WHERE user = $1 AND month = $2 ORDER BY id DESC LIMIT 1",
    )
    .bind(user)
    .bind(month)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(amount.map(|raw| crate::utils::parse_amount(&raw)))
}

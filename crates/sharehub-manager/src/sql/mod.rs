//! SQL backend: sqlx repositories over SQLite.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use sharehub_core::error::{AppError, ErrorKind};
use sharehub_core::result::AppResult;

mod public;
mod share;

pub use public::SqlPublicShareManager;
pub use share::SqlShareManager;

/// Open a SQLite pool for the given connection URL.
///
/// In-memory databases exist per connection, so they are pinned to a
/// single-connection pool.
pub async fn connect(url: &str) -> AppResult<SqlitePool> {
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to connect to database: {url}"),
                e,
            )
        })
}

/// Map a sqlx error into the application taxonomy.
pub(crate) fn map_sqlx(action: &str, e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::RowNotFound => AppError::not_found(format!("{action}: no such row")),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::already_exists(format!("{action}: unique constraint violated"))
        }
        _ => AppError::with_source(ErrorKind::Database, format!("Failed to {action}"), e),
    }
}

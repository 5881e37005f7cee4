// SPDX-License-Identifier: MIT

//! Connection pool setup and embedded migrations (spec §3.1). One pool per
//! process; migrations are forward-only and baked into the binary so a
//! fresh deployment and an upgrade both run through the same path.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::StorageError;

/// Open (creating if necessary) the sqlite database at `database_url` and
/// run any migrations that haven't yet been applied.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StorageError> {
    let options: SqliteConnectOptions = database_url.parse::<SqliteConnectOptions>()?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(database_url, "storage pool ready");
    Ok(pool)
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT

use chrono::Utc;
use cook_core::Repository;
use sqlx::SqlitePool;

use crate::error::StorageError;

#[derive(sqlx::FromRow)]
struct RepositoryRow {
    owner: String,
    name: String,
    created_at: String,
}

impl TryFrom<RepositoryRow> for Repository {
    type Error = StorageError;

    fn try_from(row: RepositoryRow) -> Result<Self, Self::Error> {
        Ok(Repository {
            owner: row.owner,
            name: row.name,
            created_at: row
                .created_at
                .parse()
                .map_err(|_| StorageError::BadStatus { field: "created_at", value: row.created_at })?,
        })
    }
}

pub async fn insert(pool: &SqlitePool, owner: &str, name: &str) -> Result<Repository, StorageError> {
    let created_at = Utc::now();
    sqlx::query("INSERT INTO repositories (owner, name, created_at) VALUES (?, ?, ?)")
        .bind(owner)
        .bind(name)
        .bind(created_at.to_rfc3339())
        .execute(pool)
        .await?;
    Ok(Repository { owner: owner.to_string(), name: name.to_string(), created_at })
}

pub async fn get(pool: &SqlitePool, owner: &str, name: &str) -> Result<Option<Repository>, StorageError> {
    let row = sqlx::query_as::<_, RepositoryRow>("SELECT owner, name, created_at FROM repositories WHERE owner = ? AND name = ?")
        .bind(owner)
        .bind(name)
        .fetch_optional(pool)
        .await?;
    row.map(Repository::try_from).transpose()
}

pub async fn exists(pool: &SqlitePool, owner: &str, name: &str) -> Result<bool, StorageError> {
    Ok(get(pool, owner, name).await?.is_some())
}

#[cfg(test)]
#[path = "repositories_tests.rs"]
mod tests;

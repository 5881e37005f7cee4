// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("malformed environment_json: {0}")]
    Environment(String),
    #[error("malformed stored status {field}: {value:?}")]
    BadStatus { field: &'static str, value: String },
    #[error(transparent)]
    Core(#[from] cook_core::CoreError),
}

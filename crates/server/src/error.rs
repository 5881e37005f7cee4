// SPDX-License-Identifier: MIT

//! Unified error codes for the HTTP/WebSocket API (spec §7): backend
//! operations return `anyhow::Result` internally and are converted to a
//! `CookError` with an explicit HTTP-status mapping at the boundary.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    NotFound,
    Conflict,
    PreconditionFailed,
    BadRequest,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::BadRequest => "BAD_REQUEST",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API-boundary error: a code plus a human-readable message, serialized as
/// a structured JSON body.
#[derive(Debug)]
pub struct CookError {
    pub code: ErrorCode,
    pub message: String,
}

impl CookError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PreconditionFailed, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl fmt::Display for CookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CookError {}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: ErrorCode,
}

impl IntoResponse for CookError {
    fn into_response(self) -> Response {
        tracing::error!(code = %self.code, message = %self.message, "request failed");
        let body = ErrorBody { error: self.message, code: self.code };
        (self.code.http_status(), axum::Json(body)).into_response()
    }
}

impl From<cook_storage::StorageError> for CookError {
    fn from(err: cook_storage::StorageError) -> Self {
        match err {
            cook_storage::StorageError::Core(core_err) => core_err.into(),
            other => CookError::internal(other.to_string()),
        }
    }
}

impl From<cook_core::CoreError> for CookError {
    fn from(err: cook_core::CoreError) -> Self {
        use cook_core::CoreError::*;
        match err {
            RepositoryExists | TaskExists | BranchExists => CookError::conflict(err.to_string()),
            RepositoryNotFound | TaskNotFound | BranchNotFound => CookError::not_found(err.to_string()),
            InvalidBranchName => CookError::bad_request(err.to_string()),
            BranchNotActive | NoGatesConfigured | GateNotRun(_) | GateNotPassed(_) | GateStale { .. } | BehindMaster | RebaseConflict(_) => {
                CookError::precondition_failed(err.to_string())
            }
            Environment(_) | Git(_) | GateConfig(_) | Io(_) => CookError::internal(err.to_string()),
        }
    }
}

impl From<cook_environment::EnvironmentError> for CookError {
    fn from(err: cook_environment::EnvironmentError) -> Self {
        CookError::internal(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT

//! Cook server (spec component C12): the HTTP+WebSocket API that owns
//! repositories, tasks, branches, gate runs, and agent sessions, wiring
//! `cook-core`'s domain model to `cook-storage`'s persistence and
//! `cook-environment`'s backends.

pub mod config;
pub mod dto;
pub mod error;
pub mod routes;
pub mod run;
pub mod state;

pub use config::Config;
pub use error::CookError;
pub use state::Store;

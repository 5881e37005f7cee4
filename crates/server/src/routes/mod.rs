// SPDX-License-Identifier: MIT

//! Route handlers grouped by resource (spec §4.11).

pub mod branches;
pub mod repos;
pub mod tasks;
pub mod ws;

// SPDX-License-Identifier: MIT

use std::sync::Arc;

use cook_terminal::manager::TerminalManager;

/// Shared state handed to every axum route.
pub struct Store {
    pub manager: Arc<TerminalManager>,
}

impl Store {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { manager: Arc::new(TerminalManager::new()) })
    }
}

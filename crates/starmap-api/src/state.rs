//! Shared application state for the movement API.
//!
//! The API holds no game state of its own; every request goes through the
//! [`MovementService`], which owns the store handle, catalog and rules.

use std::sync::Arc;

use starmap_core::MovementService;

/// State shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The movement engine.
    pub service: Arc<MovementService>,
}

impl AppState {
    /// Wrap a movement service.
    pub const fn new(service: Arc<MovementService>) -> Self {
        Self { service }
    }
}

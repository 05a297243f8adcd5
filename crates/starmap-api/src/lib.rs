//! HTTP controller for the Starmap movement engine.
//!
//! A thin Axum layer over [`MovementService`]: it reads the acting player
//! from gateway headers, validates request bodies, authorizes the target
//! planet, and maps core errors onto HTTP status codes. Game rules live
//! in `starmap-core`.
//!
//! | Status | Meaning |
//! |---|---|
//! | `201` | Movement dispatched |
//! | `400` | Malformed body or header, or the dispatch was rejected |
//! | `401` | No `x-player-id` / `x-planet-id` header |
//! | `403` | Target is not hostile/friendly, or the actor does not own its planet |
//! | `404` | Unknown planet or movement |
//! | `500` | Store failure |
//!
//! [`MovementService`]: starmap_core::MovementService

pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;

//! Error types for the server binary.
//!
//! [`ServerError`] is the top-level error type that wraps every failure
//! mode during startup and shutdown.

/// Top-level error for the server binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: starmap_core::config::ConfigError,
    },

    /// Database connection, migration or seeding failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: starmap_db::DbError,
    },

    /// Loading reference data through the store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: starmap_core::StoreError,
    },

    /// The HTTP API failed to bind or serve.
    #[error("http error: {source}")]
    Http {
        /// The underlying server error.
        #[from]
        source: starmap_api::ServerError,
    },

    /// The scheduler task panicked or was cancelled.
    #[error("scheduler error: {message}")]
    Scheduler {
        /// Description of the scheduler failure.
        message: String,
    },
}

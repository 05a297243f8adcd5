//! `PostgreSQL` data layer for the Starmap movement engine.
//!
//! Implements the engine's [`MovementStore`] / [`UnitOfWork`] seam on top
//! of [`sqlx`]. Each unit of work is one database transaction, so a
//! dispatch or a resolution is either fully applied or not at all.
//!
//! ```text
//! MovementService
//!     |
//!     +-- begin() --------> PgUnitOfWork (BEGIN)
//!     |                        |-- SELECT ... FOR UPDATE  (movement, planet, populations)
//!     |                        |-- conditional UPDATE     (reserve, debit)
//!     |                        |-- INSERT                 (movement, report, ledger)
//!     +-- commit() ----------> COMMIT
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool and configuration
//! - [`store`] -- [`PgMovementStore`] and [`PgUnitOfWork`]
//! - [`rows`] -- Table rows and their domain conversions
//! - [`error`] -- Shared error types
//!
//! [`MovementStore`]: starmap_core::MovementStore
//! [`UnitOfWork`]: starmap_core::UnitOfWork

pub mod error;
pub mod postgres;
pub mod rows;
pub mod store;

pub use error::DbError;
pub use postgres::{PostgresConfig, PostgresPool};
pub use store::{PgMovementStore, PgUnitOfWork};

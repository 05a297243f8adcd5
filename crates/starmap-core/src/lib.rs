//! Movement dispatch and resolution engine for the Starmap game backend.
//!
//! Players dispatch groups of units from their active planet toward a
//! target planet. A dispatch reserves the units (and any cargo) in one
//! unit of work and persists an `en_route` [`Movement`]; once its travel
//! time has elapsed the scheduler hands it to the resolver, which applies
//! the outcome for its type and marks it resolved.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `starmap-config.yaml` into
//!   strongly-typed structs.
//! - [`catalog`] -- The unit reference catalog.
//! - [`travel`] -- Deterministic travel time between planets.
//! - [`combat`] -- [`CombatModel`] trait and the default [`AttritionCombat`].
//! - [`policy`] -- [`GamePolicy`] trait, the acting player, and the
//!   ownership-based default policy.
//! - [`store`] -- [`MovementStore`] / [`UnitOfWork`] persistence traits.
//! - [`memory`] -- In-memory store used by tests and local runs.
//! - [`factory`] -- Dispatch validation and movement creation.
//! - [`resolver`] -- Per-type movement resolution.
//! - [`service`] -- [`MovementService`], the entry point for callers.
//! - [`scheduler`] -- Periodic resolution of due movements.
//!
//! [`Movement`]: starmap_types::Movement
//! [`CombatModel`]: combat::CombatModel
//! [`AttritionCombat`]: combat::AttritionCombat
//! [`GamePolicy`]: policy::GamePolicy
//! [`MovementStore`]: store::MovementStore
//! [`UnitOfWork`]: store::UnitOfWork
//! [`MovementService`]: service::MovementService

pub mod catalog;
pub mod combat;
pub mod config;
pub mod factory;
pub mod memory;
pub mod policy;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod travel;

pub use catalog::UnitCatalog;
pub use combat::{AttritionCombat, CombatModel};
pub use config::StarmapConfig;
pub use factory::{DispatchError, DispatchRequest};
pub use memory::{MemoryStore, WorldState};
pub use policy::{Actor, GamePolicy, OwnershipPolicy};
pub use resolver::{Resolution, ResolveError};
pub use service::MovementService;
pub use store::{MovementStore, StoreError, UnitOfWork};
pub use travel::{TravelCalculator, TravelError};

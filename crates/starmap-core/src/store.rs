//! Persistence seam between the engine and its backing store.
//!
//! Every dispatch and every resolution runs inside one [`UnitOfWork`]
//! obtained from a [`MovementStore`]. A unit of work either commits all of
//! its writes or none: dropping it without calling
//! [`UnitOfWork::commit`] rolls everything back. Implementations must
//! provide:
//!
//! - an atomic check-and-decrement in [`UnitOfWork::reserve`] and
//!   [`UnitOfWork::debit_resource`] (no read-then-write race),
//! - a row lock in [`UnitOfWork::movement_for_update`] and
//!   [`UnitOfWork::lock_planet`] held until commit or rollback,
//! - a conditional state transition in [`UnitOfWork::finalize_movement`]
//!   that only succeeds while the movement is still `en_route`.
//!
//! Locks are taken in a fixed order: movement, then planet, then the
//! planet's populations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use starmap_ledger::LedgerError;
use starmap_types::{
    LedgerEntry, Movement, MovementId, MovementOutcome, Planet, PlanetId, PlayerId, Population,
    Report, Resource, Unit, UnitId,
};

use crate::config::TieBreak;

/// Errors surfaced by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A quantity rule was violated (insufficient units or resources).
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The referenced planet does not exist.
    #[error("planet {0} not found")]
    PlanetNotFound(PlanetId),

    /// The referenced movement does not exist.
    #[error("movement {0} not found")]
    MovementNotFound(MovementId),

    /// A stored value could not be decoded.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),

    /// The backend failed (connection, query, serialization).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Entry point to a transactional store.
#[async_trait]
pub trait MovementStore: Send + Sync {
    /// Start a unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError>;

    /// Ids of `en_route` movements with `arrives_at <= now`, ordered by
    /// `tie_break`, at most `limit` of them.
    async fn due_movements(
        &self,
        now: DateTime<Utc>,
        limit: u32,
        tie_break: TieBreak,
    ) -> Result<Vec<MovementId>, StoreError>;

    /// Read a movement without locking it.
    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError>;

    /// Read a planet without locking it.
    async fn planet(&self, id: PlanetId) -> Result<Option<Planet>, StoreError>;

    /// The unit reference data held by the store.
    async fn units(&self) -> Result<Vec<Unit>, StoreError>;

    /// Reports visible to `player`, newest first.
    async fn reports_for(&self, player: PlayerId) -> Result<Vec<Report>, StoreError>;

    /// Ledger entries touching `movement` as source or destination, in
    /// insertion order.
    async fn ledger_for(&self, movement: MovementId) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// One atomic unit of work. Dropping it without committing rolls back.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Read a planet.
    async fn planet(&mut self, id: PlanetId) -> Result<Option<Planet>, StoreError>;

    /// Read a planet and hold its row lock until the unit of work ends.
    async fn lock_planet(&mut self, id: PlanetId) -> Result<Option<Planet>, StoreError>;

    /// All population rows at `planet`.
    async fn populations_at(&mut self, planet: PlanetId) -> Result<Vec<Population>, StoreError>;

    /// Atomically take `amount` units. Fails with
    /// [`LedgerError::InsufficientQuantity`] and no effect when short.
    /// Returns the remaining quantity.
    async fn reserve(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> Result<u64, StoreError>;

    /// Add units, creating the row when absent. Returns the new quantity.
    async fn credit(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> Result<u64, StoreError>;

    /// Remove up to `amount` units, clamped at zero. Returns the amount
    /// actually removed.
    async fn remove_up_to(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> Result<u64, StoreError>;

    /// Atomically take resources from a planet's stock. Fails with
    /// [`LedgerError::InsufficientResource`] and no effect when short.
    async fn debit_resource(
        &mut self,
        planet: PlanetId,
        resource: Resource,
        amount: u64,
    ) -> Result<u64, StoreError>;

    /// Add resources to a planet's stock. Returns the new amount.
    async fn credit_resource(
        &mut self,
        planet: PlanetId,
        resource: Resource,
        amount: u64,
    ) -> Result<u64, StoreError>;

    /// Transfer planet ownership and re-own every population stationed
    /// there to `owner`.
    async fn set_owner(&mut self, planet: PlanetId, owner: PlayerId) -> Result<(), StoreError>;

    /// Persist a new movement.
    async fn insert_movement(&mut self, movement: &Movement) -> Result<(), StoreError>;

    /// Read a movement and hold its row lock until the unit of work ends.
    async fn movement_for_update(&mut self, id: MovementId) -> Result<Option<Movement>, StoreError>;

    /// Mark a movement resolved with `outcome`, only if it is still
    /// `en_route`. Returns whether the transition happened.
    async fn finalize_movement(
        &mut self,
        id: MovementId,
        outcome: &MovementOutcome,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Persist a report.
    async fn insert_report(&mut self, report: &Report) -> Result<(), StoreError>;

    /// Append ledger entries.
    async fn record_ledger(&mut self, entries: &[LedgerEntry]) -> Result<(), StoreError>;

    /// Ledger entries touching `movement`, including ones written earlier
    /// in this unit of work.
    async fn ledger_for(&mut self, movement: MovementId) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Make every write of this unit of work durable.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

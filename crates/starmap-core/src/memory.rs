//! In-memory [`MovementStore`] used by tests and local runs.
//!
//! The whole world sits behind one async mutex. A unit of work takes the
//! lock for its entire lifetime and works on a copy of the world; commit
//! writes the copy back, and dropping the unit of work discards it. This
//! serializes units of work, which trivially satisfies the store's
//! atomicity and locking contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use starmap_ledger::quantity::{credit_stock, debit_stock};
use starmap_ledger::{Journal, LedgerError, QuantityLedger};
use starmap_types::{
    LedgerEntry, Movement, MovementId, MovementOutcome, MovementState, Planet, PlanetId, PlayerId,
    Population, Report, Resource, Unit, UnitId,
};

use crate::catalog::UnitCatalog;
use crate::config::TieBreak;
use crate::store::{MovementStore, StoreError, UnitOfWork};

/// Everything the in-memory store holds.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    planets: BTreeMap<PlanetId, Planet>,
    populations: QuantityLedger,
    movements: BTreeMap<MovementId, Movement>,
    insertion: BTreeMap<MovementId, usize>,
    reports: Vec<Report>,
    journal: Journal,
}

impl WorldState {
    /// An empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a planet.
    pub fn add_planet(&mut self, planet: Planet) {
        self.planets.insert(planet.id, planet);
    }

    /// Station `quantity` units at a planet.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the row would overflow.
    pub fn add_population(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        quantity: u64,
    ) -> Result<(), LedgerError> {
        self.populations.credit(planet, unit, owner, quantity).map(|_| ())
    }

    /// Look up a planet.
    pub fn planet(&self, id: PlanetId) -> Option<&Planet> {
        self.planets.get(&id)
    }

    /// Units of a type held by `owner` at `planet`.
    pub fn quantity(&self, planet: PlanetId, unit: UnitId, owner: PlayerId) -> u64 {
        self.populations.quantity(planet, unit, owner)
    }

    /// All population rows at `planet`.
    pub fn populations_at(&self, planet: PlanetId) -> Vec<Population> {
        self.populations.populations_at(planet)
    }

    /// Look up a movement.
    pub fn movement(&self, id: MovementId) -> Option<&Movement> {
        self.movements.get(&id)
    }

    /// All movements in id order.
    pub fn movements(&self) -> impl Iterator<Item = &Movement> {
        self.movements.values()
    }

    /// All reports in filing order.
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// The transfer journal.
    pub const fn journal(&self) -> &Journal {
        &self.journal
    }

    fn planet_mut(&mut self, id: PlanetId) -> Result<&mut Planet, StoreError> {
        self.planets
            .get_mut(&id)
            .ok_or(StoreError::PlanetNotFound(id))
    }

    fn entries_touching(&self, movement: MovementId) -> Vec<LedgerEntry> {
        let container = movement.into_inner();
        self.journal
            .all_entries()
            .iter()
            .filter(|e| {
                e.movement_id == movement || e.from_entity == container || e.to_entity == container
            })
            .cloned()
            .collect()
    }
}

/// Shared in-memory store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<WorldState>>,
    units: Arc<Vec<Unit>>,
}

impl MemoryStore {
    /// Wrap a prepared world.
    pub fn new(world: WorldState, catalog: &UnitCatalog) -> Self {
        Self {
            state: Arc::new(Mutex::new(world)),
            units: Arc::new(catalog.iter().cloned().collect()),
        }
    }

    /// A copy of the current committed world.
    pub async fn snapshot(&self) -> WorldState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl MovementStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn due_movements(
        &self,
        now: DateTime<Utc>,
        limit: u32,
        tie_break: TieBreak,
    ) -> Result<Vec<MovementId>, StoreError> {
        let state = self.state.lock().await;
        let mut due: Vec<&Movement> = state
            .movements
            .values()
            .filter(|m| m.is_en_route() && m.is_due(now))
            .collect();
        match tie_break {
            TieBreak::Arrival => due.sort_by_key(|m| (m.arrives_at, m.departed_at, m.id)),
            TieBreak::Insertion => {
                due.sort_by_key(|m| state.insertion.get(&m.id).copied().unwrap_or(usize::MAX));
            }
        }
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(due.into_iter().take(limit).map(|m| m.id).collect())
    }

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        Ok(self.state.lock().await.movements.get(&id).cloned())
    }

    async fn planet(&self, id: PlanetId) -> Result<Option<Planet>, StoreError> {
        Ok(self.state.lock().await.planets.get(&id).cloned())
    }

    async fn units(&self) -> Result<Vec<Unit>, StoreError> {
        Ok(self.units.as_ref().clone())
    }

    async fn reports_for(&self, player: PlayerId) -> Result<Vec<Report>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .reports
            .iter()
            .rev()
            .filter(|r| r.player == player)
            .cloned()
            .collect())
    }

    async fn ledger_for(&self, movement: MovementId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.state.lock().await.entries_touching(movement))
    }
}

/// Unit of work over a private copy of the world.
struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<WorldState>,
    working: WorldState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn planet(&mut self, id: PlanetId) -> Result<Option<Planet>, StoreError> {
        Ok(self.working.planets.get(&id).cloned())
    }

    async fn lock_planet(&mut self, id: PlanetId) -> Result<Option<Planet>, StoreError> {
        // The world lock is already held.
        Ok(self.working.planets.get(&id).cloned())
    }

    async fn populations_at(&mut self, planet: PlanetId) -> Result<Vec<Population>, StoreError> {
        Ok(self.working.populations.populations_at(planet))
    }

    async fn reserve(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> Result<u64, StoreError> {
        Ok(self.working.populations.reserve(planet, unit, owner, amount)?)
    }

    async fn credit(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> Result<u64, StoreError> {
        Ok(self.working.populations.credit(planet, unit, owner, amount)?)
    }

    async fn remove_up_to(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> Result<u64, StoreError> {
        Ok(self
            .working
            .populations
            .remove_up_to(planet, unit, owner, amount))
    }

    async fn debit_resource(
        &mut self,
        planet: PlanetId,
        resource: Resource,
        amount: u64,
    ) -> Result<u64, StoreError> {
        let planet = self.working.planet_mut(planet)?;
        Ok(debit_stock(&mut planet.resources, resource, amount)?)
    }

    async fn credit_resource(
        &mut self,
        planet: PlanetId,
        resource: Resource,
        amount: u64,
    ) -> Result<u64, StoreError> {
        let planet = self.working.planet_mut(planet)?;
        Ok(credit_stock(&mut planet.resources, resource, amount)?)
    }

    async fn set_owner(&mut self, planet: PlanetId, owner: PlayerId) -> Result<(), StoreError> {
        self.working.planet_mut(planet)?.owner = Some(owner);
        self.working.populations.reown(planet, owner)?;
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &Movement) -> Result<(), StoreError> {
        let seq = self.working.insertion.len();
        self.working.insertion.entry(movement.id).or_insert(seq);
        self.working.movements.insert(movement.id, movement.clone());
        Ok(())
    }

    async fn movement_for_update(
        &mut self,
        id: MovementId,
    ) -> Result<Option<Movement>, StoreError> {
        Ok(self.working.movements.get(&id).cloned())
    }

    async fn finalize_movement(
        &mut self,
        id: MovementId,
        outcome: &MovementOutcome,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let movement = self
            .working
            .movements
            .get_mut(&id)
            .ok_or(StoreError::MovementNotFound(id))?;
        if movement.state != MovementState::EnRoute {
            return Ok(false);
        }
        movement.state = MovementState::Resolved;
        movement.outcome = Some(outcome.clone());
        movement.resolved_at = Some(resolved_at);
        Ok(true)
    }

    async fn insert_report(&mut self, report: &Report) -> Result<(), StoreError> {
        self.working.reports.push(report.clone());
        Ok(())
    }

    async fn record_ledger(&mut self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        self.working.journal.extend(entries.iter().cloned());
        Ok(())
    }

    async fn ledger_for(&mut self, movement: MovementId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.working.entries_touching(movement))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self { mut guard, working } = *self;
        debug!(
            movements = working.movements.len(),
            ledger_entries = working.journal.len(),
            "Committing in-memory unit of work"
        );
        *guard = working;
        Ok(())
    }
}

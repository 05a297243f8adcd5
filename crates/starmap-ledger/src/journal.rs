//! The transfer journal: an append-only log of unit and resource transfers.
//!
//! A [`Journal`] is used in two ways: the movement service fills a fresh
//! journal while it computes a dispatch or resolution and hands the
//! entries to the store inside the same unit of work, and the in-memory
//! store keeps one journal for the lifetime of the world.
//!
//! # Design
//!
//! - **Append-only**: entries are never modified or deleted.
//! - **Double-entry**: every transfer has a debit (from) and credit (to).
//! - **Conservation**: a resolved movement releases exactly what it took.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use starmap_types::{
    Asset, EntityType, LedgerEntry, LedgerEntryType, MovementId, PlanetId, PlayerId, Resource,
    UnitId,
};

use crate::conservation::{ConservationResult, verify_movement};
use crate::{LedgerError, TransactionBuilder};

/// Parameters for recording a general ledger transfer.
///
/// Packs the many arguments of a transfer into a single struct to keep
/// call sites readable.
pub struct TransferParams {
    /// Movement the transfer belongs to.
    pub movement_id: MovementId,
    /// The category of transfer.
    pub entry_type: LedgerEntryType,
    /// What is transferred.
    pub asset: Asset,
    /// Player owning the asset.
    pub owner: PlayerId,
    /// Quantity transferred.
    pub quantity: u64,
    /// Source entity UUID.
    pub from_entity: Uuid,
    /// Source entity type.
    pub from_entity_type: EntityType,
    /// Destination entity UUID.
    pub to_entity: Uuid,
    /// Destination entity type.
    pub to_entity_type: EntityType,
}

/// Append-only log of transfers.
#[derive(Debug, Default, Clone)]
pub struct Journal {
    /// All entries, in insertion order.
    entries: Vec<LedgerEntry>,
    /// Timestamp applied to new entries; `None` means wall-clock now.
    clock: Option<DateTime<Utc>>,
}

impl Journal {
    /// Create a new empty journal.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            clock: None,
        }
    }

    /// Create a journal that stamps every entry with `at`.
    pub const fn at(at: DateTime<Utc>) -> Self {
        Self {
            entries: Vec::new(),
            clock: Some(at),
        }
    }

    /// Return the number of entries in the journal.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return whether the journal has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append pre-built entries (e.g. flushed from a unit of work).
    pub fn extend(&mut self, entries: impl IntoIterator<Item = LedgerEntry>) {
        self.entries.extend(entries);
    }

    /// Take all entries out of the journal, leaving it empty.
    pub fn drain(&mut self) -> Vec<LedgerEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Record a transfer between two entities.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_transfer(&mut self, params: TransferParams) -> Result<&LedgerEntry, LedgerError> {
        let mut builder =
            TransactionBuilder::new(params.movement_id, params.entry_type, params.asset)
                .owner(params.owner)
                .from(params.from_entity, params.from_entity_type)
                .to(params.to_entity, params.to_entity_type)
                .quantity(params.quantity);
        if let Some(at) = self.clock {
            builder = builder.at(at);
        }

        let entry = builder.build()?;
        self.entries.push(entry);

        self.entries
            .last()
            .ok_or(LedgerError::MissingField("entry after append"))
    }

    /// Record units reserved from a planet into a departing movement.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_dispatch(
        &mut self,
        movement: MovementId,
        owner: PlayerId,
        unit: UnitId,
        quantity: u64,
        planet: PlanetId,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.record_transfer(TransferParams {
            movement_id: movement,
            entry_type: LedgerEntryType::Dispatch,
            asset: Asset::Unit(unit),
            owner,
            quantity,
            from_entity: planet.into_inner(),
            from_entity_type: EntityType::Planet,
            to_entity: movement.into_inner(),
            to_entity_type: EntityType::Movement,
        })
    }

    /// Record resources loaded from a planet into a transport.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_cargo_load(
        &mut self,
        movement: MovementId,
        owner: PlayerId,
        resource: Resource,
        quantity: u64,
        planet: PlanetId,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.record_transfer(TransferParams {
            movement_id: movement,
            entry_type: LedgerEntryType::CargoLoad,
            asset: Asset::Resource(resource),
            owner,
            quantity,
            from_entity: planet.into_inner(),
            from_entity_type: EntityType::Planet,
            to_entity: movement.into_inner(),
            to_entity_type: EntityType::Movement,
        })
    }

    /// Record resources taken from a defeated planet.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_plunder(
        &mut self,
        movement: MovementId,
        owner: PlayerId,
        resource: Resource,
        quantity: u64,
        planet: PlanetId,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.record_transfer(TransferParams {
            movement_id: movement,
            entry_type: LedgerEntryType::Plunder,
            asset: Asset::Resource(resource),
            owner,
            quantity,
            from_entity: planet.into_inner(),
            from_entity_type: EntityType::Planet,
            to_entity: movement.into_inner(),
            to_entity_type: EntityType::Movement,
        })
    }

    /// Record an asset passed from an arriving movement to its return leg.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_handoff(
        &mut self,
        movement: MovementId,
        return_leg: MovementId,
        owner: PlayerId,
        asset: Asset,
        quantity: u64,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.record_transfer(TransferParams {
            movement_id: movement,
            entry_type: LedgerEntryType::Handoff,
            asset,
            owner,
            quantity,
            from_entity: movement.into_inner(),
            from_entity_type: EntityType::Movement,
            to_entity: return_leg.into_inner(),
            to_entity_type: EntityType::Movement,
        })
    }

    /// Record units credited back to their origin.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_return(
        &mut self,
        movement: MovementId,
        owner: PlayerId,
        unit: UnitId,
        quantity: u64,
        planet: PlanetId,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.record_transfer(TransferParams {
            movement_id: movement,
            entry_type: LedgerEntryType::Return,
            asset: Asset::Unit(unit),
            owner,
            quantity,
            from_entity: movement.into_inner(),
            from_entity_type: EntityType::Movement,
            to_entity: planet.into_inner(),
            to_entity_type: EntityType::Planet,
        })
    }

    /// Record units joining a friendly garrison.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_reinforce(
        &mut self,
        movement: MovementId,
        owner: PlayerId,
        unit: UnitId,
        quantity: u64,
        planet: PlanetId,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.record_transfer(TransferParams {
            movement_id: movement,
            entry_type: LedgerEntryType::Reinforce,
            asset: Asset::Unit(unit),
            owner,
            quantity,
            from_entity: movement.into_inner(),
            from_entity_type: EntityType::Movement,
            to_entity: planet.into_inner(),
            to_entity_type: EntityType::Planet,
        })
    }

    /// Record cargo credited to a planet's stock.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_cargo_unload(
        &mut self,
        movement: MovementId,
        owner: PlayerId,
        resource: Resource,
        quantity: u64,
        planet: PlanetId,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.record_transfer(TransferParams {
            movement_id: movement,
            entry_type: LedgerEntryType::CargoUnload,
            asset: Asset::Resource(resource),
            owner,
            quantity,
            from_entity: movement.into_inner(),
            from_entity_type: EntityType::Movement,
            to_entity: planet.into_inner(),
            to_entity_type: EntityType::Planet,
        })
    }

    /// Record units of a movement destroyed (combat, lost origin).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_casualty(
        &mut self,
        movement: MovementId,
        owner: PlayerId,
        unit: UnitId,
        quantity: u64,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.record_transfer(TransferParams {
            movement_id: movement,
            entry_type: LedgerEntryType::Casualty,
            asset: Asset::Unit(unit),
            owner,
            quantity,
            from_entity: movement.into_inner(),
            from_entity_type: EntityType::Movement,
            to_entity: Uuid::nil(),
            to_entity_type: EntityType::Void,
        })
    }

    /// Record cargo lost together with its carriers.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_cargo_loss(
        &mut self,
        movement: MovementId,
        owner: PlayerId,
        resource: Resource,
        quantity: u64,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.record_transfer(TransferParams {
            movement_id: movement,
            entry_type: LedgerEntryType::Casualty,
            asset: Asset::Resource(resource),
            owner,
            quantity,
            from_entity: movement.into_inner(),
            from_entity_type: EntityType::Movement,
            to_entity: Uuid::nil(),
            to_entity_type: EntityType::Void,
        })
    }

    /// Record garrison units destroyed while defending a planet.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_garrison_casualty(
        &mut self,
        movement: MovementId,
        owner: PlayerId,
        unit: UnitId,
        quantity: u64,
        planet: PlanetId,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.record_transfer(TransferParams {
            movement_id: movement,
            entry_type: LedgerEntryType::Casualty,
            asset: Asset::Unit(unit),
            owner,
            quantity,
            from_entity: planet.into_inner(),
            from_entity_type: EntityType::Planet,
            to_entity: Uuid::nil(),
            to_entity_type: EntityType::Void,
        })
    }

    /// Record settlers consumed by an occupation attempt.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_consume(
        &mut self,
        movement: MovementId,
        owner: PlayerId,
        unit: UnitId,
        quantity: u64,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.record_transfer(TransferParams {
            movement_id: movement,
            entry_type: LedgerEntryType::Consume,
            asset: Asset::Unit(unit),
            owner,
            quantity,
            from_entity: movement.into_inner(),
            from_entity_type: EntityType::Movement,
            to_entity: Uuid::nil(),
            to_entity_type: EntityType::Void,
        })
    }

    /// Verify that a movement released exactly what it took.
    pub fn verify_movement(&self, movement: MovementId) -> ConservationResult {
        let result = verify_movement(movement, &self.entries);
        if let ConservationResult::Anomaly(ref anomaly) = result {
            tracing::error!(
                movement_id = %movement,
                imbalances = anomaly.imbalances.len(),
                "{anomaly}"
            );
        }
        result
    }

    /// Return all entries produced by a movement.
    pub fn entries_for_movement(&self, movement: MovementId) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.movement_id == movement)
            .collect()
    }

    /// Return all entries, in insertion order.
    pub fn all_entries(&self) -> &[LedgerEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIGHTER: UnitId = UnitId::from_u128(2);

    #[test]
    fn new_journal_is_empty() {
        let journal = Journal::new();
        assert!(journal.is_empty());
        assert_eq!(journal.len(), 0);
    }

    #[test]
    fn record_dispatch_appends_entry() {
        let mut journal = Journal::new();
        let movement = MovementId::new();
        let result =
            journal.record_dispatch(movement, PlayerId::new(), FIGHTER, 10, PlanetId::new());
        assert!(result.is_ok());
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.entries_for_movement(movement).len(), 1);
    }

    #[test]
    fn zero_quantity_is_not_recorded() {
        let mut journal = Journal::new();
        let result = journal.record_casualty(MovementId::new(), PlayerId::new(), FIGHTER, 0);
        assert!(matches!(result, Err(LedgerError::ZeroQuantity)));
        assert!(journal.is_empty());
    }

    #[test]
    fn fixed_clock_stamps_entries() {
        let at = Utc::now();
        let mut journal = Journal::at(at);
        let entry = journal
            .record_consume(MovementId::new(), PlayerId::new(), FIGHTER, 1)
            .map(|e| e.created_at);
        assert_eq!(entry.ok(), Some(at));
    }

    #[test]
    fn drain_empties_the_journal() {
        let mut journal = Journal::new();
        let _ = journal.record_casualty(MovementId::new(), PlayerId::new(), FIGHTER, 3);
        let drained = journal.drain();
        assert_eq!(drained.len(), 1);
        assert!(journal.is_empty());
    }
}

//! Population quantities and resource stocks.
//!
//! The [`QuantityLedger`] holds one row per `(planet, unit, owner)` and is
//! the in-memory model of the `populations` table. Its [`reserve`] is the
//! check-and-decrement that backs every dispatch: it either takes the full
//! amount or nothing, so a population can never go negative.
//!
//! [`reserve`]: QuantityLedger::reserve

use std::collections::BTreeMap;

use starmap_types::{
    PlanetId, PlayerId, Population, PopulationId, Resource, ResourceAmounts, UnitId,
};

use crate::LedgerError;

/// Key of a population row.
type PopulationKey = (PlanetId, UnitId, PlayerId);

/// Population rows keyed by planet, unit type and owner.
#[derive(Debug, Default, Clone)]
pub struct QuantityLedger {
    rows: BTreeMap<PopulationKey, Population>,
}

impl QuantityLedger {
    /// Create an empty ledger.
    pub const fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }

    /// Build a ledger from existing rows. Rows sharing a key are summed.
    pub fn from_rows(rows: impl IntoIterator<Item = Population>) -> Result<Self, LedgerError> {
        let mut ledger = Self::new();
        for row in rows {
            ledger.credit(row.planet_id, row.unit_id, row.owner, row.quantity)?;
        }
        Ok(ledger)
    }

    /// Units of `unit` held by `owner` at `planet`; zero when no row exists.
    pub fn quantity(&self, planet: PlanetId, unit: UnitId, owner: PlayerId) -> u64 {
        self.rows
            .get(&(planet, unit, owner))
            .map_or(0, |row| row.quantity)
    }

    /// Atomically take `amount` units, or fail without changing anything.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientQuantity`] when fewer than
    /// `amount` units are available, and [`LedgerError::ZeroQuantity`] for
    /// a zero request.
    pub fn reserve(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> Result<u64, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroQuantity);
        }
        let available = self.quantity(planet, unit, owner);
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientQuantity {
                unit,
                requested: amount,
                available,
            })?;
        if let Some(row) = self.rows.get_mut(&(planet, unit, owner)) {
            row.quantity = remaining;
        }
        Ok(remaining)
    }

    /// Add `amount` units, creating the row if needed. Returns the new total.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the total would exceed `u64`.
    pub fn credit(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> Result<u64, LedgerError> {
        let row = self
            .rows
            .entry((planet, unit, owner))
            .or_insert_with(|| Population {
                id: PopulationId::new(),
                planet_id: planet,
                unit_id: unit,
                owner,
                quantity: 0,
            });
        row.quantity = row
            .quantity
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(row.quantity)
    }

    /// Remove up to `amount` units, clamping at zero. Returns how many were
    /// actually removed.
    pub fn remove_up_to(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> u64 {
        let Some(row) = self.rows.get_mut(&(planet, unit, owner)) else {
            return 0;
        };
        let removed = row.quantity.min(amount);
        row.quantity = row.quantity.saturating_sub(removed);
        removed
    }

    /// All rows stationed at `planet`, including empty ones.
    pub fn populations_at(&self, planet: PlanetId) -> Vec<Population> {
        self.rows
            .values()
            .filter(|row| row.planet_id == planet)
            .cloned()
            .collect()
    }

    /// Hand every population at `planet` to `new_owner`, merging with any
    /// rows the new owner already holds there.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if a merged row would overflow.
    pub fn reown(&mut self, planet: PlanetId, new_owner: PlayerId) -> Result<(), LedgerError> {
        let moved: Vec<Population> = self
            .rows
            .values()
            .filter(|row| row.planet_id == planet && row.owner != new_owner)
            .cloned()
            .collect();
        for row in moved {
            self.rows.remove(&(row.planet_id, row.unit_id, row.owner));
            self.credit(planet, row.unit_id, new_owner, row.quantity)?;
        }
        Ok(())
    }

    /// Iterate every row.
    pub fn rows(&self) -> impl Iterator<Item = &Population> {
        self.rows.values()
    }
}

/// Take `amount` of `resource` from a stock, or fail without changing it.
///
/// # Errors
///
/// Returns [`LedgerError::InsufficientResource`] when the stock is short.
pub fn debit_stock(
    stock: &mut ResourceAmounts,
    resource: Resource,
    amount: u64,
) -> Result<u64, LedgerError> {
    let available = stock.get(&resource).copied().unwrap_or(0);
    let remaining = available
        .checked_sub(amount)
        .ok_or(LedgerError::InsufficientResource {
            resource,
            requested: amount,
            available,
        })?;
    stock.insert(resource, remaining);
    Ok(remaining)
}

/// Add `amount` of `resource` to a stock. Returns the new total.
///
/// # Errors
///
/// Returns [`LedgerError::Overflow`] if the total would exceed `u64`.
pub fn credit_stock(
    stock: &mut ResourceAmounts,
    resource: Resource,
    amount: u64,
) -> Result<u64, LedgerError> {
    let entry = stock.entry(resource).or_insert(0);
    *entry = entry.checked_add(amount).ok_or(LedgerError::Overflow)?;
    Ok(*entry)
}

//! Validated unit quantity mappings.
//!
//! A [`QuantityMap`] is the unit-to-amount mapping carried by every
//! movement. It is non-empty, every amount is strictly positive, and every
//! unit appears once. Construction and deserialization both enforce this,
//! so a JSON object with a repeated unit key is rejected rather than
//! silently collapsed.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::enums::Resource;
use crate::ids::UnitId;

/// Per-resource amounts (cargo, stock, plunder). Zero entries are allowed.
pub type ResourceAmounts = BTreeMap<Resource, u64>;

/// Per-unit counts that may contain zeros (e.g. combat losses).
pub type UnitCounts = BTreeMap<UnitId, u64>;

/// Errors raised while building a [`QuantityMap`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    /// No unit was requested.
    #[error("quantity mapping is empty")]
    Empty,

    /// A unit was requested with amount zero.
    #[error("unit {0} requested with zero quantity")]
    ZeroAmount(UnitId),

    /// The same unit key appeared twice.
    #[error("unit {0} appears more than once")]
    DuplicateUnit(UnitId),
}

/// A non-empty mapping from unit type to a strictly positive amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct QuantityMap(BTreeMap<UnitId, u64>);

impl QuantityMap {
    /// A mapping holding one unit type.
    pub fn single(unit: UnitId, amount: u64) -> Result<Self, QuantityError> {
        Self::try_from_pairs([(unit, amount)])
    }

    /// Build from `(unit, amount)` pairs, rejecting empties, zeros and
    /// repeated units.
    pub fn try_from_pairs<I>(pairs: I) -> Result<Self, QuantityError>
    where
        I: IntoIterator<Item = (UnitId, u64)>,
    {
        let mut map = BTreeMap::new();
        for (unit, amount) in pairs {
            if amount == 0 {
                return Err(QuantityError::ZeroAmount(unit));
            }
            if map.insert(unit, amount).is_some() {
                return Err(QuantityError::DuplicateUnit(unit));
            }
        }
        if map.is_empty() {
            return Err(QuantityError::Empty);
        }
        Ok(Self(map))
    }

    /// Keep only the positive entries of a count map. Returns `None` when
    /// nothing is left (e.g. every unit died).
    pub fn from_counts(counts: &UnitCounts) -> Option<Self> {
        let map: BTreeMap<UnitId, u64> = counts
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(unit, amount)| (*unit, *amount))
            .collect();
        if map.is_empty() { None } else { Some(Self(map)) }
    }

    /// Amount reserved for `unit`, zero when absent.
    pub fn get(&self, unit: UnitId) -> u64 {
        self.0.get(&unit).copied().unwrap_or(0)
    }

    /// Iterate entries in unit order.
    pub fn iter(&self) -> impl Iterator<Item = (UnitId, u64)> + '_ {
        self.0.iter().map(|(unit, amount)| (*unit, *amount))
    }

    /// Unit types present.
    pub fn units(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.0.keys().copied()
    }

    /// Number of distinct unit types.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty; never true for a constructed map.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of units, `None` on overflow.
    pub fn total(&self) -> Option<u64> {
        self.0.values().try_fold(0u64, |acc, v| acc.checked_add(*v))
    }

    /// Borrow the underlying map.
    pub const fn as_map(&self) -> &BTreeMap<UnitId, u64> {
        &self.0
    }
}

impl<'de> Deserialize<'de> for QuantityMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct QuantityVisitor;

        impl<'de> Visitor<'de> for QuantityVisitor {
            type Value = QuantityMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of unit id to positive quantity")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((unit, amount)) = access.next_entry::<UnitId, u64>()? {
                    pairs.push((unit, amount));
                }
                QuantityMap::try_from_pairs(pairs).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_map(QuantityVisitor)
    }
}

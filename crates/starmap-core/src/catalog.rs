//! Unit reference data.
//!
//! Units are immutable game data. The standard catalog below ships with
//! fixed identifiers so that requests, tests and the database seed agree
//! on them; the database store can also load a catalog from its `units`
//! table.

use std::collections::BTreeMap;

use starmap_types::{Unit, UnitId, UnitKind};

/// Identifier of the standard scout.
pub const SCOUT: UnitId = UnitId::from_u128(1);
/// Identifier of the standard fighter.
pub const FIGHTER: UnitId = UnitId::from_u128(2);
/// Identifier of the standard heavy fighter.
pub const HEAVY_FIGHTER: UnitId = UnitId::from_u128(3);
/// Identifier of the standard bomber.
pub const BOMBER: UnitId = UnitId::from_u128(4);
/// Identifier of the standard transporter.
pub const TRANSPORTER: UnitId = UnitId::from_u128(5);
/// Identifier of the standard settler.
pub const SETTLER: UnitId = UnitId::from_u128(6);

/// Lookup table of unit types by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitCatalog {
    units: BTreeMap<UnitId, Unit>,
}

impl UnitCatalog {
    /// Build a catalog from a list of units. Later duplicates win.
    pub fn from_units(units: impl IntoIterator<Item = Unit>) -> Self {
        Self {
            units: units.into_iter().map(|u| (u.id, u)).collect(),
        }
    }

    /// The built-in unit set.
    pub fn standard() -> Self {
        Self::from_units([
            unit(SCOUT, UnitKind::Scout, "Scout", 20, 0, 1, 0),
            unit(FIGHTER, UnitKind::Fighter, "Fighter", 12, 10, 6, 20),
            unit(HEAVY_FIGHTER, UnitKind::HeavyFighter, "Heavy Fighter", 8, 25, 18, 40),
            unit(BOMBER, UnitKind::Bomber, "Bomber", 6, 40, 10, 10),
            unit(TRANSPORTER, UnitKind::Transporter, "Transporter", 10, 0, 4, 500),
            unit(SETTLER, UnitKind::Settler, "Settler", 4, 0, 2, 0),
        ])
    }

    /// Look up a unit by id.
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// The first unit of the given kind, in id order.
    pub fn of_kind(&self, kind: UnitKind) -> Option<&Unit> {
        self.units.values().find(|u| u.kind == kind)
    }

    /// Iterate all units in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Number of unit types.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the catalog has no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

fn unit(
    id: UnitId,
    kind: UnitKind,
    name: &str,
    speed: u32,
    attack: u32,
    defense: u32,
    capacity: u32,
) -> Unit {
    Unit {
        id,
        kind,
        name: name.to_owned(),
        speed,
        attack,
        defense,
        capacity,
    }
}

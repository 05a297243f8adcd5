//! Core entity structs for the Starmap movement engine.
//!
//! Covers the reference data ([`Unit`]), the mutable world rows
//! ([`Planet`], [`Population`]), the central [`Movement`] entity with its
//! resolution [`MovementOutcome`], player-visible [`Report`]s, and the
//! [`LedgerEntry`] journal record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::enums::{
    EntityType, LedgerEntryType, MovementState, MovementType, Resource, StaleReason, UnitKind,
};
use crate::ids::{LedgerEntryId, MovementId, PlanetId, PlayerId, PopulationId, ReportId, UnitId};
use crate::quantities::{QuantityMap, ResourceAmounts, UnitCounts};

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// Immutable description of a unit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Unit {
    /// Catalog identifier.
    pub id: UnitId,
    /// Role, which decides dispatch eligibility.
    pub kind: UnitKind,
    /// Display name.
    pub name: String,
    /// Distance units covered per travel step; higher is faster.
    pub speed: u32,
    /// Damage contributed per unit when attacking.
    pub attack: u32,
    /// Resistance contributed per unit when defending.
    pub defense: u32,
    /// Resource units one unit can carry.
    pub capacity: u32,
}

// ---------------------------------------------------------------------------
// World rows
// ---------------------------------------------------------------------------

/// A planet on the star map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Planet {
    /// Planet identifier.
    pub id: PlanetId,
    /// Display name.
    pub name: String,
    /// Horizontal grid coordinate.
    pub x: i32,
    /// Vertical grid coordinate.
    pub y: i32,
    /// Controlling player, `None` while unoccupied.
    pub owner: Option<PlayerId>,
    /// Stockpiled resources.
    pub resources: ResourceAmounts,
}

impl Planet {
    /// Whether `player` controls this planet.
    pub fn is_owned_by(&self, player: PlayerId) -> bool {
        self.owner == Some(player)
    }
}

/// A quantity of one unit type held by one player at one planet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Population {
    /// Row identifier.
    pub id: PopulationId,
    /// Planet the units are stationed at.
    pub planet_id: PlanetId,
    /// Unit type.
    pub unit_id: UnitId,
    /// Player controlling the units.
    pub owner: PlayerId,
    /// Units available; never negative.
    pub quantity: u64,
}

// ---------------------------------------------------------------------------
// Movements
// ---------------------------------------------------------------------------

/// A scheduled, time-delayed transfer of reserved units between planets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Movement {
    /// Movement identifier (UUID v7, creation ordered).
    pub id: MovementId,
    /// Dispatch type; selects the resolution algorithm.
    pub movement_type: MovementType,
    /// Dispatching player.
    pub owner: PlayerId,
    /// Planet the units left from.
    pub origin: PlanetId,
    /// Planet the units travel to.
    pub destination: PlanetId,
    /// Units reserved at dispatch. Immutable after creation.
    pub quantities: QuantityMap,
    /// Resources carried (transport and return legs).
    pub cargo: ResourceAmounts,
    /// Departure time.
    pub departed_at: DateTime<Utc>,
    /// Scheduled arrival time.
    pub arrives_at: DateTime<Utc>,
    /// Lifecycle state.
    pub state: MovementState,
    /// Effect applied at resolution; `None` while en route.
    pub outcome: Option<MovementOutcome>,
    /// When the movement was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// The movement this return leg belongs to.
    pub parent: Option<MovementId>,
}

impl Movement {
    /// Whether the movement's arrival time has passed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.arrives_at <= now
    }

    /// Whether the movement has not yet been resolved.
    pub fn is_en_route(&self) -> bool {
        self.state == MovementState::EnRoute
    }
}

/// The effect a movement had when it resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MovementOutcome {
    /// An intelligence report was filed.
    Scouted {
        /// The filed report.
        report: ReportId,
    },
    /// Combat took place.
    Battle {
        /// The filed battle report.
        report: ReportId,
        /// Whether the attacking side won.
        attacker_won: bool,
    },
    /// Ownership of the destination passed to the dispatcher.
    Occupied,
    /// Units joined the destination's garrison.
    Reinforced,
    /// Cargo was credited to the destination.
    Delivered,
    /// Units (and cargo) were credited back to their origin.
    Returned,
    /// A precondition no longer held; degraded per movement type.
    Stale {
        /// Which precondition failed.
        reason: StaleReason,
    },
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// A report visible to the dispatching player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Report {
    /// Report identifier.
    pub id: ReportId,
    /// Player who may read the report.
    pub player: PlayerId,
    /// Planet the report is about.
    pub planet: PlanetId,
    /// Movement that produced it.
    pub movement: MovementId,
    /// Report contents.
    pub body: ReportBody,
    /// When the report was filed.
    pub created_at: DateTime<Utc>,
}

/// Contents of a [`Report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ReportBody {
    /// Snapshot gathered by scouts.
    Intelligence {
        /// Planet owner at arrival.
        owner: Option<PlayerId>,
        /// Stationed units, per owner.
        populations: Vec<PopulationSighting>,
        /// Resource stock at arrival.
        resources: ResourceAmounts,
    },
    /// Summary of a battle.
    Battle {
        /// Defending planet owner at arrival.
        defender: Option<PlayerId>,
        /// Attacking force at arrival.
        attackers: UnitCounts,
        /// Defending force at arrival, summed across owners.
        defenders: UnitCounts,
        /// Attacker units destroyed.
        attacker_losses: UnitCounts,
        /// Defender units destroyed.
        defender_losses: UnitCounts,
        /// Whether the attacking side won.
        attacker_won: bool,
        /// Resources carried off by the survivors.
        plunder: ResourceAmounts,
    },
}

/// One population row as seen by a scout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PopulationSighting {
    /// Owner of the units.
    pub owner: PlayerId,
    /// Unit type.
    pub unit_id: UnitId,
    /// Units counted.
    pub quantity: u64,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// What a ledger entry moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Asset {
    /// Units of one type.
    Unit(UnitId),
    /// A stockpiled resource.
    Resource(Resource),
}

/// An append-only record of one unit or resource transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerEntry {
    /// Entry identifier.
    pub id: LedgerEntryId,
    /// Movement the transfer belongs to.
    pub movement_id: MovementId,
    /// Player who owns the transferred asset.
    pub owner: PlayerId,
    /// Transfer category.
    pub entry_type: LedgerEntryType,
    /// What was transferred.
    pub asset: Asset,
    /// How much was transferred; always positive.
    pub quantity: u64,
    /// Source entity (debit side).
    pub from_entity: Uuid,
    /// Source entity type.
    pub from_entity_type: EntityType,
    /// Destination entity (credit side).
    pub to_entity: Uuid,
    /// Destination entity type.
    pub to_entity_type: EntityType,
    /// When the transfer happened.
    pub created_at: DateTime<Utc>,
}

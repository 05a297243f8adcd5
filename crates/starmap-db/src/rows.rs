//! Table rows and their mapping to domain types.
//!
//! Enum columns are `TEXT` in the `as_str` spelling of the domain enums;
//! composite values are `JSONB` in their serde form. Quantities are
//! `BIGINT` and are range-checked in both directions.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use starmap_types::{
    Asset, EntityType, LedgerEntry, LedgerEntryType, Movement, MovementOutcome, MovementState,
    MovementType, Planet, Population, QuantityMap, Report, ReportBody, ResourceAmounts, Unit,
    UnitKind,
};

use crate::error::DbError;

/// Convert a domain quantity to a `BIGINT` bind value.
pub(crate) fn to_db(value: u64) -> Result<i64, DbError> {
    i64::try_from(value)
        .ok()
        .ok_or_else(|| DbError::Corrupt(format!("quantity {value} exceeds BIGINT")))
}

/// Convert a `BIGINT` column back to a domain quantity.
pub(crate) fn from_db(value: i64) -> Result<u64, DbError> {
    u64::try_from(value)
        .ok()
        .ok_or_else(|| DbError::Corrupt(format!("negative quantity {value}")))
}

fn non_negative_u32(column: &str, value: i32) -> Result<u32, DbError> {
    u32::try_from(value)
        .ok()
        .ok_or_else(|| DbError::Corrupt(format!("negative {column} {value}")))
}

fn corrupt(column: &str, value: &str) -> DbError {
    DbError::Corrupt(format!("unknown {column} '{value}'"))
}

/// A row from the `units` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnitRow {
    /// Unit UUID.
    pub id: Uuid,
    /// Kind as its database string.
    pub kind: String,
    /// Display name.
    pub name: String,
    /// Travel speed.
    pub speed: i32,
    /// Attack value.
    pub attack: i32,
    /// Defense value.
    pub defense: i32,
    /// Carrying capacity.
    pub capacity: i32,
}

impl TryFrom<UnitRow> for Unit {
    type Error = DbError;

    fn try_from(row: UnitRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            kind: UnitKind::parse(&row.kind).ok_or_else(|| corrupt("unit kind", &row.kind))?,
            name: row.name,
            speed: non_negative_u32("speed", row.speed)?,
            attack: non_negative_u32("attack", row.attack)?,
            defense: non_negative_u32("defense", row.defense)?,
            capacity: non_negative_u32("capacity", row.capacity)?,
        })
    }
}

/// A row from the `planets` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlanetRow {
    /// Planet UUID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// Owning player, if any.
    pub owner: Option<Uuid>,
    /// Resource stock.
    pub resources: Json<ResourceAmounts>,
}

impl From<PlanetRow> for Planet {
    fn from(row: PlanetRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            x: row.x,
            y: row.y,
            owner: row.owner.map(Into::into),
            resources: row.resources.0,
        }
    }
}

/// A row from the `populations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PopulationRow {
    /// Row UUID.
    pub id: Uuid,
    /// Planet the units are stationed at.
    pub planet_id: Uuid,
    /// Unit type.
    pub unit_id: Uuid,
    /// Controlling player.
    pub owner: Uuid,
    /// Units held.
    pub quantity: i64,
}

impl TryFrom<PopulationRow> for Population {
    type Error = DbError;

    fn try_from(row: PopulationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            planet_id: row.planet_id.into(),
            unit_id: row.unit_id.into(),
            owner: row.owner.into(),
            quantity: from_db(row.quantity)?,
        })
    }
}

/// A row from the `movements` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MovementRow {
    /// Movement UUID.
    pub id: Uuid,
    /// Type as its database string.
    pub movement_type: String,
    /// Dispatching player.
    pub owner: Uuid,
    /// Origin planet.
    pub origin: Uuid,
    /// Destination planet.
    pub destination: Uuid,
    /// Reserved units.
    pub quantities: Json<QuantityMap>,
    /// Carried resources.
    pub cargo: Json<ResourceAmounts>,
    /// Departure time.
    pub departed_at: DateTime<Utc>,
    /// Arrival time.
    pub arrives_at: DateTime<Utc>,
    /// State as its database string.
    pub state: String,
    /// Applied outcome.
    pub outcome: Option<Json<MovementOutcome>>,
    /// Resolution time.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Parent movement of a return leg.
    pub parent: Option<Uuid>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = DbError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            movement_type: MovementType::parse(&row.movement_type)
                .ok_or_else(|| corrupt("movement type", &row.movement_type))?,
            owner: row.owner.into(),
            origin: row.origin.into(),
            destination: row.destination.into(),
            quantities: row.quantities.0,
            cargo: row.cargo.0,
            departed_at: row.departed_at,
            arrives_at: row.arrives_at,
            state: MovementState::parse(&row.state).ok_or_else(|| corrupt("state", &row.state))?,
            outcome: row.outcome.map(|o| o.0),
            resolved_at: row.resolved_at,
            parent: row.parent.map(Into::into),
        })
    }
}

/// A row from the `reports` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRow {
    /// Report UUID.
    pub id: Uuid,
    /// Reader.
    pub player: Uuid,
    /// Subject planet.
    pub planet: Uuid,
    /// Producing movement.
    pub movement: Uuid,
    /// Contents.
    pub body: Json<ReportBody>,
    /// Filing time.
    pub created_at: DateTime<Utc>,
}

impl From<ReportRow> for Report {
    fn from(row: ReportRow) -> Self {
        Self {
            id: row.id.into(),
            player: row.player.into(),
            planet: row.planet.into(),
            movement: row.movement.into(),
            body: row.body.0,
            created_at: row.created_at,
        }
    }
}

/// A row from the `ledger` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerRow {
    /// Entry UUID.
    pub id: Uuid,
    /// Owning movement.
    pub movement_id: Uuid,
    /// Asset owner.
    pub owner: Uuid,
    /// Entry type as its database string.
    pub entry_type: String,
    /// Transferred asset.
    pub asset: Json<Asset>,
    /// Amount transferred.
    pub quantity: i64,
    /// Source entity.
    pub from_entity: Uuid,
    /// Source entity type.
    pub from_entity_type: String,
    /// Destination entity.
    pub to_entity: Uuid,
    /// Destination entity type.
    pub to_entity_type: String,
    /// Transfer time.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = DbError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let entity =
            |value: &str| EntityType::parse(value).ok_or_else(|| corrupt("entity type", value));
        Ok(Self {
            id: row.id.into(),
            movement_id: row.movement_id.into(),
            owner: row.owner.into(),
            entry_type: LedgerEntryType::parse(&row.entry_type)
                .ok_or_else(|| corrupt("entry type", &row.entry_type))?,
            asset: row.asset.0,
            quantity: from_db(row.quantity)?,
            from_entity: row.from_entity,
            from_entity_type: entity(&row.from_entity_type)?,
            to_entity: row.to_entity,
            to_entity_type: entity(&row.to_entity_type)?,
            created_at: row.created_at,
        })
    }
}

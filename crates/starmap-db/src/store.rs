//! [`MovementStore`] over `PostgreSQL`.
//!
//! A [`PgUnitOfWork`] wraps one database transaction. Row locks come from
//! `SELECT ... FOR UPDATE`; reservations and resource debits are single
//! conditional `UPDATE`s, so a short population is detected by the
//! database rather than by a read-then-write in Rust.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use starmap_core::config::TieBreak;
use starmap_core::{MovementStore, StoreError, UnitCatalog, UnitOfWork};
use starmap_ledger::LedgerError;
use starmap_types::{
    LedgerEntry, Movement, MovementId, MovementOutcome, MovementState, Planet, PlanetId, PlayerId,
    Population, PopulationId, Report, Resource, Unit, UnitId,
};

use crate::error::DbError;
use crate::postgres::PostgresPool;
use crate::rows::{
    LedgerRow, MovementRow, PlanetRow, PopulationRow, ReportRow, UnitRow, from_db, to_db,
};

const PLANET_COLUMNS: &str = "id, name, x, y, owner, resources";
const MOVEMENT_COLUMNS: &str = "id, movement_type, owner, origin, destination, quantities, cargo, \
     departed_at, arrives_at, state, outcome, resolved_at, parent";
const LEDGER_COLUMNS: &str = "id, movement_id, owner, entry_type, asset, quantity, from_entity, \
     from_entity_type, to_entity, to_entity_type, created_at";

/// Movement store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgMovementStore {
    pool: PgPool,
}

impl PgMovementStore {
    /// Wrap a connected pool. Migrations must already have run.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    /// Insert every catalog unit that is not yet in the `units` table.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if an insert fails.
    pub async fn seed_units(&self, catalog: &UnitCatalog) -> Result<u64, DbError> {
        let mut inserted = 0u64;
        for unit in catalog.iter() {
            let result = sqlx::query(
                r"INSERT INTO units (id, kind, name, speed, attack, defense, capacity)
                  VALUES ($1, $2, $3, $4, $5, $6, $7)
                  ON CONFLICT (id) DO NOTHING",
            )
            .bind(unit.id.into_inner())
            .bind(unit.kind.as_str())
            .bind(&unit.name)
            .bind(stat(unit.speed)?)
            .bind(stat(unit.attack)?)
            .bind(stat(unit.defense)?)
            .bind(stat(unit.capacity)?)
            .execute(&self.pool)
            .await?;
            inserted = inserted.saturating_add(result.rows_affected());
        }
        debug!(inserted, "Seeded unit catalog");
        Ok(inserted)
    }

    /// Insert or replace a planet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the upsert fails.
    pub async fn upsert_planet(&self, planet: &Planet) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO planets (id, name, x, y, owner, resources)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, x = EXCLUDED.x, y = EXCLUDED.y,
                owner = EXCLUDED.owner, resources = EXCLUDED.resources",
        )
        .bind(planet.id.into_inner())
        .bind(&planet.name)
        .bind(planet.x)
        .bind(planet.y)
        .bind(planet.owner.map(PlayerId::into_inner))
        .bind(Json(&planet.resources))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Station units at a planet outside of any movement.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the upsert fails.
    pub async fn station(
        &self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        quantity: u64,
    ) -> Result<u64, DbError> {
        let mut conn = self.pool.acquire().await?;
        credit_population(&mut conn, planet, unit, owner, quantity).await
    }
}

fn stat(value: u32) -> Result<i32, DbError> {
    i32::try_from(value)
        .ok()
        .ok_or_else(|| DbError::Corrupt(format!("unit stat {value} exceeds INTEGER")))
}

#[async_trait]
impl MovementStore for PgMovementStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError> {
        let tx = self.pool.begin().await.map_err(DbError::from)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn due_movements(
        &self,
        now: DateTime<Utc>,
        limit: u32,
        tie_break: TieBreak,
    ) -> Result<Vec<MovementId>, StoreError> {
        let order = match tie_break {
            TieBreak::Arrival => "arrives_at, departed_at, id",
            TieBreak::Insertion => "seq",
        };
        let sql = format!(
            "SELECT id FROM movements
             WHERE state = 'en_route' AND arrives_at <= $1
             ORDER BY {order}
             LIMIT $2"
        );
        let ids: Vec<Uuid> = sqlx::query_scalar(&sql)
            .bind(now)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(ids.into_iter().map(MovementId::from).collect())
    }

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM movements WHERE id = $1");
        let row: Option<MovementRow> = sqlx::query_as(&sql)
            .bind(id.into_inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Movement::try_from).transpose()?)
    }

    async fn planet(&self, id: PlanetId) -> Result<Option<Planet>, StoreError> {
        let sql = format!("SELECT {PLANET_COLUMNS} FROM planets WHERE id = $1");
        let row: Option<PlanetRow> = sqlx::query_as(&sql)
            .bind(id.into_inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Planet::from))
    }

    async fn units(&self) -> Result<Vec<Unit>, StoreError> {
        let rows: Vec<UnitRow> = sqlx::query_as(
            "SELECT id, kind, name, speed, attack, defense, capacity FROM units ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(Unit::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn reports_for(&self, player: PlayerId) -> Result<Vec<Report>, StoreError> {
        let rows: Vec<ReportRow> = sqlx::query_as(
            r"SELECT id, player, planet, movement, body, created_at
              FROM reports
              WHERE player = $1
              ORDER BY created_at DESC, id DESC",
        )
        .bind(player.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(rows.into_iter().map(Report::from).collect())
    }

    async fn ledger_for(&self, movement: MovementId) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        Ok(ledger_rows(&mut conn, movement).await?)
    }
}

// ---------------------------------------------------------------------------
// Unit of work
// ---------------------------------------------------------------------------

/// One database transaction. Dropping it rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn planet(&mut self, id: PlanetId) -> Result<Option<Planet>, StoreError> {
        let sql = format!("SELECT {PLANET_COLUMNS} FROM planets WHERE id = $1");
        let row: Option<PlanetRow> = sqlx::query_as(&sql)
            .bind(id.into_inner())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Planet::from))
    }

    async fn lock_planet(&mut self, id: PlanetId) -> Result<Option<Planet>, StoreError> {
        let sql = format!("SELECT {PLANET_COLUMNS} FROM planets WHERE id = $1 FOR UPDATE");
        let row: Option<PlanetRow> = sqlx::query_as(&sql)
            .bind(id.into_inner())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Planet::from))
    }

    async fn populations_at(&mut self, planet: PlanetId) -> Result<Vec<Population>, StoreError> {
        let rows: Vec<PopulationRow> = sqlx::query_as(
            r"SELECT id, planet_id, unit_id, owner, quantity
              FROM populations
              WHERE planet_id = $1
              ORDER BY unit_id, owner
              FOR UPDATE",
        )
        .bind(planet.into_inner())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(Population::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn reserve(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> Result<u64, StoreError> {
        if amount == 0 {
            return Err(LedgerError::ZeroQuantity.into());
        }
        let requested = to_db(amount)?;
        let remaining: Option<i64> = sqlx::query_scalar(
            r"UPDATE populations SET quantity = quantity - $4
              WHERE planet_id = $1 AND unit_id = $2 AND owner = $3 AND quantity >= $4
              RETURNING quantity",
        )
        .bind(planet.into_inner())
        .bind(unit.into_inner())
        .bind(owner.into_inner())
        .bind(requested)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        if let Some(remaining) = remaining {
            return Ok(from_db(remaining)?);
        }

        let available: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM populations WHERE planet_id = $1 AND unit_id = $2 AND owner = $3",
        )
        .bind(planet.into_inner())
        .bind(unit.into_inner())
        .bind(owner.into_inner())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Err(LedgerError::InsufficientQuantity {
            unit,
            requested: amount,
            available: available.map(from_db).transpose()?.unwrap_or(0),
        }
        .into())
    }

    async fn credit(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> Result<u64, StoreError> {
        Ok(credit_population(&mut self.tx, planet, unit, owner, amount).await?)
    }

    async fn remove_up_to(
        &mut self,
        planet: PlanetId,
        unit: UnitId,
        owner: PlayerId,
        amount: u64,
    ) -> Result<u64, StoreError> {
        let removed: Option<i64> = sqlx::query_scalar(
            r"WITH current AS (
                  SELECT id, quantity FROM populations
                  WHERE planet_id = $1 AND unit_id = $2 AND owner = $3
                  FOR UPDATE
              )
              UPDATE populations p
              SET quantity = p.quantity - LEAST(current.quantity, $4)
              FROM current
              WHERE p.id = current.id
              RETURNING LEAST(current.quantity, $4)",
        )
        .bind(planet.into_inner())
        .bind(unit.into_inner())
        .bind(owner.into_inner())
        .bind(to_db(amount)?)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(removed.map(from_db).transpose()?.unwrap_or(0))
    }

    async fn debit_resource(
        &mut self,
        planet: PlanetId,
        resource: Resource,
        amount: u64,
    ) -> Result<u64, StoreError> {
        let requested = to_db(amount)?;
        let remaining: Option<i64> = sqlx::query_scalar(
            r"UPDATE planets
              SET resources = jsonb_set(
                  resources, ARRAY[$2::TEXT],
                  to_jsonb(COALESCE((resources->>$2)::BIGINT, 0) - $3))
              WHERE id = $1 AND COALESCE((resources->>$2)::BIGINT, 0) >= $3
              RETURNING (resources->>$2)::BIGINT",
        )
        .bind(planet.into_inner())
        .bind(resource.as_str())
        .bind(requested)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        if let Some(remaining) = remaining {
            return Ok(from_db(remaining)?);
        }

        let stock = self
            .planet(planet)
            .await?
            .ok_or(StoreError::PlanetNotFound(planet))?
            .resources
            .get(&resource)
            .copied()
            .unwrap_or(0);
        Err(LedgerError::InsufficientResource {
            resource,
            requested: amount,
            available: stock,
        }
        .into())
    }

    async fn credit_resource(
        &mut self,
        planet: PlanetId,
        resource: Resource,
        amount: u64,
    ) -> Result<u64, StoreError> {
        let total: Option<i64> = sqlx::query_scalar(
            r"UPDATE planets
              SET resources = jsonb_set(
                  resources, ARRAY[$2::TEXT],
                  to_jsonb(COALESCE((resources->>$2)::BIGINT, 0) + $3))
              WHERE id = $1
              RETURNING (resources->>$2)::BIGINT",
        )
        .bind(planet.into_inner())
        .bind(resource.as_str())
        .bind(to_db(amount)?)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        let total = total.ok_or(StoreError::PlanetNotFound(planet))?;
        Ok(from_db(total)?)
    }

    async fn set_owner(&mut self, planet: PlanetId, owner: PlayerId) -> Result<(), StoreError> {
        let updated = sqlx::query("UPDATE planets SET owner = $2 WHERE id = $1")
            .bind(planet.into_inner())
            .bind(owner.into_inner())
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::PlanetNotFound(planet));
        }

        // Fold every other owner's rows into the new owner's.
        sqlx::query(
            r"INSERT INTO populations (id, planet_id, unit_id, owner, quantity)
              SELECT gen_random_uuid(), planet_id, unit_id, $2, SUM(quantity)
              FROM populations
              WHERE planet_id = $1 AND owner <> $2
              GROUP BY planet_id, unit_id
              ON CONFLICT (planet_id, unit_id, owner)
              DO UPDATE SET quantity = populations.quantity + EXCLUDED.quantity",
        )
        .bind(planet.into_inner())
        .bind(owner.into_inner())
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        sqlx::query("DELETE FROM populations WHERE planet_id = $1 AND owner <> $2")
            .bind(planet.into_inner())
            .bind(owner.into_inner())
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &Movement) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO movements (id, movement_type, owner, origin, destination, quantities,
                  cargo, departed_at, arrives_at, state, outcome, resolved_at, parent)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(movement.id.into_inner())
        .bind(movement.movement_type.as_str())
        .bind(movement.owner.into_inner())
        .bind(movement.origin.into_inner())
        .bind(movement.destination.into_inner())
        .bind(Json(&movement.quantities))
        .bind(Json(&movement.cargo))
        .bind(movement.departed_at)
        .bind(movement.arrives_at)
        .bind(movement.state.as_str())
        .bind(movement.outcome.as_ref().map(Json))
        .bind(movement.resolved_at)
        .bind(movement.parent.map(MovementId::into_inner))
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn movement_for_update(
        &mut self,
        id: MovementId,
    ) -> Result<Option<Movement>, StoreError> {
        let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM movements WHERE id = $1 FOR UPDATE");
        let row: Option<MovementRow> = sqlx::query_as(&sql)
            .bind(id.into_inner())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Movement::try_from).transpose()?)
    }

    async fn finalize_movement(
        &mut self,
        id: MovementId,
        outcome: &MovementOutcome,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"UPDATE movements SET state = $2, outcome = $3, resolved_at = $4
              WHERE id = $1 AND state = $5",
        )
        .bind(id.into_inner())
        .bind(MovementState::Resolved.as_str())
        .bind(Json(outcome))
        .bind(resolved_at)
        .bind(MovementState::EnRoute.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_report(&mut self, report: &Report) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO reports (id, player, planet, movement, body, created_at)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(report.id.into_inner())
        .bind(report.player.into_inner())
        .bind(report.planet.into_inner())
        .bind(report.movement.into_inner())
        .bind(Json(&report.body))
        .bind(report.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn record_ledger(&mut self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }

        let len = entries.len();
        let mut ids = Vec::with_capacity(len);
        let mut movement_ids = Vec::with_capacity(len);
        let mut owners = Vec::with_capacity(len);
        let mut entry_types = Vec::with_capacity(len);
        let mut assets = Vec::with_capacity(len);
        let mut quantities = Vec::with_capacity(len);
        let mut from_entities = Vec::with_capacity(len);
        let mut from_entity_types = Vec::with_capacity(len);
        let mut to_entities = Vec::with_capacity(len);
        let mut to_entity_types = Vec::with_capacity(len);
        let mut timestamps = Vec::with_capacity(len);

        for entry in entries {
            ids.push(entry.id.into_inner());
            movement_ids.push(entry.movement_id.into_inner());
            owners.push(entry.owner.into_inner());
            entry_types.push(entry.entry_type.as_str());
            assets.push(serde_json::to_value(entry.asset).map_err(DbError::from)?);
            quantities.push(to_db(entry.quantity)?);
            from_entities.push(entry.from_entity);
            from_entity_types.push(entry.from_entity_type.as_str());
            to_entities.push(entry.to_entity);
            to_entity_types.push(entry.to_entity_type.as_str());
            timestamps.push(entry.created_at);
        }

        // UNNEST keeps array order, so `seq` follows journal order.
        sqlx::query(
            r"INSERT INTO ledger (id, movement_id, owner, entry_type, asset, quantity, from_entity,
                  from_entity_type, to_entity, to_entity_type, created_at)
              SELECT * FROM UNNEST($1::UUID[], $2::UUID[], $3::UUID[], $4::TEXT[], $5::JSONB[],
                  $6::BIGINT[], $7::UUID[], $8::TEXT[], $9::UUID[], $10::TEXT[],
                  $11::TIMESTAMPTZ[])",
        )
        .bind(&ids)
        .bind(&movement_ids)
        .bind(&owners)
        .bind(&entry_types)
        .bind(&assets)
        .bind(&quantities)
        .bind(&from_entities)
        .bind(&from_entity_types)
        .bind(&to_entities)
        .bind(&to_entity_types)
        .bind(&timestamps)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        debug!(count = len, "Inserted ledger entries (batch UNNEST)");
        Ok(())
    }

    async fn ledger_for(&mut self, movement: MovementId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(ledger_rows(&mut self.tx, movement).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shared queries
// ---------------------------------------------------------------------------

async fn credit_population(
    conn: &mut sqlx::PgConnection,
    planet: PlanetId,
    unit: UnitId,
    owner: PlayerId,
    amount: u64,
) -> Result<u64, DbError> {
    let total: i64 = sqlx::query_scalar(
        r"INSERT INTO populations (id, planet_id, unit_id, owner, quantity)
          VALUES ($1, $2, $3, $4, $5)
          ON CONFLICT (planet_id, unit_id, owner)
          DO UPDATE SET quantity = populations.quantity + EXCLUDED.quantity
          RETURNING quantity",
    )
    .bind(PopulationId::new().into_inner())
    .bind(planet.into_inner())
    .bind(unit.into_inner())
    .bind(owner.into_inner())
    .bind(to_db(amount)?)
    .fetch_one(&mut *conn)
    .await?;
    from_db(total)
}

async fn ledger_rows(
    conn: &mut sqlx::PgConnection,
    movement: MovementId,
) -> Result<Vec<LedgerEntry>, DbError> {
    let sql = format!(
        "SELECT {LEDGER_COLUMNS} FROM ledger
         WHERE movement_id = $1 OR from_entity = $1 OR to_entity = $1
         ORDER BY seq"
    );
    let rows: Vec<LedgerRow> = sqlx::query_as(&sql)
        .bind(movement.into_inner())
        .fetch_all(&mut *conn)
        .await?;
    rows.into_iter().map(LedgerEntry::try_from).collect()
}

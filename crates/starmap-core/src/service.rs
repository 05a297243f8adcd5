//! The engine's entry point.
//!
//! [`MovementService`] owns the store handle and the pluggable rules
//! ([`GamePolicy`], [`CombatModel`]) and runs every dispatch and every
//! resolution in its own unit of work.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use starmap_types::{LedgerEntry, Movement, MovementId, Planet, PlanetId, PlayerId, Report};

use crate::catalog::UnitCatalog;
use crate::combat::{AttritionCombat, CombatModel};
use crate::config::StarmapConfig;
use crate::factory::{DispatchError, DispatchRequest, MovementFactory};
use crate::policy::{Actor, GamePolicy, OwnershipPolicy};
use crate::resolver::{MovementResolver, Resolution, ResolveError};
use crate::store::{MovementStore, StoreError};
use crate::travel::TravelCalculator;

/// Dispatches and resolves movements against a [`MovementStore`].
pub struct MovementService {
    store: Arc<dyn MovementStore>,
    catalog: UnitCatalog,
    travel: TravelCalculator,
    policy: Arc<dyn GamePolicy>,
    combat: Arc<dyn CombatModel>,
    settler_count: u64,
}

impl MovementService {
    /// Build a service with the default [`OwnershipPolicy`] and
    /// [`AttritionCombat`].
    pub fn new(
        store: Arc<dyn MovementStore>,
        catalog: UnitCatalog,
        config: &StarmapConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            travel: TravelCalculator::new(&config.travel),
            policy: Arc::new(OwnershipPolicy),
            combat: Arc::new(AttritionCombat),
            settler_count: config.occupation.settler_count,
        }
    }

    /// Replace the target authorization rules.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn GamePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the battle model.
    #[must_use]
    pub fn with_combat(mut self, combat: Arc<dyn CombatModel>) -> Self {
        self.combat = combat;
        self
    }

    /// Dispatch units from the actor's planet toward `destination`.
    ///
    /// On success the units are reserved and the movement is `en_route`.
    /// On error nothing was written.
    pub async fn dispatch(
        &self,
        actor: Actor,
        destination: PlanetId,
        request: &DispatchRequest,
        now: DateTime<Utc>,
    ) -> Result<Movement, DispatchError> {
        let mut uow = self.store.begin().await?;
        let factory = MovementFactory {
            catalog: &self.catalog,
            travel: &self.travel,
            policy: self.policy.as_ref(),
            settler_count: self.settler_count,
        };
        let movement = factory
            .create(uow.as_mut(), actor, destination, request, now)
            .await?;
        uow.commit().await?;

        info!(
            movement_id = %movement.id,
            movement_type = movement.movement_type.as_str(),
            player = %actor.player,
            origin = %movement.origin,
            destination = %movement.destination,
            arrives_at = %movement.arrives_at,
            "Movement dispatched"
        );
        Ok(movement)
    }

    /// Resolve movement `id` as of `now`. Safe to call repeatedly and
    /// concurrently: exactly one call applies the outcome.
    ///
    /// When resolution fails in a way a retry would repeat, the attempt is
    /// rolled back and the movement is recalled in a fresh unit of work
    /// (see [`MovementResolver::abort`]), so it never stays due forever.
    pub async fn resolve(
        &self,
        id: MovementId,
        now: DateTime<Utc>,
    ) -> Result<Resolution, ResolveError> {
        let mut uow = self.store.begin().await?;
        let resolver = MovementResolver {
            catalog: &self.catalog,
            policy: self.policy.as_ref(),
            combat: self.combat.as_ref(),
        };
        match resolver.resolve(uow.as_mut(), id, now).await {
            Ok(resolution) => {
                if matches!(resolution, Resolution::Applied(_)) {
                    uow.commit().await?;
                }
                Ok(resolution)
            }
            Err(err) if err.needs_recall() => {
                drop(uow);
                self.recall(id, &err, now).await
            }
            Err(err) => Err(err),
        }
    }

    async fn recall(
        &self,
        id: MovementId,
        cause: &ResolveError,
        now: DateTime<Utc>,
    ) -> Result<Resolution, ResolveError> {
        let mut uow = self.store.begin().await?;
        let resolution = MovementResolver::abort(uow.as_mut(), id, cause, now).await?;
        if matches!(resolution, Resolution::Applied(_)) {
            uow.commit().await?;
        }
        Ok(resolution)
    }

    /// Ids of movements due at `now`, in resolution order.
    pub async fn due_movements(
        &self,
        now: DateTime<Utc>,
        limit: u32,
        tie_break: crate::config::TieBreak,
    ) -> Result<Vec<MovementId>, StoreError> {
        self.store.due_movements(now, limit, tie_break).await
    }

    /// Read a movement.
    pub async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        self.store.movement(id).await
    }

    /// Read a planet.
    pub async fn planet(&self, id: PlanetId) -> Result<Option<Planet>, StoreError> {
        self.store.planet(id).await
    }

    /// Reports visible to `player`, newest first.
    pub async fn reports_for(&self, player: PlayerId) -> Result<Vec<Report>, StoreError> {
        self.store.reports_for(player).await
    }

    /// Ledger entries of a movement.
    pub async fn ledger_for(&self, id: MovementId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.store.ledger_for(id).await
    }

    /// The unit catalog in use.
    pub const fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    /// The target authorization rules in use.
    pub fn policy(&self) -> &dyn GamePolicy {
        self.policy.as_ref()
    }
}

//! Periodic resolution of due movements.
//!
//! [`Scheduler::tick`] resolves one batch of due movements in the
//! configured tie-break order, one at a time, so two movements touching
//! the same planet never interleave. [`Scheduler::run`] repeats ticks on
//! a fixed poll interval until shutdown is signalled.
//!
//! A movement whose resolution fails stays `en_route` and is retried on
//! the next tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::resolver::{Resolution, ResolveError};
use crate::service::MovementService;
use crate::store::StoreError;

/// Counts for one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Movements resolved by this tick.
    pub resolved: u32,
    /// Movements already resolved elsewhere or not yet due.
    pub skipped: u32,
    /// Movements whose resolution failed and will be retried.
    pub failed: u32,
}

impl TickSummary {
    /// Movements looked at.
    pub const fn total(&self) -> u32 {
        self.resolved
            .saturating_add(self.skipped)
            .saturating_add(self.failed)
    }
}

/// Drives resolution of due movements.
pub struct Scheduler {
    service: Arc<MovementService>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler over `service`.
    pub const fn new(service: Arc<MovementService>, config: SchedulerConfig) -> Self {
        Self { service, config }
    }

    /// Resolve every movement due at `now`, up to the configured batch
    /// size.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the due list cannot be read.
    /// Individual resolution failures are counted, not returned.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickSummary, StoreError> {
        let due = self
            .service
            .due_movements(now, self.config.batch_size, self.config.tie_break)
            .await?;

        let mut summary = TickSummary::default();
        for id in due {
            match self.service.resolve(id, now).await {
                Ok(Resolution::Applied(_)) => {
                    summary.resolved = summary.resolved.saturating_add(1);
                }
                Ok(Resolution::AlreadyResolved | Resolution::NotDue { .. }) => {
                    summary.skipped = summary.skipped.saturating_add(1);
                }
                Err(err) => {
                    log_failure(id, &err);
                    summary.failed = summary.failed.saturating_add(1);
                }
            }
        }

        if summary.total() > 0 {
            debug!(
                resolved = summary.resolved,
                skipped = summary.skipped,
                failed = summary.failed,
                "Scheduler tick complete"
            );
        }
        Ok(summary)
    }

    /// Tick every `poll_interval_ms` until `shutdown` becomes `true` or
    /// its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            batch_size = self.config.batch_size,
            tie_break = self.config.tie_break.as_str(),
            "Scheduler started"
        );

        loop {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }
            if let Err(err) = self.tick(Utc::now()).await {
                warn!(error = %err, "Scheduler could not load due movements");
            }

            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}

fn log_failure(id: starmap_types::MovementId, err: &ResolveError) {
    warn!(movement_id = %id, error = %err, "Movement resolution failed; will retry");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use starmap_types::{MovementState, Planet, PlanetId, PlayerId, QuantityMap, ResourceAmounts};

    use super::*;
    use crate::catalog::{self, UnitCatalog};
    use crate::combat::{BattleOutcome, CombatError, CombatModel, Stack};
    use crate::config::{StarmapConfig, TieBreak};
    use crate::factory::DispatchRequest;
    use crate::memory::{MemoryStore, WorldState};
    use crate::policy::Actor;

    const ALICE: PlayerId = PlayerId::from_u128(0xA);
    const BOB: PlayerId = PlayerId::from_u128(0xB);
    const HOME: PlanetId = PlanetId::from_u128(1);
    const FAR: PlanetId = PlanetId::from_u128(2);
    const NEAR: PlanetId = PlanetId::from_u128(3);

    fn planet(id: PlanetId, x: i32, owner: Option<PlayerId>) -> Planet {
        Planet {
            id,
            name: format!("p{x}"),
            x,
            y: 0,
            owner,
            resources: ResourceAmounts::new(),
        }
    }

    fn setup() -> (Arc<MemoryStore>, Arc<MovementService>) {
        let catalog = UnitCatalog::standard();
        let mut world = WorldState::new();
        world.add_planet(planet(HOME, 0, Some(ALICE)));
        world.add_planet(planet(FAR, 100, None));
        world.add_planet(planet(NEAR, 10, None));
        world.add_population(HOME, catalog::SCOUT, ALICE, 10).unwrap();
        let store = Arc::new(MemoryStore::new(world, &catalog));
        let service = MovementService::new(store.clone(), catalog, &StarmapConfig::default());
        (store, Arc::new(service))
    }

    #[tokio::test]
    async fn tick_resolves_only_due_movements() {
        let (store, service) = setup();
        let now = Utc::now();
        let actor = Actor::new(ALICE, HOME);
        let scout = DispatchRequest::Scout { quantity: 1 };
        let near = service.dispatch(actor, NEAR, &scout, now).await.unwrap();
        let far = service.dispatch(actor, FAR, &scout, now).await.unwrap();

        let scheduler = Scheduler::new(service, SchedulerConfig::default());
        let summary = scheduler.tick(near.arrives_at).await.unwrap();
        assert_eq!(summary.resolved, 1);

        let world = store.snapshot().await;
        assert_eq!(world.movement(near.id).unwrap().state, MovementState::Resolved);
        assert_eq!(world.movement(far.id).unwrap().state, MovementState::EnRoute);
    }

    #[tokio::test]
    async fn tick_respects_batch_size() {
        let (_store, service) = setup();
        let now = Utc::now();
        let actor = Actor::new(ALICE, HOME);
        let scout = DispatchRequest::Scout { quantity: 1 };
        for _ in 0..3 {
            service.dispatch(actor, NEAR, &scout, now).await.unwrap();
        }

        let config = SchedulerConfig {
            batch_size: 2,
            tie_break: TieBreak::Insertion,
            ..SchedulerConfig::default()
        };
        let scheduler = Scheduler::new(service, config);
        let later = now + TimeDelta::hours(1);
        assert_eq!(scheduler.tick(later).await.unwrap().resolved, 2);
        // Due now: the remaining outbound leg and both return legs.
        assert_eq!(scheduler.tick(later).await.unwrap().resolved, 2);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (_store, service) = setup();
        let config = SchedulerConfig {
            poll_interval_ms: 10,
            ..SchedulerConfig::default()
        };
        let scheduler = Scheduler::new(service, config);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { scheduler.run(rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    struct RejectingCombat;

    impl CombatModel for RejectingCombat {
        fn fight(&self, _: &[Stack], _: &[Stack]) -> Result<BattleOutcome, CombatError> {
            Err(CombatError::Overflow)
        }
    }

    #[tokio::test]
    async fn failing_movement_is_closed_out_not_retried() {
        let catalog = UnitCatalog::standard();
        let mut world = WorldState::new();
        world.add_planet(planet(HOME, 0, Some(ALICE)));
        world.add_planet(planet(NEAR, 10, Some(BOB)));
        world.add_population(HOME, catalog::FIGHTER, ALICE, 5).unwrap();
        let store = Arc::new(MemoryStore::new(world, &catalog));
        let service = MovementService::new(store.clone(), catalog, &StarmapConfig::default())
            .with_combat(Arc::new(RejectingCombat));
        let attack = DispatchRequest::Attack {
            quantities: QuantityMap::single(catalog::FIGHTER, 5).unwrap(),
        };
        let movement = service
            .dispatch(Actor::new(ALICE, HOME), NEAR, &attack, Utc::now())
            .await
            .unwrap();

        let scheduler = Scheduler::new(Arc::new(service), SchedulerConfig::default());
        let first = scheduler.tick(movement.arrives_at).await.unwrap();
        assert_eq!((first.resolved, first.failed), (1, 0));
        let second = scheduler.tick(movement.arrives_at).await.unwrap();
        assert_eq!(second.total(), 0);
        assert_eq!(store.snapshot().await.quantity(HOME, catalog::FIGHTER, ALICE), 5);
    }
}

//! End-to-end dispatch and resolution tests against the in-memory store.
//!
//! Each test builds a small star map, dispatches through
//! [`MovementService`], resolves at chosen instants and inspects the
//! committed world.

#![allow(clippy::unwrap_used, clippy::too_many_lines)]

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use starmap_core::catalog::{FIGHTER, HEAVY_FIGHTER, SCOUT, SETTLER, TRANSPORTER};
use starmap_core::combat::{BattleOutcome, CombatError, CombatModel, Stack};
use starmap_core::config::TieBreak;
use starmap_core::factory::TargetRejection;
use starmap_core::resolver::ResolvedMovement;
use starmap_core::{
    Actor, DispatchError, DispatchRequest, MemoryStore, MovementService, MovementStore,
    Resolution, StarmapConfig, UnitCatalog, WorldState,
};
use starmap_ledger::conservation::verify_movement;
use starmap_types::{
    MovementId, MovementOutcome, MovementState, MovementType, Planet, PlanetId, PlayerId,
    QuantityMap, ReportBody, Resource, ResourceAmounts, StaleReason, UnitId,
};

const ALICE: PlayerId = PlayerId::from_u128(0xA11CE);
const BOB: PlayerId = PlayerId::from_u128(0xB0B);

/// Alice's home world at the origin.
const HOME: PlanetId = PlanetId::from_u128(1);
/// Bob's world, 50 distance units from home.
const ENEMY: PlanetId = PlanetId::from_u128(2);
/// Unclaimed planet, 30 units from home.
const NEUTRAL: PlanetId = PlanetId::from_u128(3);
/// Alice's second world, 40 units from home.
const COLONY: PlanetId = PlanetId::from_u128(4);

struct Fixture {
    store: Arc<MemoryStore>,
    service: MovementService,
    now: DateTime<Utc>,
}

fn planet(
    id: PlanetId,
    x: i32,
    y: i32,
    owner: Option<PlayerId>,
    stock: &[(Resource, u64)],
) -> Planet {
    Planet {
        id,
        name: format!("planet-{x}-{y}"),
        x,
        y,
        owner,
        resources: stock.iter().copied().collect(),
    }
}

fn fixture(populations: &[(PlanetId, UnitId, PlayerId, u64)]) -> Fixture {
    let catalog = UnitCatalog::standard();
    let mut world = WorldState::new();
    world.add_planet(planet(
        HOME,
        0,
        0,
        Some(ALICE),
        &[(Resource::Energy, 500), (Resource::Metal, 1000)],
    ));
    world.add_planet(planet(
        ENEMY,
        30,
        40,
        Some(BOB),
        &[(Resource::Energy, 100), (Resource::Metal, 300), (Resource::Crystal, 50)],
    ));
    world.add_planet(planet(NEUTRAL, 0, 30, None, &[]));
    world.add_planet(planet(COLONY, 40, 0, Some(ALICE), &[]));
    for (planet, unit, owner, quantity) in populations {
        world.add_population(*planet, *unit, *owner, *quantity).unwrap();
    }

    let store = Arc::new(MemoryStore::new(world, &catalog));
    let service = MovementService::new(store.clone(), catalog, &StarmapConfig::default());
    Fixture {
        store,
        service,
        now: Utc::now(),
    }
}

fn alice() -> Actor {
    Actor::new(ALICE, HOME)
}

fn units(pairs: &[(UnitId, u64)]) -> QuantityMap {
    QuantityMap::try_from_pairs(pairs.iter().copied()).unwrap()
}

async fn resolve_applied(
    service: &MovementService,
    id: MovementId,
    at: DateTime<Utc>,
) -> Option<ResolvedMovement> {
    match service.resolve(id, at).await.unwrap() {
        Resolution::Applied(resolved) => Some(resolved),
        Resolution::AlreadyResolved | Resolution::NotDue { .. } => None,
    }
}

/// Hand `planet` to `owner` directly in the store.
async fn seize(store: &MemoryStore, planet: PlanetId, owner: PlayerId) {
    let mut uow = store.begin().await.unwrap();
    uow.set_owner(planet, owner).await.unwrap();
    uow.commit().await.unwrap();
}

async fn assert_balanced(service: &MovementService, id: MovementId) {
    let entries = service.ledger_for(id).await.unwrap();
    assert!(
        verify_movement(id, &entries).is_balanced(),
        "movement {id} does not balance"
    );
}

// =============================================================================
// Dispatch validation
// =============================================================================

#[tokio::test]
async fn scout_request_beyond_stock_is_rejected() {
    let fx = fixture(&[(HOME, SCOUT, ALICE, 50)]);

    let result = fx
        .service
        .dispatch(alice(), ENEMY, &DispatchRequest::Scout { quantity: 60 }, fx.now)
        .await;

    assert!(matches!(
        result,
        Err(DispatchError::InsufficientQuantity {
            unit,
            requested: 60,
            available: 50,
        }) if unit == SCOUT
    ));
    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(HOME, SCOUT, ALICE), 50);
    assert_eq!(world.movements().count(), 0);
    assert!(world.journal().is_empty());
}

#[tokio::test]
async fn attack_short_on_heavies_leaves_fighters_untouched() {
    let fx = fixture(&[(HOME, FIGHTER, ALICE, 10), (HOME, HEAVY_FIGHTER, ALICE, 3)]);
    let request = DispatchRequest::Attack {
        quantities: units(&[(FIGHTER, 10), (HEAVY_FIGHTER, 5)]),
    };

    let result = fx.service.dispatch(alice(), ENEMY, &request, fx.now).await;

    assert!(matches!(
        result,
        Err(DispatchError::InsufficientQuantity {
            unit,
            requested: 5,
            available: 3,
        }) if unit == HEAVY_FIGHTER
    ));
    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(HOME, FIGHTER, ALICE), 10);
    assert_eq!(world.quantity(HOME, HEAVY_FIGHTER, ALICE), 3);
    assert_eq!(world.movements().count(), 0);
}

#[tokio::test]
async fn ineligible_unit_types_are_rejected() {
    let fx = fixture(&[(HOME, SCOUT, ALICE, 5), (HOME, TRANSPORTER, ALICE, 5)]);

    let attack_with_scouts = DispatchRequest::Attack {
        quantities: units(&[(SCOUT, 5)]),
    };
    let result = fx
        .service
        .dispatch(alice(), ENEMY, &attack_with_scouts, fx.now)
        .await;
    assert!(matches!(
        result,
        Err(DispatchError::IneligibleUnitType {
            unit,
            movement_type: MovementType::Attack,
            ..
        }) if unit == SCOUT
    ));

    let support_with_transporters = DispatchRequest::Support {
        quantities: units(&[(TRANSPORTER, 1)]),
    };
    let result = fx
        .service
        .dispatch(alice(), COLONY, &support_with_transporters, fx.now)
        .await;
    assert!(matches!(result, Err(DispatchError::IneligibleUnitType { .. })));
}

#[tokio::test]
async fn target_rules_are_enforced_at_dispatch() {
    let fx = fixture(&[
        (HOME, SETTLER, ALICE, 3),
        (HOME, FIGHTER, ALICE, 5),
        (HOME, SCOUT, ALICE, 5),
    ]);

    let occupy_own = fx
        .service
        .dispatch(alice(), COLONY, &DispatchRequest::Occupy, fx.now)
        .await;
    assert!(matches!(
        occupy_own,
        Err(DispatchError::InvalidTarget {
            reason: TargetRejection::AlreadyOwned,
            ..
        })
    ));

    let occupy_enemy = fx
        .service
        .dispatch(alice(), ENEMY, &DispatchRequest::Occupy, fx.now)
        .await;
    assert!(matches!(
        occupy_enemy,
        Err(DispatchError::InvalidTarget {
            reason: TargetRejection::CannotOccupy,
            ..
        })
    ));

    let support_enemy = DispatchRequest::Support {
        quantities: units(&[(FIGHTER, 2)]),
    };
    let result = fx.service.dispatch(alice(), ENEMY, &support_enemy, fx.now).await;
    assert!(matches!(
        result,
        Err(DispatchError::InvalidTarget {
            reason: TargetRejection::NotFriendly,
            ..
        })
    ));

    let result = fx
        .service
        .dispatch(alice(), HOME, &DispatchRequest::Scout { quantity: 1 }, fx.now)
        .await;
    assert!(matches!(
        result,
        Err(DispatchError::InvalidTarget {
            reason: TargetRejection::SameAsOrigin,
            ..
        })
    ));

    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(HOME, SETTLER, ALICE), 3);
    assert_eq!(world.quantity(HOME, FIGHTER, ALICE), 5);
    assert_eq!(world.movements().count(), 0);
}

#[tokio::test]
async fn dispatch_from_foreign_planet_is_rejected() {
    let fx = fixture(&[(ENEMY, SCOUT, ALICE, 5)]);
    let result = fx
        .service
        .dispatch(
            Actor::new(ALICE, ENEMY),
            NEUTRAL,
            &DispatchRequest::Scout { quantity: 1 },
            fx.now,
        )
        .await;
    assert!(matches!(
        result,
        Err(DispatchError::NotPlanetOwner { player, planet })
            if player == ALICE && planet == ENEMY
    ));
}

#[tokio::test]
async fn cargo_beyond_capacity_is_rejected() {
    let fx = fixture(&[(HOME, TRANSPORTER, ALICE, 1)]);
    let request = DispatchRequest::Transport {
        quantities: units(&[(TRANSPORTER, 1)]),
        cargo: [(Resource::Metal, 600)].into_iter().collect(),
    };

    let result = fx.service.dispatch(alice(), COLONY, &request, fx.now).await;

    assert!(matches!(
        result,
        Err(DispatchError::CargoExceedsCapacity {
            requested: 600,
            capacity: 500,
        })
    ));
    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(HOME, TRANSPORTER, ALICE), 1);
    let metal = world.planet(HOME).and_then(|p| p.resources.get(&Resource::Metal).copied());
    assert_eq!(metal, Some(1000));
}

#[tokio::test]
async fn concurrent_dispatches_never_over_reserve() {
    let fx = fixture(&[(HOME, SCOUT, ALICE, 50)]);
    let request = DispatchRequest::Scout { quantity: 7 };

    let attempts = (0..10).map(|_| fx.service.dispatch(alice(), ENEMY, &request, fx.now));
    let results = join_all(attempts).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(DispatchError::InsufficientQuantity { .. })))
        .count();
    assert_eq!(accepted, 7);
    assert_eq!(rejected, 3);
    assert_eq!(fx.store.snapshot().await.quantity(HOME, SCOUT, ALICE), 1);
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn scout_reserves_then_files_intelligence_and_returns() {
    let fx = fixture(&[(HOME, SCOUT, ALICE, 50), (ENEMY, FIGHTER, BOB, 4)]);

    let movement = fx
        .service
        .dispatch(alice(), ENEMY, &DispatchRequest::Scout { quantity: 30 }, fx.now)
        .await
        .unwrap();
    assert_eq!(movement.state, MovementState::EnRoute);
    // distance 50 * 60s / speed 20
    assert_eq!(movement.arrives_at, fx.now + TimeDelta::seconds(150));
    assert_eq!(fx.store.snapshot().await.quantity(HOME, SCOUT, ALICE), 20);

    let resolved = resolve_applied(&fx.service, movement.id, movement.arrives_at)
        .await
        .unwrap();
    assert!(matches!(resolved.outcome, MovementOutcome::Scouted { .. }));

    let reports = fx.service.reports_for(ALICE).await.unwrap();
    assert_eq!(reports.len(), 1);
    let sighted_fighters = reports.first().and_then(|r| match &r.body {
        ReportBody::Intelligence {
            owner, populations, ..
        } => {
            assert_eq!(*owner, Some(BOB));
            populations.iter().find(|p| p.unit_id == FIGHTER).map(|p| p.quantity)
        }
        ReportBody::Battle { .. } => None,
    });
    assert_eq!(sighted_fighters, Some(4));
    assert!(fx.service.reports_for(BOB).await.unwrap().is_empty());

    let stored = fx.service.movement(movement.id).await.unwrap().unwrap();
    assert_eq!(stored.state, MovementState::Resolved);
    assert_balanced(&fx.service, movement.id).await;

    let leg_id = resolved.return_leg.unwrap();
    let leg = fx.service.movement(leg_id).await.unwrap().unwrap();
    assert_eq!(leg.movement_type, MovementType::Return);
    assert_eq!(leg.destination, HOME);
    assert_eq!(leg.quantities.get(SCOUT), 30);

    let landed = resolve_applied(&fx.service, leg_id, leg.arrives_at).await.unwrap();
    assert_eq!(landed.outcome, MovementOutcome::Returned);
    assert_eq!(fx.store.snapshot().await.quantity(HOME, SCOUT, ALICE), 50);
    assert_balanced(&fx.service, leg_id).await;
}

#[tokio::test]
async fn resolution_is_idempotent_and_waits_for_arrival() {
    let fx = fixture(&[(HOME, SCOUT, ALICE, 5)]);
    let movement = fx
        .service
        .dispatch(alice(), ENEMY, &DispatchRequest::Scout { quantity: 5 }, fx.now)
        .await
        .unwrap();

    let early = fx.service.resolve(movement.id, fx.now).await.unwrap();
    assert_eq!(
        early,
        Resolution::NotDue {
            arrives_at: movement.arrives_at
        }
    );

    let first = fx.service.resolve(movement.id, movement.arrives_at).await.unwrap();
    assert!(matches!(first, Resolution::Applied(_)));
    let second = fx.service.resolve(movement.id, movement.arrives_at).await.unwrap();
    assert_eq!(second, Resolution::AlreadyResolved);

    let world = fx.store.snapshot().await;
    assert_eq!(world.reports().len(), 1);
    // The outbound leg and exactly one return leg.
    assert_eq!(world.movements().count(), 2);
}

#[tokio::test]
async fn late_resolution_keeps_the_return_schedule() {
    let fx = fixture(&[(HOME, SCOUT, ALICE, 5)]);
    let movement = fx
        .service
        .dispatch(alice(), ENEMY, &DispatchRequest::Scout { quantity: 5 }, fx.now)
        .await
        .unwrap();

    let late = movement.arrives_at + TimeDelta::hours(2);
    let resolved = resolve_applied(&fx.service, movement.id, late).await.unwrap();
    let leg = fx
        .service
        .movement(resolved.return_leg.unwrap())
        .await
        .unwrap()
        .unwrap();

    let trip = movement.arrives_at - movement.departed_at;
    assert_eq!(leg.departed_at, movement.arrives_at);
    assert_eq!(leg.arrives_at, movement.arrives_at + trip);
    assert_eq!(leg.parent, Some(movement.id));
}

#[tokio::test]
async fn winning_attack_destroys_garrison_and_plunders() {
    let fx = fixture(&[
        (HOME, FIGHTER, ALICE, 10),
        (HOME, HEAVY_FIGHTER, ALICE, 3),
        (ENEMY, FIGHTER, BOB, 2),
    ]);
    let request = DispatchRequest::Attack {
        quantities: units(&[(FIGHTER, 10), (HEAVY_FIGHTER, 3)]),
    };
    let movement = fx.service.dispatch(alice(), ENEMY, &request, fx.now).await.unwrap();
    // Group moves at the heavy fighter's speed of 8.
    assert_eq!(movement.arrives_at, fx.now + TimeDelta::seconds(375));

    let resolved = resolve_applied(&fx.service, movement.id, movement.arrives_at)
        .await
        .unwrap();
    assert!(matches!(
        resolved.outcome,
        MovementOutcome::Battle {
            attacker_won: true,
            ..
        }
    ));

    // Attack 175 against defense 12: one of each attacking stack falls.
    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(ENEMY, FIGHTER, BOB), 0);
    let enemy = world.planet(ENEMY).unwrap();
    assert_eq!(enemy.resources.get(&Resource::Energy).copied(), Some(0));
    assert_eq!(enemy.resources.get(&Resource::Metal).copied(), Some(140));
    assert_eq!(enemy.resources.get(&Resource::Crystal).copied(), Some(50));
    assert_eq!(enemy.owner, Some(BOB));

    let leg_id = resolved.return_leg.unwrap();
    let leg = world.movement(leg_id).unwrap();
    assert_eq!(leg.quantities.get(FIGHTER), 9);
    assert_eq!(leg.quantities.get(HEAVY_FIGHTER), 2);
    let expected_cargo: ResourceAmounts = [(Resource::Energy, 100), (Resource::Metal, 160)]
        .into_iter()
        .collect();
    assert_eq!(leg.cargo, expected_cargo);
    assert_balanced(&fx.service, movement.id).await;

    let arrival = leg.arrives_at;
    resolve_applied(&fx.service, leg_id, arrival).await.unwrap();
    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(HOME, FIGHTER, ALICE), 9);
    assert_eq!(world.quantity(HOME, HEAVY_FIGHTER, ALICE), 2);
    let home = world.planet(HOME).unwrap();
    assert_eq!(home.resources.get(&Resource::Energy).copied(), Some(600));
    assert_eq!(home.resources.get(&Resource::Metal).copied(), Some(1160));
    assert_balanced(&fx.service, leg_id).await;

    let reports = fx.service.reports_for(ALICE).await.unwrap();
    assert!(matches!(
        reports.first().map(|r| &r.body),
        Some(ReportBody::Battle {
            attacker_won: true,
            ..
        })
    ));
}

#[tokio::test]
async fn losing_attack_leaves_no_return_leg() {
    let fx = fixture(&[(HOME, FIGHTER, ALICE, 1), (ENEMY, FIGHTER, BOB, 10)]);
    let request = DispatchRequest::Attack {
        quantities: units(&[(FIGHTER, 1)]),
    };
    let movement = fx.service.dispatch(alice(), ENEMY, &request, fx.now).await.unwrap();

    let resolved = resolve_applied(&fx.service, movement.id, movement.arrives_at)
        .await
        .unwrap();

    assert!(matches!(
        resolved.outcome,
        MovementOutcome::Battle {
            attacker_won: false,
            ..
        }
    ));
    assert!(resolved.return_leg.is_none());
    // Attack 10 against defense 60: ceil(10 * 10 / 60) defenders fall.
    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(ENEMY, FIGHTER, BOB), 8);
    assert_eq!(world.quantity(HOME, FIGHTER, ALICE), 0);
    let enemy = world.planet(ENEMY).unwrap();
    assert_eq!(enemy.resources.get(&Resource::Energy).copied(), Some(100));
    assert_balanced(&fx.service, movement.id).await;
}

#[tokio::test]
async fn occupy_claims_unowned_planet() {
    let fx = fixture(&[(HOME, SETTLER, ALICE, 2)]);
    let movement = fx
        .service
        .dispatch(alice(), NEUTRAL, &DispatchRequest::Occupy, fx.now)
        .await
        .unwrap();
    assert_eq!(movement.quantities.get(SETTLER), 1);

    let resolved = resolve_applied(&fx.service, movement.id, movement.arrives_at)
        .await
        .unwrap();

    assert_eq!(resolved.outcome, MovementOutcome::Occupied);
    assert!(resolved.return_leg.is_none());
    let world = fx.store.snapshot().await;
    assert_eq!(world.planet(NEUTRAL).and_then(|p| p.owner), Some(ALICE));
    assert_eq!(world.quantity(HOME, SETTLER, ALICE), 1);
    assert_eq!(world.quantity(NEUTRAL, SETTLER, ALICE), 0);
    assert_balanced(&fx.service, movement.id).await;
}

#[tokio::test]
async fn occupy_of_planet_taken_before_arrival_consumes_settlers() {
    let fx = fixture(&[(HOME, SETTLER, ALICE, 1)]);
    let movement = fx
        .service
        .dispatch(alice(), NEUTRAL, &DispatchRequest::Occupy, fx.now)
        .await
        .unwrap();

    seize(&fx.store, NEUTRAL, BOB).await;

    let resolved = resolve_applied(&fx.service, movement.id, movement.arrives_at)
        .await
        .unwrap();

    assert_eq!(
        resolved.outcome,
        MovementOutcome::Stale {
            reason: StaleReason::OccupationDenied
        }
    );
    assert!(resolved.return_leg.is_none());
    let world = fx.store.snapshot().await;
    assert_eq!(world.planet(NEUTRAL).and_then(|p| p.owner), Some(BOB));
    assert_eq!(world.quantity(HOME, SETTLER, ALICE), 0);
    assert_eq!(world.movement(movement.id).unwrap().state, MovementState::Resolved);
    assert_balanced(&fx.service, movement.id).await;
}

#[tokio::test]
async fn support_joins_friendly_garrison() {
    let fx = fixture(&[(HOME, FIGHTER, ALICE, 8)]);
    let request = DispatchRequest::Support {
        quantities: units(&[(FIGHTER, 5)]),
    };
    let movement = fx.service.dispatch(alice(), COLONY, &request, fx.now).await.unwrap();

    let resolved = resolve_applied(&fx.service, movement.id, movement.arrives_at)
        .await
        .unwrap();

    assert_eq!(resolved.outcome, MovementOutcome::Reinforced);
    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(COLONY, FIGHTER, ALICE), 5);
    assert_eq!(world.quantity(HOME, FIGHTER, ALICE), 3);
    assert_balanced(&fx.service, movement.id).await;
}

#[tokio::test]
async fn support_to_lost_colony_returns_home() {
    let fx = fixture(&[(HOME, FIGHTER, ALICE, 5)]);
    let request = DispatchRequest::Support {
        quantities: units(&[(FIGHTER, 5)]),
    };
    let movement = fx.service.dispatch(alice(), COLONY, &request, fx.now).await.unwrap();
    seize(&fx.store, COLONY, BOB).await;

    let resolved = resolve_applied(&fx.service, movement.id, movement.arrives_at)
        .await
        .unwrap();
    assert_eq!(
        resolved.outcome,
        MovementOutcome::Stale {
            reason: StaleReason::NoLongerFriendly
        }
    );
    assert_eq!(fx.store.snapshot().await.quantity(COLONY, FIGHTER, ALICE), 0);

    let leg = fx
        .service
        .movement(resolved.return_leg.unwrap())
        .await
        .unwrap()
        .unwrap();
    resolve_applied(&fx.service, leg.id, leg.arrives_at).await.unwrap();
    assert_eq!(fx.store.snapshot().await.quantity(HOME, FIGHTER, ALICE), 5);
}

#[tokio::test]
async fn transport_delivers_cargo_and_returns_empty() {
    let fx = fixture(&[(HOME, TRANSPORTER, ALICE, 2)]);
    let request = DispatchRequest::Transport {
        quantities: units(&[(TRANSPORTER, 2)]),
        cargo: [(Resource::Metal, 600)].into_iter().collect(),
    };
    let movement = fx.service.dispatch(alice(), COLONY, &request, fx.now).await.unwrap();
    let home_metal = fx
        .store
        .snapshot()
        .await
        .planet(HOME)
        .and_then(|p| p.resources.get(&Resource::Metal).copied());
    assert_eq!(home_metal, Some(400));

    let resolved = resolve_applied(&fx.service, movement.id, movement.arrives_at)
        .await
        .unwrap();
    assert_eq!(resolved.outcome, MovementOutcome::Delivered);
    let world = fx.store.snapshot().await;
    let colony_metal = world
        .planet(COLONY)
        .and_then(|p| p.resources.get(&Resource::Metal).copied());
    assert_eq!(colony_metal, Some(600));
    assert_balanced(&fx.service, movement.id).await;

    let leg = world.movement(resolved.return_leg.unwrap()).unwrap().clone();
    assert!(leg.cargo.is_empty());
    resolve_applied(&fx.service, leg.id, leg.arrives_at).await.unwrap();
    assert_eq!(fx.store.snapshot().await.quantity(HOME, TRANSPORTER, ALICE), 2);
}

#[tokio::test]
async fn return_to_lost_origin_loses_units_and_cargo() {
    let fx = fixture(&[(HOME, FIGHTER, ALICE, 10)]);
    let request = DispatchRequest::Attack {
        quantities: units(&[(FIGHTER, 10)]),
    };
    let movement = fx.service.dispatch(alice(), ENEMY, &request, fx.now).await.unwrap();
    let resolved = resolve_applied(&fx.service, movement.id, movement.arrives_at)
        .await
        .unwrap();
    let leg_id = resolved.return_leg.unwrap();

    seize(&fx.store, HOME, BOB).await;
    let leg = fx.service.movement(leg_id).await.unwrap().unwrap();
    assert!(!leg.cargo.is_empty());
    let landed = resolve_applied(&fx.service, leg_id, leg.arrives_at).await.unwrap();

    assert_eq!(
        landed.outcome,
        MovementOutcome::Stale {
            reason: StaleReason::OriginLost
        }
    );
    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(HOME, FIGHTER, ALICE), 0);
    assert_eq!(world.quantity(HOME, FIGHTER, BOB), 0);
    let home_energy = world
        .planet(HOME)
        .and_then(|p| p.resources.get(&Resource::Energy).copied());
    assert_eq!(home_energy, Some(500));
    assert_balanced(&fx.service, leg_id).await;
}

// =============================================================================
// Failed resolution
// =============================================================================

/// A combat model that refuses every battle.
struct RejectingCombat;

impl CombatModel for RejectingCombat {
    fn fight(&self, _: &[Stack], _: &[Stack]) -> Result<BattleOutcome, CombatError> {
        Err(CombatError::InvalidForces("no battles today".to_owned()))
    }
}

fn rejecting_service(store: &Arc<MemoryStore>) -> MovementService {
    MovementService::new(store.clone(), UnitCatalog::standard(), &StarmapConfig::default())
        .with_combat(Arc::new(RejectingCombat))
}

#[tokio::test]
async fn huge_attack_resolves_and_balances() {
    let fleet = 1_000_000_000_000_000;
    let fx = fixture(&[(HOME, FIGHTER, ALICE, fleet), (ENEMY, FIGHTER, BOB, fleet)]);
    let request = DispatchRequest::Attack {
        quantities: units(&[(FIGHTER, fleet)]),
    };
    let movement = fx.service.dispatch(alice(), ENEMY, &request, fx.now).await.unwrap();

    let resolved = resolve_applied(&fx.service, movement.id, movement.arrives_at)
        .await
        .unwrap();
    assert!(matches!(
        resolved.outcome,
        MovementOutcome::Battle {
            attacker_won: true,
            ..
        }
    ));

    // Attack 1e16 against defense 6e15: 60% of the attackers fall.
    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(ENEMY, FIGHTER, BOB), 0);
    let leg = world.movement(resolved.return_leg.unwrap()).unwrap();
    assert_eq!(leg.quantities.get(FIGHTER), 400_000_000_000_000);
    assert_balanced(&fx.service, movement.id).await;

    let due = fx
        .service
        .due_movements(movement.arrives_at, 100, TieBreak::Arrival)
        .await
        .unwrap();
    assert!(!due.contains(&movement.id));
}

#[tokio::test]
async fn failing_resolution_recalls_units_home() {
    let fx = fixture(&[(HOME, FIGHTER, ALICE, 10), (ENEMY, FIGHTER, BOB, 2)]);
    let service = rejecting_service(&fx.store);
    let request = DispatchRequest::Attack {
        quantities: units(&[(FIGHTER, 10)]),
    };
    let movement = service.dispatch(alice(), ENEMY, &request, fx.now).await.unwrap();

    let resolved = resolve_applied(&service, movement.id, movement.arrives_at)
        .await
        .unwrap();
    assert_eq!(
        resolved.outcome,
        MovementOutcome::Stale {
            reason: StaleReason::Unresolvable
        }
    );
    assert!(resolved.return_leg.is_none());

    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(HOME, FIGHTER, ALICE), 10);
    assert_eq!(world.quantity(ENEMY, FIGHTER, BOB), 2);
    let stored = world.movement(movement.id).unwrap();
    assert_eq!(stored.state, MovementState::Resolved);
    assert!(world.reports().is_empty());
    assert_balanced(&service, movement.id).await;

    // Nothing is left to retry.
    let due = service
        .due_movements(movement.arrives_at, 100, TieBreak::Arrival)
        .await
        .unwrap();
    assert!(due.is_empty());
    let again = service.resolve(movement.id, movement.arrives_at).await.unwrap();
    assert_eq!(again, Resolution::AlreadyResolved);
}

#[tokio::test]
async fn failing_resolution_after_origin_lost_loses_units() {
    let fx = fixture(&[(HOME, FIGHTER, ALICE, 10)]);
    let service = rejecting_service(&fx.store);
    let request = DispatchRequest::Attack {
        quantities: units(&[(FIGHTER, 10)]),
    };
    let movement = service.dispatch(alice(), ENEMY, &request, fx.now).await.unwrap();
    seize(&fx.store, HOME, BOB).await;

    let resolved = resolve_applied(&service, movement.id, movement.arrives_at)
        .await
        .unwrap();
    assert_eq!(
        resolved.outcome,
        MovementOutcome::Stale {
            reason: StaleReason::Unresolvable
        }
    );

    let world = fx.store.snapshot().await;
    assert_eq!(world.quantity(HOME, FIGHTER, ALICE), 0);
    assert_eq!(world.quantity(HOME, FIGHTER, BOB), 0);
    assert_balanced(&service, movement.id).await;
}


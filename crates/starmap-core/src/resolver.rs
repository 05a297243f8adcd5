//! Movement resolution.
//!
//! A due movement is resolved exactly once, inside one unit of work:
//!
//! 1. Lock the movement. If it is no longer `en_route` the call is a
//!    no-op ([`Resolution::AlreadyResolved`]); if it has not arrived yet
//!    nothing happens ([`Resolution::NotDue`]).
//! 2. Lock the destination planet and re-read it. Preconditions checked at
//!    dispatch are checked again here, because the world may have changed
//!    while the units travelled.
//! 3. Apply the type-specific outcome, journal every transfer, and insert
//!    the return leg when units survive and fly home.
//! 4. Transition the movement to `resolved` with a conditional update.
//!
//! A resolution that fails for a reason a retry cannot change (a missing
//! planet, an unknown unit, a combat model rejecting the forces) is closed
//! out by [`MovementResolver::abort`] instead: the units are recalled to
//! their origin and the movement resolves as `Stale(unresolvable)`.
//!
//! | Type | Outcome | Stale target |
//! |------|---------|--------------|
//! | scout | intelligence report, scouts return | -- |
//! | attack | battle, plunder, survivors return | -- |
//! | occupy | ownership transfer, settlers consumed | settlers consumed |
//! | support | units join the garrison | units return |
//! | transport | cargo unloaded, transporters return | units return with cargo |
//! | return | units and cargo credited home | units and cargo lost |

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use starmap_ledger::conservation::{ConservationResult, verify_movement};
use starmap_ledger::{Journal, LedgerError};
use starmap_types::{
    Asset, Movement, MovementId, MovementOutcome, MovementState, MovementType, Planet, PlanetId,
    PopulationSighting, QuantityMap, Report, ReportBody, ReportId, Resource, ResourceAmounts,
    StaleReason, Unit, UnitCounts, UnitId,
};

use crate::catalog::UnitCatalog;
use crate::combat::{CombatError, CombatModel, Stack};
use crate::factory::carrying_capacity;
use crate::policy::{Actor, GamePolicy};
use crate::store::{StoreError, UnitOfWork};
use crate::travel::{TravelCalculator, TravelError};

/// Result of a resolve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The movement was resolved by this call.
    Applied(ResolvedMovement),
    /// The movement had already been resolved; nothing changed.
    AlreadyResolved,
    /// The movement has not arrived yet; nothing changed.
    NotDue {
        /// Scheduled arrival.
        arrives_at: DateTime<Utc>,
    },
}

/// What a successful resolution did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMovement {
    /// The resolved movement.
    pub movement_id: MovementId,
    /// Its type.
    pub movement_type: MovementType,
    /// The applied outcome.
    pub outcome: MovementOutcome,
    /// The return leg created, if any.
    pub return_leg: Option<MovementId>,
}

/// Errors that abort a resolution. The unit of work is rolled back.
///
/// Backend failures leave the movement `en_route` for a later retry; see
/// [`ResolveError::needs_recall`] for the rest.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No movement with this id exists.
    #[error("movement {0} not found")]
    MovementNotFound(MovementId),

    /// The movement references a missing planet.
    #[error("planet {0} not found")]
    PlanetNotFound(PlanetId),

    /// A stationed or travelling unit is not in the catalog.
    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),

    /// The combat model failed.
    #[error("combat error: {0}")]
    Combat(#[from] CombatError),

    /// Return leg timing overflowed.
    #[error("travel error: {0}")]
    Travel(#[from] TravelError),

    /// A ledger invariant failed while journaling.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ResolveError {
    /// Whether retrying would fail the same way, so the movement should be
    /// recalled with [`MovementResolver::abort`] rather than left `en_route`.
    ///
    /// Backend failures may clear up and a missing movement has nothing to
    /// recall; everything else depends only on stored state.
    pub const fn needs_recall(&self) -> bool {
        !matches!(
            self,
            Self::MovementNotFound(_)
                | Self::Store(StoreError::Backend(_) | StoreError::MovementNotFound(_))
        )
    }
}

/// Outcome plus the optional return leg produced by a type handler.
type Applied = (MovementOutcome, Option<Movement>);

/// Resolves due movements.
pub struct MovementResolver<'a> {
    /// Unit reference data.
    pub catalog: &'a UnitCatalog,
    /// Target authorization rules.
    pub policy: &'a dyn GamePolicy,
    /// Battle model.
    pub combat: &'a dyn CombatModel,
}

impl MovementResolver<'_> {
    /// Resolve movement `id` as of `now`.
    ///
    /// The caller commits the unit of work only for
    /// [`Resolution::Applied`].
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the movement or its planets cannot be
    /// loaded or a write fails.
    pub async fn resolve(
        &self,
        uow: &mut dyn UnitOfWork,
        id: MovementId,
        now: DateTime<Utc>,
    ) -> Result<Resolution, ResolveError> {
        let movement = uow
            .movement_for_update(id)
            .await?
            .ok_or(ResolveError::MovementNotFound(id))?;
        if movement.state != MovementState::EnRoute {
            return Ok(Resolution::AlreadyResolved);
        }
        if !movement.is_due(now) {
            return Ok(Resolution::NotDue {
                arrives_at: movement.arrives_at,
            });
        }

        let target = uow
            .lock_planet(movement.destination)
            .await?
            .ok_or(ResolveError::PlanetNotFound(movement.destination))?;

        let mut journal = Journal::at(now);
        let (outcome, return_leg) = match movement.movement_type {
            MovementType::Scout => Self::scout(uow, &movement, &target, &mut journal, now).await?,
            MovementType::Attack => self.attack(uow, &movement, &target, &mut journal, now).await?,
            MovementType::Occupy => self.occupy(uow, &movement, &target, &mut journal).await?,
            MovementType::Support => self.support(uow, &movement, &target, &mut journal).await?,
            MovementType::Transport => {
                self.transport(uow, &movement, &target, &mut journal).await?
            }
            MovementType::Return => Self::land(uow, &movement, &target, &mut journal).await?,
        };

        if let Some(leg) = &return_leg {
            uow.insert_movement(leg).await?;
        }
        uow.record_ledger(&journal.drain()).await?;

        if !uow.finalize_movement(id, &outcome, now).await? {
            return Ok(Resolution::AlreadyResolved);
        }

        check_conservation(uow, id).await?;

        info!(
            movement_id = %id,
            movement_type = movement.movement_type.as_str(),
            destination = %movement.destination,
            outcome = ?outcome,
            "Movement resolved"
        );

        Ok(Resolution::Applied(ResolvedMovement {
            movement_id: id,
            movement_type: movement.movement_type,
            outcome,
            return_leg: return_leg.map(|leg| leg.id),
        }))
    }

    /// Close out movement `id` after `cause` made its resolution fail.
    ///
    /// The units and cargo are credited back at the origin if the mover
    /// still holds it and are lost otherwise. The movement resolves as
    /// `Stale(unresolvable)`. The caller commits the unit of work only for
    /// [`Resolution::Applied`].
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the movement cannot be loaded or a write
    /// fails.
    pub async fn abort(
        uow: &mut dyn UnitOfWork,
        id: MovementId,
        cause: &ResolveError,
        now: DateTime<Utc>,
    ) -> Result<Resolution, ResolveError> {
        let movement = uow
            .movement_for_update(id)
            .await?
            .ok_or(ResolveError::MovementNotFound(id))?;
        if movement.state != MovementState::EnRoute {
            return Ok(Resolution::AlreadyResolved);
        }

        let origin = uow.lock_planet(movement.origin).await?;
        let mut journal = Journal::at(now);
        let recalled = Self::bring_home(uow, &movement, origin.as_ref(), &mut journal).await?;
        uow.record_ledger(&journal.drain()).await?;

        let outcome = MovementOutcome::Stale {
            reason: StaleReason::Unresolvable,
        };
        if !uow.finalize_movement(id, &outcome, now).await? {
            return Ok(Resolution::AlreadyResolved);
        }
        check_conservation(uow, id).await?;

        error!(
            movement_id = %id,
            movement_type = movement.movement_type.as_str(),
            destination = %movement.destination,
            recalled,
            cause = %cause,
            "Movement could not be resolved; units recalled"
        );

        Ok(Resolution::Applied(ResolvedMovement {
            movement_id: id,
            movement_type: movement.movement_type,
            outcome,
            return_leg: None,
        }))
    }

    // -----------------------------------------------------------------------
    // Type handlers
    // -----------------------------------------------------------------------

    async fn scout(
        uow: &mut dyn UnitOfWork,
        movement: &Movement,
        target: &Planet,
        journal: &mut Journal,
        now: DateTime<Utc>,
    ) -> Result<Applied, ResolveError> {
        let populations = uow
            .populations_at(target.id)
            .await?
            .into_iter()
            .filter(|p| p.quantity > 0)
            .map(|p| PopulationSighting {
                owner: p.owner,
                unit_id: p.unit_id,
                quantity: p.quantity,
            })
            .collect();

        let report = report_for(
            movement,
            ReportBody::Intelligence {
                owner: target.owner,
                populations,
                resources: target.resources.clone(),
            },
            now,
        );
        uow.insert_report(&report).await?;

        let leg = return_leg(
            movement,
            movement.quantities.clone(),
            ResourceAmounts::new(),
            journal,
        )?;
        Ok((MovementOutcome::Scouted { report: report.id }, Some(leg)))
    }

    async fn attack(
        &self,
        uow: &mut dyn UnitOfWork,
        movement: &Movement,
        target: &Planet,
        journal: &mut Journal,
        now: DateTime<Utc>,
    ) -> Result<Applied, ResolveError> {
        let garrison = uow.populations_at(target.id).await?;
        let defenders = garrison
            .iter()
            .filter(|p| p.owner != movement.owner && p.quantity > 0)
            .map(|p| {
                Ok(Stack {
                    owner: p.owner,
                    unit: self.unit(p.unit_id)?.clone(),
                    quantity: p.quantity,
                })
            })
            .collect::<Result<Vec<_>, ResolveError>>()?;
        let attackers = movement
            .quantities
            .iter()
            .map(|(unit, quantity)| {
                Ok(Stack {
                    owner: movement.owner,
                    unit: self.unit(unit)?.clone(),
                    quantity,
                })
            })
            .collect::<Result<Vec<_>, ResolveError>>()?;

        let battle = self.combat.fight(&attackers, &defenders)?;

        for loss in battle.attacker_losses.iter().filter(|l| l.lost > 0) {
            journal.record_casualty(movement.id, movement.owner, loss.unit_id, loss.lost)?;
        }
        for loss in battle.defender_losses.iter().filter(|l| l.lost > 0) {
            let removed = uow
                .remove_up_to(target.id, loss.unit_id, loss.owner, loss.lost)
                .await?;
            if removed > 0 {
                journal.record_garrison_casualty(
                    movement.id,
                    loss.owner,
                    loss.unit_id,
                    removed,
                    target.id,
                )?;
            }
        }

        let survivors = battle.attacker_survivors();
        let plunder = if battle.attacker_won {
            self.plunder(uow, movement, target, &survivors, journal).await?
        } else {
            ResourceAmounts::new()
        };

        let report = report_for(
            movement,
            ReportBody::Battle {
                defender: target.owner,
                attackers: movement.quantities.as_map().clone(),
                defenders: force_by_unit(&defenders),
                attacker_losses: battle.attacker_losses_by_unit(),
                defender_losses: battle.defender_losses_by_unit(),
                attacker_won: battle.attacker_won,
                plunder: plunder.clone(),
            },
            now,
        );
        uow.insert_report(&report).await?;

        let leg = QuantityMap::from_counts(&survivors)
            .map(|units| return_leg(movement, units, plunder, journal))
            .transpose()?;
        Ok((
            MovementOutcome::Battle {
                report: report.id,
                attacker_won: battle.attacker_won,
            },
            leg,
        ))
    }

    /// Carry off the target's stock up to the survivors' capacity, in
    /// [`Resource::ALL`] order.
    async fn plunder(
        &self,
        uow: &mut dyn UnitOfWork,
        movement: &Movement,
        target: &Planet,
        survivors: &UnitCounts,
        journal: &mut Journal,
    ) -> Result<ResourceAmounts, ResolveError> {
        let mut remaining = carrying_capacity(
            survivors
                .iter()
                .filter_map(|(id, qty)| self.catalog.get(*id).map(|u| (*qty, u))),
        )
        .ok_or(LedgerError::Overflow)?;

        let mut plunder = ResourceAmounts::new();
        for resource in Resource::ALL {
            let stock = target.resources.get(&resource).copied().unwrap_or(0);
            let take = stock.min(remaining);
            if take == 0 {
                continue;
            }
            uow.debit_resource(target.id, resource, take).await?;
            journal.record_plunder(movement.id, movement.owner, resource, take, target.id)?;
            plunder.insert(resource, take);
            remaining = remaining.saturating_sub(take);
        }
        Ok(plunder)
    }

    async fn occupy(
        &self,
        uow: &mut dyn UnitOfWork,
        movement: &Movement,
        target: &Planet,
        journal: &mut Journal,
    ) -> Result<Applied, ResolveError> {
        let actor = Actor::new(movement.owner, movement.origin);
        let outcome = if target.is_owned_by(movement.owner) {
            stale(movement, StaleReason::AlreadyOwned)
        } else if !self.policy.can_occupy(&actor, target) {
            stale(movement, StaleReason::OccupationDenied)
        } else {
            uow.set_owner(target.id, movement.owner).await?;
            MovementOutcome::Occupied
        };

        // Settlers are spent whether or not the claim succeeds.
        for (unit, quantity) in movement.quantities.iter() {
            journal.record_consume(movement.id, movement.owner, unit, quantity)?;
        }
        Ok((outcome, None))
    }

    async fn support(
        &self,
        uow: &mut dyn UnitOfWork,
        movement: &Movement,
        target: &Planet,
        journal: &mut Journal,
    ) -> Result<Applied, ResolveError> {
        let actor = Actor::new(movement.owner, movement.origin);
        if !self.policy.is_friendly(&actor, target) {
            let leg = return_leg(
                movement,
                movement.quantities.clone(),
                ResourceAmounts::new(),
                journal,
            )?;
            return Ok((stale(movement, StaleReason::NoLongerFriendly), Some(leg)));
        }

        for (unit, quantity) in movement.quantities.iter() {
            uow.credit(target.id, unit, movement.owner, quantity).await?;
            journal.record_reinforce(movement.id, movement.owner, unit, quantity, target.id)?;
        }
        Ok((MovementOutcome::Reinforced, None))
    }

    async fn transport(
        &self,
        uow: &mut dyn UnitOfWork,
        movement: &Movement,
        target: &Planet,
        journal: &mut Journal,
    ) -> Result<Applied, ResolveError> {
        let actor = Actor::new(movement.owner, movement.origin);
        if !self.policy.is_friendly(&actor, target) {
            let leg = return_leg(
                movement,
                movement.quantities.clone(),
                movement.cargo.clone(),
                journal,
            )?;
            return Ok((stale(movement, StaleReason::NoLongerFriendly), Some(leg)));
        }

        for (resource, amount) in positive(&movement.cargo) {
            uow.credit_resource(target.id, resource, amount).await?;
            journal.record_cargo_unload(movement.id, movement.owner, resource, amount, target.id)?;
        }
        let leg = return_leg(
            movement,
            movement.quantities.clone(),
            ResourceAmounts::new(),
            journal,
        )?;
        Ok((MovementOutcome::Delivered, Some(leg)))
    }

    /// A return leg reaching home. `home` is the leg's destination.
    async fn land(
        uow: &mut dyn UnitOfWork,
        movement: &Movement,
        home: &Planet,
        journal: &mut Journal,
    ) -> Result<Applied, ResolveError> {
        if Self::bring_home(uow, movement, Some(home), journal).await? {
            Ok((MovementOutcome::Returned, None))
        } else {
            Ok((stale(movement, StaleReason::OriginLost), None))
        }
    }

    /// Credit the movement's units and cargo at `home` when the mover holds
    /// it; otherwise journal them as lost. Returns whether they landed.
    async fn bring_home(
        uow: &mut dyn UnitOfWork,
        movement: &Movement,
        home: Option<&Planet>,
        journal: &mut Journal,
    ) -> Result<bool, ResolveError> {
        let Some(home) = home.filter(|h| h.is_owned_by(movement.owner)) else {
            for (unit, quantity) in movement.quantities.iter() {
                journal.record_casualty(movement.id, movement.owner, unit, quantity)?;
            }
            for (resource, amount) in positive(&movement.cargo) {
                journal.record_cargo_loss(movement.id, movement.owner, resource, amount)?;
            }
            return Ok(false);
        };

        for (unit, quantity) in movement.quantities.iter() {
            uow.credit(home.id, unit, movement.owner, quantity).await?;
            journal.record_return(movement.id, movement.owner, unit, quantity, home.id)?;
        }
        for (resource, amount) in positive(&movement.cargo) {
            uow.credit_resource(home.id, resource, amount).await?;
            journal.record_cargo_unload(movement.id, movement.owner, resource, amount, home.id)?;
        }
        Ok(true)
    }

    fn unit(&self, id: UnitId) -> Result<&Unit, ResolveError> {
        self.catalog.get(id).ok_or(ResolveError::UnknownUnit(id))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build the leg carrying `units` and `cargo` from `parent`'s destination
/// back to its origin, and journal the handoff.
///
/// The leg departs when the parent arrived and takes the same time, so its
/// schedule does not depend on when the scheduler got to the parent.
fn return_leg(
    parent: &Movement,
    units: QuantityMap,
    cargo: ResourceAmounts,
    journal: &mut Journal,
) -> Result<Movement, ResolveError> {
    let duration = parent.arrives_at.signed_duration_since(parent.departed_at);
    let departed_at = parent.arrives_at;
    let arrives_at = TravelCalculator::arrival(departed_at, duration)?;
    let id = MovementId::new();

    for (unit, quantity) in units.iter() {
        journal.record_handoff(parent.id, id, parent.owner, Asset::Unit(unit), quantity)?;
    }
    let cargo: ResourceAmounts = positive(&cargo).collect();
    for (resource, amount) in &cargo {
        journal.record_handoff(parent.id, id, parent.owner, Asset::Resource(*resource), *amount)?;
    }

    Ok(Movement {
        id,
        movement_type: MovementType::Return,
        owner: parent.owner,
        origin: parent.destination,
        destination: parent.origin,
        quantities: units,
        cargo,
        departed_at,
        arrives_at,
        state: MovementState::EnRoute,
        outcome: None,
        resolved_at: None,
        parent: Some(parent.id),
    })
}

/// Log an error if the movement's ledger entries do not balance.
async fn check_conservation(uow: &mut dyn UnitOfWork, id: MovementId) -> Result<(), ResolveError> {
    let entries = uow.ledger_for(id).await?;
    if let ConservationResult::Anomaly(anomaly) = verify_movement(id, &entries) {
        error!(
            movement_id = %id,
            imbalances = anomaly.imbalances.len(),
            "{anomaly}"
        );
    }
    Ok(())
}

fn report_for(movement: &Movement, body: ReportBody, now: DateTime<Utc>) -> Report {
    Report {
        id: ReportId::new(),
        player: movement.owner,
        planet: movement.destination,
        movement: movement.id,
        body,
        created_at: now,
    }
}

fn stale(movement: &Movement, reason: StaleReason) -> MovementOutcome {
    warn!(
        movement_id = %movement.id,
        movement_type = movement.movement_type.as_str(),
        destination = %movement.destination,
        reason = reason.as_str(),
        "Stale target at resolution"
    );
    MovementOutcome::Stale { reason }
}

fn positive(amounts: &ResourceAmounts) -> impl Iterator<Item = (Resource, u64)> + '_ {
    amounts
        .iter()
        .filter(|(_, amount)| **amount > 0)
        .map(|(resource, amount)| (*resource, *amount))
}

fn force_by_unit(stacks: &[Stack]) -> UnitCounts {
    let mut counts = UnitCounts::new();
    for stack in stacks {
        let entry = counts.entry(stack.unit.id).or_insert(0);
        *entry = entry.saturating_add(stack.quantity);
    }
    counts
}

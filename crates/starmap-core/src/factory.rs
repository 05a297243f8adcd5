//! Dispatch validation and movement creation.
//!
//! Every dispatch type follows the same template:
//!
//! 1. Lock the actor's active planet and check the actor owns it.
//! 2. Build the reserved [`QuantityMap`] and check type eligibility.
//! 3. Check the type's target precondition.
//! 4. Compute the arrival time from the slowest unit.
//! 5. Reserve every quantity (and debit cargo), journal the transfers and
//!    insert the `en_route` movement.
//!
//! All of it runs in the caller's unit of work; any error leaves the
//! unit of work uncommitted, so nothing is reserved.

use chrono::{DateTime, Utc};
use tracing::debug;

use starmap_ledger::{Journal, LedgerError};
use starmap_types::{
    Movement, MovementId, MovementState, MovementType, Planet, PlanetId, PlayerId, QuantityError,
    QuantityMap, Resource, ResourceAmounts, Unit, UnitId, UnitKind,
};

use crate::catalog::UnitCatalog;
use crate::policy::{Actor, GamePolicy};
use crate::store::{StoreError, UnitOfWork};
use crate::travel::{TravelCalculator, TravelError};

// ---------------------------------------------------------------------------
// Request and errors
// ---------------------------------------------------------------------------

/// A validated-shape dispatch request, one variant per movement type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchRequest {
    /// Send scouts to gather intelligence.
    Scout {
        /// Number of scouts.
        quantity: u64,
    },
    /// Send fighters and heavy fighters to fight the garrison.
    Attack {
        /// Units to send.
        quantities: QuantityMap,
    },
    /// Send the configured number of settlers to claim the planet.
    Occupy,
    /// Station combat units at a friendly planet.
    Support {
        /// Units to send.
        quantities: QuantityMap,
    },
    /// Carry resources to a friendly planet.
    Transport {
        /// Transporters to send.
        quantities: QuantityMap,
        /// Resources to load.
        cargo: ResourceAmounts,
    },
}

impl DispatchRequest {
    /// The movement type this request creates.
    pub const fn movement_type(&self) -> MovementType {
        match self {
            Self::Scout { .. } => MovementType::Scout,
            Self::Attack { .. } => MovementType::Attack,
            Self::Occupy => MovementType::Occupy,
            Self::Support { .. } => MovementType::Support,
            Self::Transport { .. } => MovementType::Transport,
        }
    }
}

/// Why a target planet was refused at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRejection {
    /// The destination is the origin.
    SameAsOrigin,
    /// The actor already owns the destination.
    AlreadyOwned,
    /// Policy forbids occupying the destination.
    CannotOccupy,
    /// The destination is not friendly.
    NotFriendly,
}

impl core::fmt::Display for TargetRejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Self::SameAsOrigin => "destination is the origin planet",
            Self::AlreadyOwned => "destination is already owned by the player",
            Self::CannotOccupy => "destination cannot be occupied",
            Self::NotFriendly => "destination is not friendly",
        };
        f.write_str(text)
    }
}

/// Errors that reject a dispatch. A rejected dispatch has no effect.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Fewer units are stationed than requested.
    #[error("insufficient quantity of unit {unit}: requested {requested}, available {available}")]
    InsufficientQuantity {
        /// Unit type.
        unit: UnitId,
        /// Units requested.
        requested: u64,
        /// Units available.
        available: u64,
    },

    /// The origin's stock cannot cover the cargo.
    #[error("insufficient {resource:?}: requested {requested}, available {available}")]
    InsufficientResource {
        /// Resource.
        resource: Resource,
        /// Amount requested.
        requested: u64,
        /// Amount available.
        available: u64,
    },

    /// A unit type may not take part in this movement type.
    #[error("unit {unit} ({kind:?}) cannot be sent on a {movement_type:?} movement")]
    IneligibleUnitType {
        /// Unit type.
        unit: UnitId,
        /// Its role.
        kind: UnitKind,
        /// Requested movement type.
        movement_type: MovementType,
    },

    /// The target fails the movement type's precondition.
    #[error("invalid target {planet}: {reason}")]
    InvalidTarget {
        /// Target planet.
        planet: PlanetId,
        /// What is wrong with it.
        reason: TargetRejection,
    },

    /// The unit id is not in the catalog.
    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),

    /// The catalog has no unit of a kind the movement type needs.
    #[error("no {0:?} unit in the catalog")]
    MissingUnitKind(UnitKind),

    /// No units, or a zero amount, were requested.
    #[error("dispatch requests no units")]
    EmptyDispatch,

    /// The same unit appeared twice in the request.
    #[error("unit {0} requested more than once")]
    DuplicateUnit(UnitId),

    /// Cargo exceeds what the transporters can carry.
    #[error("cargo {requested} exceeds capacity {capacity}")]
    CargoExceedsCapacity {
        /// Total cargo requested.
        requested: u64,
        /// Total capacity of the dispatched units.
        capacity: u64,
    },

    /// The origin or destination planet does not exist.
    #[error("unknown planet {0}")]
    UnknownPlanet(PlanetId),

    /// The actor does not own its active planet.
    #[error("player {player} does not own planet {planet}")]
    NotPlanetOwner {
        /// Acting player.
        player: PlayerId,
        /// Their claimed active planet.
        planet: PlanetId,
    },

    /// Travel time could not be computed.
    #[error("travel error: {0}")]
    Travel(#[from] TravelError),

    /// A ledger invariant failed while journaling.
    #[error("ledger error: {0}")]
    Ledger(LedgerError),

    /// The store failed.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<QuantityError> for DispatchError {
    fn from(err: QuantityError) -> Self {
        match err {
            QuantityError::Empty | QuantityError::ZeroAmount(_) => Self::EmptyDispatch,
            QuantityError::DuplicateUnit(unit) => Self::DuplicateUnit(unit),
        }
    }
}

impl From<LedgerError> for DispatchError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientQuantity {
                unit,
                requested,
                available,
            } => Self::InsufficientQuantity {
                unit,
                requested,
                available,
            },
            LedgerError::InsufficientResource {
                resource,
                requested,
                available,
            } => Self::InsufficientResource {
                resource,
                requested,
                available,
            },
            LedgerError::ZeroQuantity => Self::EmptyDispatch,
            other => Self::Ledger(other),
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Ledger(ledger) => Self::from(ledger),
            StoreError::PlanetNotFound(planet) => Self::UnknownPlanet(planet),
            other => Self::Store(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Creates movements from dispatch requests.
pub struct MovementFactory<'a> {
    /// Unit reference data.
    pub catalog: &'a UnitCatalog,
    /// Travel time calculator.
    pub travel: &'a TravelCalculator,
    /// Target authorization rules.
    pub policy: &'a dyn GamePolicy,
    /// Settlers per occupy dispatch.
    pub settler_count: u64,
}

impl MovementFactory<'_> {
    /// Validate `request`, reserve its units and insert the movement.
    ///
    /// The caller commits the unit of work on success.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] on any rejection; the unit of work must
    /// then be dropped.
    pub async fn create(
        &self,
        uow: &mut dyn UnitOfWork,
        actor: Actor,
        destination: PlanetId,
        request: &DispatchRequest,
        now: DateTime<Utc>,
    ) -> Result<Movement, DispatchError> {
        let movement_type = request.movement_type();

        // 1. Origin, then destination.
        let origin = uow
            .lock_planet(actor.planet)
            .await?
            .ok_or(DispatchError::UnknownPlanet(actor.planet))?;
        if !origin.is_owned_by(actor.player) {
            return Err(DispatchError::NotPlanetOwner {
                player: actor.player,
                planet: actor.planet,
            });
        }
        let target = uow
            .planet(destination)
            .await?
            .ok_or(DispatchError::UnknownPlanet(destination))?;
        if target.id == origin.id {
            return Err(invalid(destination, TargetRejection::SameAsOrigin));
        }

        // 2. Quantities and eligibility.
        let quantities = self.quantities_for(request)?;
        let units = self.eligible_units(&quantities, movement_type)?;

        // 3. Target precondition.
        self.check_target(&actor, &target, movement_type)?;
        let cargo = match request {
            DispatchRequest::Transport { cargo, .. } => check_cargo(cargo, &quantities, &units)?,
            _ => ResourceAmounts::new(),
        };

        // 4. Travel time.
        let speed = TravelCalculator::group_speed(units.iter().copied())?;
        let duration = self.travel.duration(&origin, &target, speed)?;
        let arrives_at = TravelCalculator::arrival(now, duration)?;

        // 5. Reserve, journal, insert.
        let id = MovementId::new();
        let mut journal = Journal::at(now);
        for (unit, amount) in quantities.iter() {
            uow.reserve(origin.id, unit, actor.player, amount).await?;
            journal.record_dispatch(id, actor.player, unit, amount, origin.id)?;
        }
        for (resource, amount) in &cargo {
            uow.debit_resource(origin.id, *resource, *amount).await?;
            journal.record_cargo_load(id, actor.player, *resource, *amount, origin.id)?;
        }
        uow.record_ledger(&journal.drain()).await?;

        let movement = Movement {
            id,
            movement_type,
            owner: actor.player,
            origin: origin.id,
            destination: target.id,
            quantities,
            cargo,
            departed_at: now,
            arrives_at,
            state: MovementState::EnRoute,
            outcome: None,
            resolved_at: None,
            parent: None,
        };
        uow.insert_movement(&movement).await?;

        debug!(
            movement_id = %movement.id,
            movement_type = movement_type.as_str(),
            origin = %movement.origin,
            destination = %movement.destination,
            travel_seconds = duration.num_seconds(),
            "Movement created"
        );
        Ok(movement)
    }

    /// The reserved mapping for a request.
    fn quantities_for(&self, request: &DispatchRequest) -> Result<QuantityMap, DispatchError> {
        match request {
            DispatchRequest::Scout { quantity } => {
                let scout = self
                    .catalog
                    .of_kind(UnitKind::Scout)
                    .ok_or(DispatchError::MissingUnitKind(UnitKind::Scout))?;
                Ok(QuantityMap::single(scout.id, *quantity)?)
            }
            DispatchRequest::Occupy => {
                let settler = self
                    .catalog
                    .of_kind(UnitKind::Settler)
                    .ok_or(DispatchError::MissingUnitKind(UnitKind::Settler))?;
                Ok(QuantityMap::single(settler.id, self.settler_count)?)
            }
            DispatchRequest::Attack { quantities }
            | DispatchRequest::Support { quantities }
            | DispatchRequest::Transport { quantities, .. } => Ok(quantities.clone()),
        }
    }

    /// Look up every unit and check it may join `movement_type`.
    fn eligible_units(
        &self,
        quantities: &QuantityMap,
        movement_type: MovementType,
    ) -> Result<Vec<&Unit>, DispatchError> {
        quantities
            .units()
            .map(|id| {
                let unit = self.catalog.get(id).ok_or(DispatchError::UnknownUnit(id))?;
                if movement_type.accepts(unit.kind) {
                    Ok(unit)
                } else {
                    Err(DispatchError::IneligibleUnitType {
                        unit: id,
                        kind: unit.kind,
                        movement_type,
                    })
                }
            })
            .collect()
    }

    fn check_target(
        &self,
        actor: &Actor,
        target: &Planet,
        movement_type: MovementType,
    ) -> Result<(), DispatchError> {
        match movement_type {
            MovementType::Occupy => {
                if target.is_owned_by(actor.player) {
                    return Err(invalid(target.id, TargetRejection::AlreadyOwned));
                }
                if !self.policy.can_occupy(actor, target) {
                    return Err(invalid(target.id, TargetRejection::CannotOccupy));
                }
                Ok(())
            }
            MovementType::Support | MovementType::Transport => {
                if self.policy.is_friendly(actor, target) {
                    Ok(())
                } else {
                    Err(invalid(target.id, TargetRejection::NotFriendly))
                }
            }
            MovementType::Scout | MovementType::Attack | MovementType::Return => Ok(()),
        }
    }
}

const fn invalid(planet: PlanetId, reason: TargetRejection) -> DispatchError {
    DispatchError::InvalidTarget { planet, reason }
}

/// Drop zero entries and check the total against carrying capacity.
fn check_cargo(
    cargo: &ResourceAmounts,
    quantities: &QuantityMap,
    units: &[&Unit],
) -> Result<ResourceAmounts, DispatchError> {
    let loaded: ResourceAmounts = cargo
        .iter()
        .filter(|(_, amount)| **amount > 0)
        .map(|(resource, amount)| (*resource, *amount))
        .collect();
    let requested = loaded
        .values()
        .try_fold(0u64, |acc, v| acc.checked_add(*v))
        .ok_or(DispatchError::Ledger(LedgerError::Overflow))?;
    let capacity = carrying_capacity(units.iter().map(|u| (quantities.get(u.id), *u)))
        .ok_or(DispatchError::Ledger(LedgerError::Overflow))?;
    if requested > capacity {
        return Err(DispatchError::CargoExceedsCapacity {
            requested,
            capacity,
        });
    }
    Ok(loaded)
}

/// `sum(quantity * capacity)`, `None` on overflow.
pub(crate) fn carrying_capacity<'a>(
    stacks: impl IntoIterator<Item = (u64, &'a Unit)>,
) -> Option<u64> {
    stacks.into_iter().try_fold(0u64, |acc, (quantity, unit)| {
        quantity
            .checked_mul(u64::from(unit.capacity))
            .and_then(|v| acc.checked_add(v))
    })
}

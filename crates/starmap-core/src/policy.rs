//! Authorization rules consumed by the engine.
//!
//! Whether a planet counts as hostile or friendly, and whether it may be
//! occupied, is game policy rather than movement mechanics. The engine
//! asks a [`GamePolicy`] at dispatch time and asks again at resolution,
//! when the answer may have changed.

use serde::{Deserialize, Serialize};
use starmap_types::{Planet, PlanetId, PlayerId};

/// The acting player together with their active planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// The authenticated player.
    pub player: PlayerId,
    /// The planet the player is acting from.
    pub planet: PlanetId,
}

impl Actor {
    /// Create an actor.
    pub const fn new(player: PlayerId, planet: PlanetId) -> Self {
        Self { player, planet }
    }
}

/// Authorization predicates about a planet from an actor's point of view.
pub trait GamePolicy: Send + Sync {
    /// Whether the actor may scout or attack `planet`.
    fn is_hostile(&self, actor: &Actor, planet: &Planet) -> bool;

    /// Whether the actor may support or supply `planet`.
    fn is_friendly(&self, actor: &Actor, planet: &Planet) -> bool;

    /// Whether the actor may take ownership of `planet`.
    fn can_occupy(&self, actor: &Actor, planet: &Planet) -> bool;
}

/// Ownership-only policy: a planet is friendly when the actor owns it,
/// hostile otherwise, and can be occupied while nobody owns it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipPolicy;

impl GamePolicy for OwnershipPolicy {
    fn is_hostile(&self, actor: &Actor, planet: &Planet) -> bool {
        !planet.is_owned_by(actor.player)
    }

    fn is_friendly(&self, actor: &Actor, planet: &Planet) -> bool {
        planet.is_owned_by(actor.player)
    }

    fn can_occupy(&self, _actor: &Actor, planet: &Planet) -> bool {
        planet.owner.is_none()
    }
}

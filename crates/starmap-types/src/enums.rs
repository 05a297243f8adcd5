//! Enumeration types for the Starmap movement engine.
//!
//! Unit kinds, movement types and states, resources, and the ledger
//! classification enums. Database string forms are provided by
//! [`MovementType::as_str`] and friends so that the store and the wire
//! format agree.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// The role of a unit type. Dispatch eligibility is decided per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum UnitKind {
    /// Fast, fragile reconnaissance unit.
    Scout,
    /// Light combat unit.
    Fighter,
    /// Heavy combat unit.
    HeavyFighter,
    /// Siege unit; combat-capable but not part of attack waves.
    Bomber,
    /// Cargo carrier.
    Transporter,
    /// Colonists consumed when a planet is occupied.
    Settler,
}

impl UnitKind {
    /// Whether the unit can fight (and therefore reinforce a friendly planet).
    pub const fn is_combat(self) -> bool {
        matches!(self, Self::Fighter | Self::HeavyFighter | Self::Bomber)
    }

    /// Database string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scout => "scout",
            Self::Fighter => "fighter",
            Self::HeavyFighter => "heavy_fighter",
            Self::Bomber => "bomber",
            Self::Transporter => "transporter",
            Self::Settler => "settler",
        }
    }

    /// Parse the database string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scout" => Some(Self::Scout),
            "fighter" => Some(Self::Fighter),
            "heavy_fighter" => Some(Self::HeavyFighter),
            "bomber" => Some(Self::Bomber),
            "transporter" => Some(Self::Transporter),
            "settler" => Some(Self::Settler),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Movements
// ---------------------------------------------------------------------------

/// The kind of a movement. Resolution is selected by this tag.
///
/// [`MovementType::Return`] is never dispatched by a player; it is the
/// homebound leg scheduled by the resolver for surviving units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MovementType {
    /// Gather intelligence on the destination.
    Scout,
    /// Fight the destination's defenders.
    Attack,
    /// Colonize the destination with settlers.
    Occupy,
    /// Reinforce a friendly planet.
    Support,
    /// Deliver cargo to a friendly planet.
    Transport,
    /// Bring surviving units (and cargo) back to their origin.
    Return,
}

impl MovementType {
    /// Whether a unit of `kind` may take part in a dispatch of this type.
    pub const fn accepts(self, kind: UnitKind) -> bool {
        match self {
            Self::Scout => matches!(kind, UnitKind::Scout),
            Self::Attack => matches!(kind, UnitKind::Fighter | UnitKind::HeavyFighter),
            Self::Occupy => matches!(kind, UnitKind::Settler),
            Self::Support => kind.is_combat(),
            Self::Transport => matches!(kind, UnitKind::Transporter),
            Self::Return => true,
        }
    }

    /// Database string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scout => "scout",
            Self::Attack => "attack",
            Self::Occupy => "occupy",
            Self::Support => "support",
            Self::Transport => "transport",
            Self::Return => "return",
        }
    }

    /// Parse the database string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scout" => Some(Self::Scout),
            "attack" => Some(Self::Attack),
            "occupy" => Some(Self::Occupy),
            "support" => Some(Self::Support),
            "transport" => Some(Self::Transport),
            "return" => Some(Self::Return),
            _ => None,
        }
    }
}

/// Lifecycle state of a persisted movement.
///
/// A movement is written `EnRoute` in the same unit of work that reserves
/// its units and leaves that state exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MovementState {
    /// Travelling; waiting for its arrival time.
    EnRoute,
    /// Terminal; effects have been applied.
    Resolved,
}

impl MovementState {
    /// Database string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnRoute => "en_route",
            Self::Resolved => "resolved",
        }
    }

    /// Parse the database string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "en_route" => Some(Self::EnRoute),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// Why a precondition that held at dispatch time failed at resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum StaleReason {
    /// The destination is already held by the dispatching player.
    AlreadyOwned,
    /// The occupation policy no longer allows taking the planet.
    OccupationDenied,
    /// The destination is no longer friendly to the dispatcher.
    NoLongerFriendly,
    /// The origin changed hands while the units were away.
    OriginLost,
    /// Resolution failed deterministically; the units were recalled.
    Unresolvable,
}

impl StaleReason {
    /// Snake-case string form, as serialized.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyOwned => "already_owned",
            Self::OccupationDenied => "occupation_denied",
            Self::NoLongerFriendly => "no_longer_friendly",
            Self::OriginLost => "origin_lost",
            Self::Unresolvable => "unresolvable",
        }
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// A stockpiled resource carried by transports and plundered by attacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Resource {
    /// Power reserves.
    Energy,
    /// Structural metal.
    Metal,
    /// Rare crystal.
    Crystal,
}

impl Resource {
    /// All resources, in plunder order.
    pub const ALL: [Self; 3] = [Self::Energy, Self::Metal, Self::Crystal];

    /// Database string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Energy => "energy",
            Self::Metal => "metal",
            Self::Crystal => "crystal",
        }
    }

    /// Parse the database string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "energy" => Some(Self::Energy),
            "metal" => Some(Self::Metal),
            "crystal" => Some(Self::Crystal),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Category of a ledger entry.
///
/// | Type | From | To |
/// |------|------|----|
/// | Dispatch | Planet | Movement |
/// | CargoLoad | Planet | Movement |
/// | Plunder | Planet | Movement |
/// | Handoff | Movement | Movement |
/// | Return | Movement | Planet |
/// | Reinforce | Movement | Planet |
/// | CargoUnload | Movement | Planet |
/// | Casualty | Movement or Planet | Void |
/// | Consume | Movement | Void |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LedgerEntryType {
    /// Units reserved from a planet into a departing movement.
    Dispatch,
    /// Resources loaded from a planet's stock into a transport.
    CargoLoad,
    /// Resources taken from a defeated planet by attack survivors.
    Plunder,
    /// Units and cargo passed from an arriving movement to its return leg.
    Handoff,
    /// Units credited back to their origin at the end of a return leg.
    Return,
    /// Units credited to a friendly planet by a support movement.
    Reinforce,
    /// Cargo credited to a destination stock.
    CargoUnload,
    /// Units destroyed in combat or lost with their origin.
    Casualty,
    /// Settlers consumed by an occupation attempt.
    Consume,
}

impl LedgerEntryType {
    /// Database string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::CargoLoad => "cargo_load",
            Self::Plunder => "plunder",
            Self::Handoff => "handoff",
            Self::Return => "return",
            Self::Reinforce => "reinforce",
            Self::CargoUnload => "cargo_unload",
            Self::Casualty => "casualty",
            Self::Consume => "consume",
        }
    }

    /// Parse the database string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dispatch" => Some(Self::Dispatch),
            "cargo_load" => Some(Self::CargoLoad),
            "plunder" => Some(Self::Plunder),
            "handoff" => Some(Self::Handoff),
            "return" => Some(Self::Return),
            "reinforce" => Some(Self::Reinforce),
            "cargo_unload" => Some(Self::CargoUnload),
            "casualty" => Some(Self::Casualty),
            "consume" => Some(Self::Consume),
            _ => None,
        }
    }
}

/// The kind of entity on either side of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EntityType {
    /// A planet's population rows or resource stock.
    Planet,
    /// A movement in flight.
    Movement,
    /// Permanent removal.
    Void,
}

impl EntityType {
    /// Database string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planet => "planet",
            Self::Movement => "movement",
            Self::Void => "void",
        }
    }

    /// Parse the database string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "planet" => Some(Self::Planet),
            "movement" => Some(Self::Movement),
            "void" => Some(Self::Void),
            _ => None,
        }
    }
}

//! Quantity ledger and transfer journal for the Starmap movement engine.
//!
//! Every unit and resource that leaves a planet is tracked through this
//! crate. Units are never created from nothing and never vanish silently:
//! they are debited from a population into a movement, and leave the
//! movement again by returning home, reinforcing a planet, or being
//! destroyed (casualty, consumed settlers). The balance is verified per
//! movement once it resolves.
//!
//! # Architecture
//!
//! - [`quantity`] -- The [`QuantityLedger`]: population rows with the atomic
//!   check-and-decrement `reserve`, plus resource stock helpers.
//! - [`journal`] -- The [`Journal`]: append-only log with recording methods.
//! - [`transaction`] -- The [`TransactionBuilder`] for validated entry construction.
//! - [`conservation`] -- Per-movement balance verification.
//!
//! # Entry types
//!
//! | Type | From (debit) | To (credit) |
//! |------|-------------|-------------|
//! | Dispatch, CargoLoad, Plunder | Planet | Movement |
//! | Handoff | Movement | Movement |
//! | Return, Reinforce, CargoUnload | Movement | Planet |
//! | Casualty | Movement or Planet | Void |
//! | Consume | Movement | Void |
//!
//! # Usage
//!
//! ```
//! use starmap_ledger::{Journal, QuantityLedger};
//! use starmap_ledger::conservation::ConservationResult;
//! use starmap_types::{MovementId, PlanetId, PlayerId, UnitId};
//!
//! let mut ledger = QuantityLedger::new();
//! let mut journal = Journal::new();
//! let planet = PlanetId::new();
//! let player = PlayerId::new();
//! let scout = UnitId::from_u128(1);
//! let movement = MovementId::new();
//!
//! ledger.credit(planet, scout, player, 50).ok();
//! assert!(ledger.reserve(planet, scout, player, 60).is_err());
//! assert!(ledger.reserve(planet, scout, player, 30).is_ok());
//! assert_eq!(ledger.quantity(planet, scout, player), 20);
//!
//! journal.record_dispatch(movement, player, scout, 30, planet).ok();
//! journal.record_return(movement, player, scout, 30, planet).ok();
//! assert_eq!(journal.verify_movement(movement), ConservationResult::Balanced);
//! ```

pub mod conservation;
pub mod journal;
pub mod quantity;
pub mod transaction;

// Re-export primary types at crate root.
pub use conservation::ConservationResult;
pub use journal::Journal;
pub use quantity::QuantityLedger;
pub use transaction::TransactionBuilder;

use std::collections::BTreeMap;

use starmap_types::{Asset, EntityType, LedgerEntryType, MovementId, Resource, UnitId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when reserving quantities or recording entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Not enough units of a type are available for the reservation.
    #[error("insufficient quantity of unit {unit}: requested {requested}, available {available}")]
    InsufficientQuantity {
        /// The unit type requested.
        unit: UnitId,
        /// Units requested.
        requested: u64,
        /// Units available at the time of the check.
        available: u64,
    },

    /// Not enough of a resource is stockpiled.
    #[error("insufficient {resource:?}: requested {requested}, available {available}")]
    InsufficientResource {
        /// The resource requested.
        resource: Resource,
        /// Amount requested.
        requested: u64,
        /// Amount available.
        available: u64,
    },

    /// Quantity must be strictly positive.
    #[error("ledger entry quantity must be non-zero")]
    ZeroQuantity,

    /// A quantity would overflow `u64`.
    #[error("quantity overflow")]
    Overflow,

    /// A required field was not set on the builder.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The from/to entity types do not match the expected types for the
    /// entry type.
    #[error("invalid entity type for {entry_type:?} {side}: got {actual:?}")]
    InvalidEntityType {
        /// The entry type being validated.
        entry_type: LedgerEntryType,
        /// Which side of the entry ("from" or "to").
        side: &'static str,
        /// The entity type that was supplied.
        actual: Option<EntityType>,
    },
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A conservation violation detected for a resolved movement.
///
/// Raised when what flowed into a movement (dispatch, cargo load, plunder,
/// handoff in) differs from what flowed out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// The movement whose books do not balance.
    pub movement_id: MovementId,
    /// Per-asset imbalance: (`inflow_total`, `outflow_total`).
    pub imbalances: BTreeMap<Asset, (u64, u64)>,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}

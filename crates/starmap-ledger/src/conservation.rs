//! Conservation verification for resolved movements.
//!
//! A movement is a container: units and resources flow into it when it is
//! dispatched (or when it plunders, or when a parent hands survivors to a
//! return leg) and flow out of it when it resolves. Once resolved, a
//! movement must be empty. For every asset A of movement M:
//!
//! ```text
//! sum(entries with to_entity == M and asset A)
//!     == sum(entries with from_entity == M and asset A)
//! ```
//!
//! Entries recorded for M that debit a planet straight into the void
//! (defender casualties) never touch the container and are ignored.
//!
//! A violation produces a [`LedgerAnomaly`].

use std::collections::{BTreeMap, BTreeSet};

use starmap_types::{Asset, EntityType, LedgerEntry, MovementId};

use crate::LedgerAnomaly;

/// The result of a conservation check for a single movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// Everything the movement took was released.
    Balanced,
    /// One or more assets have imbalanced flows.
    Anomaly(LedgerAnomaly),
}

impl ConservationResult {
    /// Whether the check passed.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Verify that `movement` released exactly what it took.
///
/// Entries of other movements are skipped, so the full journal may be
/// passed in. Entries are matched on the container UUID, which means a
/// handoff counts as outflow for the parent and inflow for the return leg.
pub fn verify_movement(movement: MovementId, entries: &[LedgerEntry]) -> ConservationResult {
    let container = movement.into_inner();
    let mut inflow: BTreeMap<Asset, u64> = BTreeMap::new();
    let mut outflow: BTreeMap<Asset, u64> = BTreeMap::new();

    for entry in entries {
        if entry.to_entity_type == EntityType::Movement && entry.to_entity == container {
            let total = inflow.entry(entry.asset).or_insert(0);
            *total = match total.checked_add(entry.quantity) {
                Some(val) => val,
                None => return overflow_anomaly(movement, entry.asset),
            };
        }
        if entry.from_entity_type == EntityType::Movement && entry.from_entity == container {
            let total = outflow.entry(entry.asset).or_insert(0);
            *total = match total.checked_add(entry.quantity) {
                Some(val) => val,
                None => return overflow_anomaly(movement, entry.asset),
            };
        }
    }

    let all_assets: BTreeSet<Asset> = inflow.keys().chain(outflow.keys()).copied().collect();

    let mut imbalances: BTreeMap<Asset, (u64, u64)> = BTreeMap::new();
    for asset in &all_assets {
        let total_in = inflow.get(asset).copied().unwrap_or(0);
        let total_out = outflow.get(asset).copied().unwrap_or(0);
        if total_in != total_out {
            imbalances.insert(*asset, (total_in, total_out));
        }
    }

    if imbalances.is_empty() {
        ConservationResult::Balanced
    } else {
        let count = imbalances.len();
        ConservationResult::Anomaly(LedgerAnomaly {
            movement_id: movement,
            imbalances,
            message: format!(
                "LEDGER_ANOMALY for movement {movement}: \
                 conservation violated for {count} asset(s)",
            ),
        })
    }
}

/// Construct an anomaly result for arithmetic overflow during summation.
fn overflow_anomaly(movement: MovementId, asset: Asset) -> ConservationResult {
    let mut imbalances = BTreeMap::new();
    imbalances.insert(asset, (0, 0));
    ConservationResult::Anomaly(LedgerAnomaly {
        movement_id: movement,
        imbalances,
        message: format!(
            "LEDGER_ANOMALY for movement {movement}: arithmetic overflow while summing {asset:?}",
        ),
    })
}

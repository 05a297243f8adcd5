//! Shared type definitions for the Starmap movement engine.
//!
//! This crate is the single source of truth for all types used across the
//! Starmap workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the browser client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Unit kinds, movement types and states, resources, ledger kinds
//! - [`quantities`] -- The validated unit-to-amount [`QuantityMap`]
//! - [`structs`] -- Planets, units, populations, movements, reports, ledger entries

pub mod enums;
pub mod ids;
pub mod quantities;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    EntityType, LedgerEntryType, MovementState, MovementType, Resource, StaleReason, UnitKind,
};
pub use ids::{LedgerEntryId, MovementId, PlanetId, PlayerId, PopulationId, ReportId, UnitId};
pub use quantities::{QuantityError, QuantityMap, ResourceAmounts, UnitCounts};
pub use structs::{
    Asset, LedgerEntry, Movement, MovementOutcome, Planet, Population, PopulationSighting, Report,
    ReportBody, Unit,
};

#[cfg(test)]
mod tests {
    //! Integration tests for type exports and `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are used. The files are written to the `bindings/`
        // directory relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::PlayerId::export_all();
        let _ = crate::ids::PlanetId::export_all();
        let _ = crate::ids::UnitId::export_all();
        let _ = crate::ids::PopulationId::export_all();
        let _ = crate::ids::MovementId::export_all();
        let _ = crate::ids::ReportId::export_all();
        let _ = crate::ids::LedgerEntryId::export_all();

        // Enums
        let _ = crate::enums::UnitKind::export_all();
        let _ = crate::enums::MovementType::export_all();
        let _ = crate::enums::MovementState::export_all();
        let _ = crate::enums::StaleReason::export_all();
        let _ = crate::enums::Resource::export_all();
        let _ = crate::enums::LedgerEntryType::export_all();
        let _ = crate::enums::EntityType::export_all();

        // Structs
        let _ = crate::quantities::QuantityMap::export_all();
        let _ = crate::structs::Unit::export_all();
        let _ = crate::structs::Planet::export_all();
        let _ = crate::structs::Population::export_all();
        let _ = crate::structs::Movement::export_all();
        let _ = crate::structs::MovementOutcome::export_all();
        let _ = crate::structs::Report::export_all();
        let _ = crate::structs::ReportBody::export_all();
        let _ = crate::structs::PopulationSighting::export_all();
        let _ = crate::structs::Asset::export_all();
        let _ = crate::structs::LedgerEntry::export_all();
    }
}

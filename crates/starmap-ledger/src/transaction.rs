//! Transaction builders and validation for the transfer journal.
//!
//! Provides a [`TransactionBuilder`] that enforces the double-entry
//! invariant: every transfer names a source entity (debit) and a
//! destination entity (credit) whose types fit the entry type. Builders
//! validate inputs before producing a [`LedgerEntry`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

use starmap_types::{
    Asset, EntityType, LedgerEntry, LedgerEntryId, LedgerEntryType, MovementId, PlayerId,
};

use crate::LedgerError;

// ---------------------------------------------------------------------------
// Transaction builder
// ---------------------------------------------------------------------------

/// Builder for constructing validated [`LedgerEntry`] values.
///
/// # Examples
///
/// ```
/// use starmap_ledger::TransactionBuilder;
/// use starmap_types::{Asset, EntityType, LedgerEntryType, MovementId, PlayerId, UnitId};
/// use uuid::Uuid;
///
/// let movement = MovementId::new();
/// let fighter = Asset::Unit(UnitId::from_u128(1));
/// let entry = TransactionBuilder::new(movement, LedgerEntryType::Dispatch, fighter)
///     .owner(PlayerId::new())
///     .from(Uuid::now_v7(), EntityType::Planet)
///     .to(movement.into_inner(), EntityType::Movement)
///     .quantity(30)
///     .build();
///
/// assert!(entry.is_ok());
/// ```
#[derive(Debug)]
pub struct TransactionBuilder {
    movement_id: MovementId,
    entry_type: LedgerEntryType,
    asset: Asset,
    owner: Option<PlayerId>,
    from_entity: Option<Uuid>,
    from_entity_type: Option<EntityType>,
    to_entity: Option<Uuid>,
    to_entity_type: Option<EntityType>,
    quantity: Option<u64>,
    created_at: Option<DateTime<Utc>>,
}

impl TransactionBuilder {
    /// Start building a ledger entry for the given movement, entry type,
    /// and asset.
    pub const fn new(movement_id: MovementId, entry_type: LedgerEntryType, asset: Asset) -> Self {
        Self {
            movement_id,
            entry_type,
            asset,
            owner: None,
            from_entity: None,
            from_entity_type: None,
            to_entity: None,
            to_entity_type: None,
            quantity: None,
            created_at: None,
        }
    }

    /// Set the player who owns the transferred asset.
    #[must_use]
    pub const fn owner(mut self, owner: PlayerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Set the source entity (debit side).
    #[must_use]
    pub const fn from(mut self, entity: Uuid, entity_type: EntityType) -> Self {
        self.from_entity = Some(entity);
        self.from_entity_type = Some(entity_type);
        self
    }

    /// Set the destination entity (credit side).
    #[must_use]
    pub const fn to(mut self, entity: Uuid, entity_type: EntityType) -> Self {
        self.to_entity = Some(entity);
        self.to_entity_type = Some(entity_type);
        self
    }

    /// Send the asset to the void (permanent removal).
    #[must_use]
    pub const fn to_void(self) -> Self {
        self.to(Uuid::nil(), EntityType::Void)
    }

    /// Set the quantity transferred.
    #[must_use]
    pub const fn quantity(mut self, qty: u64) -> Self {
        self.quantity = Some(qty);
        self
    }

    /// Override the timestamp (defaults to now).
    #[must_use]
    pub const fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Validate inputs and produce a [`LedgerEntry`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroQuantity`] if the quantity is zero.
    /// Returns [`LedgerError::MissingField`] if required fields are not set.
    /// Returns [`LedgerError::InvalidEntityType`] if the from/to entity types
    /// do not match the expected types for the entry type.
    pub fn build(self) -> Result<LedgerEntry, LedgerError> {
        let quantity = self.quantity.ok_or(LedgerError::MissingField("quantity"))?;
        let owner = self.owner.ok_or(LedgerError::MissingField("owner"))?;

        if quantity == 0 {
            return Err(LedgerError::ZeroQuantity);
        }

        validate_entity_types(self.entry_type, self.from_entity_type, self.to_entity_type)?;

        let from_entity = self.from_entity.ok_or(LedgerError::MissingField("from_entity"))?;
        let from_entity_type = self
            .from_entity_type
            .ok_or(LedgerError::MissingField("from_entity_type"))?;
        let to_entity = self.to_entity.ok_or(LedgerError::MissingField("to_entity"))?;
        let to_entity_type = self
            .to_entity_type
            .ok_or(LedgerError::MissingField("to_entity_type"))?;

        Ok(LedgerEntry {
            id: LedgerEntryId::new(),
            movement_id: self.movement_id,
            owner,
            entry_type: self.entry_type,
            asset: self.asset,
            quantity,
            from_entity,
            from_entity_type,
            to_entity,
            to_entity_type,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Validate that the from/to entity types match the contract for the
/// given [`LedgerEntryType`].
fn validate_entity_types(
    entry_type: LedgerEntryType,
    from_type: Option<EntityType>,
    to_type: Option<EntityType>,
) -> Result<(), LedgerError> {
    let (allowed_from, expected_to) = expected_entity_types(entry_type);

    if !from_type.is_some_and(|t| allowed_from.contains(&t)) {
        return Err(LedgerError::InvalidEntityType {
            entry_type,
            side: "from",
            actual: from_type,
        });
    }

    if to_type != Some(expected_to) {
        return Err(LedgerError::InvalidEntityType {
            entry_type,
            side: "to",
            actual: to_type,
        });
    }

    Ok(())
}

/// Return the allowed source types and the expected destination type for
/// each [`LedgerEntryType`].
const fn expected_entity_types(entry_type: LedgerEntryType) -> (&'static [EntityType], EntityType) {
    match entry_type {
        LedgerEntryType::Dispatch | LedgerEntryType::CargoLoad | LedgerEntryType::Plunder => {
            (&[EntityType::Planet], EntityType::Movement)
        }
        LedgerEntryType::Handoff => (&[EntityType::Movement], EntityType::Movement),
        LedgerEntryType::Return | LedgerEntryType::Reinforce | LedgerEntryType::CargoUnload => {
            (&[EntityType::Movement], EntityType::Planet)
        }
        LedgerEntryType::Casualty => {
            (&[EntityType::Movement, EntityType::Planet], EntityType::Void)
        }
        LedgerEntryType::Consume => (&[EntityType::Movement], EntityType::Void),
    }
}

#[cfg(test)]
mod tests {
    use starmap_types::{Resource, UnitId};

    use super::*;

    fn dispatch(movement: MovementId) -> TransactionBuilder {
        TransactionBuilder::new(
            movement,
            LedgerEntryType::Dispatch,
            Asset::Unit(UnitId::from_u128(1)),
        )
        .owner(PlayerId::new())
        .from(Uuid::now_v7(), EntityType::Planet)
        .to(movement.into_inner(), EntityType::Movement)
    }

    #[test]
    fn builder_produces_valid_entry() {
        let movement = MovementId::new();
        let result = dispatch(movement).quantity(5).build();

        assert!(result.is_ok());
        if let Ok(e) = result {
            assert_eq!(e.movement_id, movement);
            assert_eq!(e.entry_type, LedgerEntryType::Dispatch);
            assert_eq!(e.quantity, 5);
            assert_eq!(e.to_entity, movement.into_inner());
        }
    }

    #[test]
    fn zero_quantity_rejected() {
        let result = dispatch(MovementId::new()).quantity(0).build();
        assert!(matches!(result, Err(LedgerError::ZeroQuantity)));
    }

    #[test]
    fn missing_quantity_rejected() {
        let result = dispatch(MovementId::new()).build();
        assert!(matches!(result, Err(LedgerError::MissingField("quantity"))));
    }

    #[test]
    fn wrong_entity_type_rejected() {
        // Dispatch expects Planet->Movement, not Movement->Movement.
        let movement = MovementId::new();
        let result = TransactionBuilder::new(
            movement,
            LedgerEntryType::Dispatch,
            Asset::Resource(Resource::Metal),
        )
        .owner(PlayerId::new())
        .from(Uuid::now_v7(), EntityType::Movement)
        .to(movement.into_inner(), EntityType::Movement)
        .quantity(3)
        .build();

        assert!(matches!(
            result,
            Err(LedgerError::InvalidEntityType { side: "from", .. })
        ));
    }

    #[test]
    fn casualty_accepts_both_sources() {
        for source in [EntityType::Movement, EntityType::Planet] {
            let result = TransactionBuilder::new(
                MovementId::new(),
                LedgerEntryType::Casualty,
                Asset::Unit(UnitId::from_u128(2)),
            )
            .owner(PlayerId::new())
            .from(Uuid::now_v7(), source)
            .to_void()
            .quantity(1)
            .build();
            assert!(result.is_ok(), "casualty from {source:?} rejected");
        }
    }

    #[test]
    fn all_entry_types_have_valid_entity_mappings() {
        let all_types = [
            LedgerEntryType::Dispatch,
            LedgerEntryType::CargoLoad,
            LedgerEntryType::Plunder,
            LedgerEntryType::Handoff,
            LedgerEntryType::Return,
            LedgerEntryType::Reinforce,
            LedgerEntryType::CargoUnload,
            LedgerEntryType::Casualty,
            LedgerEntryType::Consume,
        ];

        for entry_type in all_types {
            let (from, _) = expected_entity_types(entry_type);
            assert!(!from.is_empty(), "entry type {entry_type:?} has no source");
        }
    }
}

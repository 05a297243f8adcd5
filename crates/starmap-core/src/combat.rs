//! Battle resolution between an arriving attack and a planet's garrison.
//!
//! The resolver hands both force lists to a [`CombatModel`] and applies the
//! returned casualties. Models must be deterministic: the same forces
//! always produce the same outcome.
//!
//! ## Attrition model
//!
//! [`AttritionCombat`] compares total strength:
//!
//! ```text
//! A = sum(quantity * attack)   over attacking stacks
//! D = sum(quantity * defense)  over defending stacks
//! ```
//!
//! - **A > D**: the attacker wins. Every defending stack is destroyed and
//!   each attacking stack loses `ceil(quantity * D / A)` units.
//! - **A <= D**: the defender wins (ties go to the defender). Every
//!   attacking stack is destroyed and each defending stack loses
//!   `ceil(quantity * A / D)` units.
//! - **D = 0**: the attacker wins without losses.
//!
//! Strength is summed in `u128`, so no garrison or fleet size can make a
//! battle fail to resolve.

use starmap_types::{PlayerId, Unit, UnitCounts, UnitId};

/// Errors raised by a combat model.
///
/// [`AttritionCombat`] never fails; other models may.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CombatError {
    /// Strength totals exceeded the numeric range.
    #[error("combat strength overflow")]
    Overflow,
    /// The model rejected the forces it was given.
    #[error("invalid forces: {0}")]
    InvalidForces(String),
}

/// One side's units of a single type and owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    /// Controlling player.
    pub owner: PlayerId,
    /// Unit attributes.
    pub unit: Unit,
    /// Units present.
    pub quantity: u64,
}

/// Losses suffered by one [`Stack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLoss {
    /// Controlling player.
    pub owner: PlayerId,
    /// Unit type.
    pub unit_id: UnitId,
    /// Units destroyed.
    pub lost: u64,
    /// Units left standing.
    pub survivors: u64,
}

/// Result of one battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleOutcome {
    /// Whether the attacking side won.
    pub attacker_won: bool,
    /// Per-stack attacker losses, in input order.
    pub attacker_losses: Vec<StackLoss>,
    /// Per-stack defender losses, in input order.
    pub defender_losses: Vec<StackLoss>,
}

impl BattleOutcome {
    /// Surviving attackers per unit type, zeros dropped.
    pub fn attacker_survivors(&self) -> UnitCounts {
        sum_by_unit(&self.attacker_losses, |l| l.survivors)
    }

    /// Attacker losses per unit type.
    pub fn attacker_losses_by_unit(&self) -> UnitCounts {
        sum_by_unit(&self.attacker_losses, |l| l.lost)
    }

    /// Defender losses per unit type, summed across owners.
    pub fn defender_losses_by_unit(&self) -> UnitCounts {
        sum_by_unit(&self.defender_losses, |l| l.lost)
    }
}

/// A deterministic battle model.
pub trait CombatModel: Send + Sync {
    /// Fight `attackers` against `defenders` and report casualties.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError`] if the model cannot evaluate the forces.
    fn fight(&self, attackers: &[Stack], defenders: &[Stack]) -> Result<BattleOutcome, CombatError>;
}

/// Proportional attrition on total attack versus total defense.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttritionCombat;

impl CombatModel for AttritionCombat {
    fn fight(
        &self,
        attackers: &[Stack],
        defenders: &[Stack],
    ) -> Result<BattleOutcome, CombatError> {
        let attack = strength(attackers, |u| u.attack);
        let defense = strength(defenders, |u| u.defense);

        if defense == 0 {
            return Ok(BattleOutcome {
                attacker_won: true,
                attacker_losses: untouched(attackers),
                defender_losses: wiped_out(defenders),
            });
        }

        if attack > defense {
            Ok(BattleOutcome {
                attacker_won: true,
                attacker_losses: attrition(attackers, defense, attack),
                defender_losses: wiped_out(defenders),
            })
        } else {
            Ok(BattleOutcome {
                attacker_won: false,
                attacker_losses: wiped_out(attackers),
                defender_losses: attrition(defenders, attack, defense),
            })
        }
    }
}

/// Sum of `quantity * stat` across stacks.
///
/// A single stack is at most `u64::MAX * u32::MAX`, well inside `u128`; the
/// total saturates rather than failing.
fn strength(stacks: &[Stack], stat: impl Fn(&Unit) -> u32) -> u128 {
    stacks.iter().fold(0, |acc: u128, s| {
        acc.saturating_add(u128::from(s.quantity).saturating_mul(u128::from(stat(&s.unit))))
    })
}

/// Each stack loses `ceil(quantity * enemy / own)`, capped at its size.
fn attrition(stacks: &[Stack], enemy: u128, own: u128) -> Vec<StackLoss> {
    stacks
        .iter()
        .map(|s| {
            let lost = proportional_loss(s.quantity, enemy, own);
            StackLoss {
                owner: s.owner,
                unit_id: s.unit.id,
                lost,
                survivors: s.quantity.saturating_sub(lost),
            }
        })
        .collect()
}

/// `ceil(quantity * enemy / own)` for `0 < enemy <= own`, in `1..=quantity`.
///
/// Exact while `quantity * enemy` fits in `u128`. Past that, both strengths
/// are shifted right until `own` fits in 64 bits, which keeps 63
/// significant bits of the ratio and puts the result within one unit.
fn proportional_loss(quantity: u64, enemy: u128, own: u128) -> u64 {
    if quantity == 0 || enemy == 0 {
        return 0;
    }
    let wide = u128::from(quantity);
    let (enemy, own) = if wide.checked_mul(enemy).is_some() {
        (enemy, own)
    } else {
        let shift = u128::BITS.saturating_sub(own.leading_zeros()).saturating_sub(64);
        (
            enemy.checked_shr(shift).unwrap_or(0),
            own.checked_shr(shift).unwrap_or(0),
        )
    };
    let lost = ceil_div(wide.saturating_mul(enemy), own).unwrap_or(wide);
    u64::try_from(lost).unwrap_or(quantity).clamp(1, quantity)
}

fn ceil_div(numerator: u128, denominator: u128) -> Option<u128> {
    let quotient = numerator.checked_div(denominator)?;
    let remainder = numerator.checked_rem(denominator)?;
    Some(if remainder > 0 {
        quotient.saturating_add(1)
    } else {
        quotient
    })
}

fn wiped_out(stacks: &[Stack]) -> Vec<StackLoss> {
    stacks
        .iter()
        .map(|s| StackLoss {
            owner: s.owner,
            unit_id: s.unit.id,
            lost: s.quantity,
            survivors: 0,
        })
        .collect()
}

fn untouched(stacks: &[Stack]) -> Vec<StackLoss> {
    stacks
        .iter()
        .map(|s| StackLoss {
            owner: s.owner,
            unit_id: s.unit.id,
            lost: 0,
            survivors: s.quantity,
        })
        .collect()
}

fn sum_by_unit(losses: &[StackLoss], pick: impl Fn(&StackLoss) -> u64) -> UnitCounts {
    let mut counts = UnitCounts::new();
    for loss in losses {
        let value = pick(loss);
        if value == 0 {
            continue;
        }
        let entry = counts.entry(loss.unit_id).or_insert(0);
        *entry = entry.saturating_add(value);
    }
    counts
}

//! Travel time between planets.
//!
//! All arithmetic is integer and checked, so the same inputs always give
//! the same duration:
//!
//! ```text
//! distance = ceil(sqrt(dx^2 + dy^2))
//! seconds  = ceil(ceil(distance * seconds_per_distance / speed) / speed_factor)
//! seconds  = max(seconds, min_travel_seconds)
//! ```
//!
//! A group travels at the speed of its slowest member. Each step is
//! monotonic, so for a fixed speed a longer trip never arrives earlier.

use chrono::{DateTime, TimeDelta, Utc};
use starmap_types::{Planet, Unit, UnitId};

use crate::config::TravelConfig;

/// Errors raised while computing travel time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TravelError {
    /// No unit was given to derive a speed from.
    #[error("cannot compute travel time for an empty group")]
    EmptyGroup,

    /// A unit with speed zero can never arrive.
    #[error("unit {0} has zero speed")]
    ZeroSpeed(UnitId),

    /// A trip was requested at speed zero.
    #[error("travel speed must be positive")]
    NoSpeed,

    /// The computation overflowed.
    #[error("travel time overflow")]
    Overflow,
}

/// Computes trip durations from the configured travel parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TravelCalculator {
    seconds_per_distance: u64,
    speed_factor: u64,
    min_travel_seconds: u64,
}

impl TravelCalculator {
    /// Build a calculator from config. A zero speed factor is treated as 1.
    pub fn new(config: &TravelConfig) -> Self {
        Self {
            seconds_per_distance: config.seconds_per_distance,
            speed_factor: config.speed_factor.max(1),
            min_travel_seconds: config.min_travel_seconds,
        }
    }

    /// Grid distance between two planets, rounded up.
    ///
    /// # Errors
    ///
    /// Returns [`TravelError::Overflow`] if the distance does not fit `u64`.
    pub fn distance(from: &Planet, to: &Planet) -> Result<u64, TravelError> {
        let dx = u128::from(from.x.abs_diff(to.x));
        let dy = u128::from(from.y.abs_diff(to.y));
        let squared = dx
            .checked_mul(dx)
            .and_then(|x2| dy.checked_mul(dy).and_then(|y2| x2.checked_add(y2)))
            .ok_or(TravelError::Overflow)?;
        u64::try_from(ceil_sqrt(squared)?)
            .ok()
            .ok_or(TravelError::Overflow)
    }

    /// Slowest speed in the group.
    ///
    /// # Errors
    ///
    /// Returns [`TravelError::EmptyGroup`] when no unit is given and
    /// [`TravelError::ZeroSpeed`] when any member cannot move.
    pub fn group_speed<'a>(units: impl IntoIterator<Item = &'a Unit>) -> Result<u32, TravelError> {
        let mut slowest: Option<u32> = None;
        for unit in units {
            if unit.speed == 0 {
                return Err(TravelError::ZeroSpeed(unit.id));
            }
            slowest = Some(slowest.map_or(unit.speed, |s| s.min(unit.speed)));
        }
        slowest.ok_or(TravelError::EmptyGroup)
    }

    /// Trip duration in whole seconds.
    pub fn seconds(&self, from: &Planet, to: &Planet, speed: u32) -> Result<u64, TravelError> {
        if speed == 0 {
            return Err(TravelError::NoSpeed);
        }
        let distance = Self::distance(from, to)?;
        let raw = distance
            .checked_mul(self.seconds_per_distance)
            .ok_or(TravelError::Overflow)?
            .div_ceil(u64::from(speed));
        let scaled = raw.div_ceil(self.speed_factor);
        Ok(scaled.max(self.min_travel_seconds))
    }

    /// Trip duration for a group moving at `speed`.
    pub fn duration(
        &self,
        from: &Planet,
        to: &Planet,
        speed: u32,
    ) -> Result<TimeDelta, TravelError> {
        i64::try_from(self.seconds(from, to, speed)?)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or(TravelError::Overflow)
    }

    /// Departure plus duration.
    pub fn arrival(
        departed_at: DateTime<Utc>,
        duration: TimeDelta,
    ) -> Result<DateTime<Utc>, TravelError> {
        departed_at
            .checked_add_signed(duration)
            .ok_or(TravelError::Overflow)
    }
}

/// Smallest `r` with `r * r >= n`.
fn ceil_sqrt(n: u128) -> Result<u128, TravelError> {
    let root = n.isqrt();
    let square = root.checked_mul(root).ok_or(TravelError::Overflow)?;
    if square < n {
        root.checked_add(1).ok_or(TravelError::Overflow)
    } else {
        Ok(root)
    }
}

//! # smn-types::time
//!
//! Defines the representation of virtual time within the co-simulation.
//! Virtual time is a discrete, monotone count of time atoms (spec.md §3);
//! one atom equals one configured unit (typically microseconds), distinct
//! from the wall-clock time used for phase deadlines (§4.6).

use crate::errors::SimError;
use serde::{Deserialize, Serialize};

/// The fundamental unit of virtual time, measured in time atoms.
/// A `u64` comfortably covers any run bounded by a `final_time`; the wire
/// `sim_time` field is a signed 64-bit quantity (spec.md §6), so the codec
/// rejects a `SimTime` that would not fit in a non-negative `i64`.
pub type SimTime = u64;

/// The start of virtual time.
pub const SIM_EPOCH: SimTime = 0;

/// The maximum representable virtual time.
pub const MAX_SIM_TIME: SimTime = u64::MAX;

/// The wall-clock unit that one time atom represents. Carried in `SIM_INIT`
/// so nodes can interpret `sim_time` stamps consistently (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
}

impl TimeUnit {
    /// The number of nanoseconds in one atom of this unit.
    pub fn atom_nanos(self) -> u64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
        }
    }
}

/// Performs a checked addition on `SimTime`, returning an error on overflow.
pub fn checked_add(base: SimTime, offset: SimTime) -> Result<SimTime, SimError> {
    base.checked_add(offset)
        .ok_or(SimError::TimeOverflow { base, offset })
}

/// Performs a checked subtraction on `SimTime`, returning an error on underflow.
pub fn checked_sub(base: SimTime, offset: SimTime) -> Result<SimTime, SimError> {
    base.checked_sub(offset)
        .ok_or(SimError::TimeUnderflow { base, offset })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_add_overflows_at_max() {
        assert!(checked_add(MAX_SIM_TIME, 1).is_err());
        assert_eq!(checked_add(10, 5).unwrap(), 15);
    }

    #[test]
    fn checked_sub_underflows_below_zero() {
        assert!(checked_sub(0, 1).is_err());
        assert_eq!(checked_sub(10, 5).unwrap(), 5);
    }
}

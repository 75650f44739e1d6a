//! Objective values as reported by the solvers.
//!
//! Two-component objectives (VRP-TW: vehicle count and travelled distance)
//! come out of the solver as one integer, `secondary * PACK_SCALE + primary`.
//! The scale is fixed by the solver model. A primary component at or above
//! `PACK_SCALE` cannot be told apart from a larger secondary component, so
//! decoding is only correct while `primary < PACK_SCALE` holds.

use std::fmt::{self, Display};

pub const PACK_SCALE: u64 = 1_000_000;

/// Decoded two-component objective. Ordering compares `secondary` first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PackedObjective {
    /// `value / PACK_SCALE`
    pub secondary: u64,
    /// `value % PACK_SCALE`
    pub primary: u64,
}

impl PackedObjective {
    pub fn decode(value: u64) -> Self {
        PackedObjective {
            secondary: value / PACK_SCALE,
            primary: value % PACK_SCALE,
        }
    }

    /// Inverse of [`PackedObjective::decode`]. Returns `None` when the primary
    /// component does not fit below `PACK_SCALE` or the result overflows.
    pub fn encode(self) -> Option<u64> {
        if self.primary >= PACK_SCALE {
            return None;
        }
        self.secondary
            .checked_mul(PACK_SCALE)?
            .checked_add(self.primary)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Objective {
    Single(i64),
    Packed(PackedObjective),
}

impl Objective {
    /// Components in per-run log order.
    pub fn components(&self) -> Vec<f64> {
        match self {
            Objective::Single(v) => vec![*v as f64],
            Objective::Packed(p) => vec![p.primary as f64, p.secondary as f64],
        }
    }
}

impl Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::Single(v) => write!(f, "{}", v),
            Objective::Packed(p) => write!(f, "{} {}", p.primary, p.secondary),
        }
    }
}

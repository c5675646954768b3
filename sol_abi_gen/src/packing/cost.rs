/* Static gas and bytecode-size estimates for accessor expressions */

use crate::config::{CostModel, CostPreference};
use alloy_primitives::U256;
use std::cmp::Ordering;
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cost {
    pub gas: u64,
    pub bytes: u64,
}

impl Cost {
    pub const fn new(gas: u64, bytes: u64) -> Self {
        Self { gas, bytes }
    }

    pub fn score(self, model: &CostModel) -> f64 {
        self.gas as f64 + self.bytes as f64 * model.preference_ratio
    }

    /// Orders by score, then by whichever dimension `model` prefers.
    pub fn compare(self, other: Cost, model: &CostModel) -> Ordering {
        let by_score = self.score(model).total_cmp(&other.score(model));
        let (a, b) = match model.prefer {
            CostPreference::Gas => ((self.gas, self.bytes), (other.gas, other.bytes)),
            CostPreference::Size => ((self.bytes, self.gas), (other.bytes, other.gas)),
        };
        by_score.then(a.cmp(&b))
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost::new(self.gas + rhs.gas, self.bytes + rhs.bytes)
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        *self = *self + rhs;
    }
}

/// Any of the very-low tier: arithmetic, bitwise, DUP, MLOAD, MSTORE, MSTORE8.
pub const OP: Cost = Cost::new(3, 1);
/// Warm SLOAD.
pub const SLOAD: Cost = Cost::new(100, 1);
/// Warm SSTORE to a non-zero slot.
pub const SSTORE: Cost = Cost::new(2900, 1);

/// PUSH0 for zero, otherwise the shortest PUSHn that holds `value`.
pub fn push(value: U256) -> Cost {
    if value.is_zero() {
        Cost::new(2, 1)
    } else {
        Cost::new(3, 1 + value.byte_len() as u64)
    }
}

pub fn push_u64(value: u64) -> Cost {
    push(U256::from(value))
}

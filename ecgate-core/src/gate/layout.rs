//! Static gate table and the selector encoding.
//!
//! ```text
//! |      opcode | cost | q_ec | q1 | q2 | q3 | statement
//! | ----------- |:----:|:----:| -- | -- | -- | -------------------------------------------
//! |  cond. add  |   4  |   1  | 1  | 0  | 0  | (x1, y1), (x2, y2), (x3, -y3) collinear if cond
//! |   ec double |   2  |   1  | 0  | 1  | 0  | (x3, -y3) on the tangent at (x1, y1)
//! | is on curve |   1  |   1  | 0  | 0  | 1  | y1^2 = x1^3 + b
//! |     partial |   3  |   0  | 1  | 0  | 0  | x3 = x1 + 2y1 + 4x2 + 8y2 + 16y3,
//! |   decompose |      |      |    |    |    | x1, y1, x2, y2 binary
//! |   field add |   2  |   0  | 0  | 1  | 0  | a1 = a0 + b0
//! |   field mul |   2  |   0  | 0  | 0  | 1  | a1 = a0 * b0
//! ```
//!
//! `q_ec` partitions EC opcodes from field opcodes; within each half exactly
//! one of `q1`, `q2`, `q3` is set. The all-zero pattern is the no-op row used
//! for window tails and padding.

use std::fmt;

use crate::field::GateField;
use crate::utils::errors::GateError;

/// Longest window of any opcode.
pub const MAX_GATE_SPAN: usize = 4;
/// Highest constraint degree of any opcode, selector factors included.
pub const MAX_GATE_DEGREE: usize = 5;
/// Largest number of residuals an opcode produces.
pub const MAX_RESIDUALS: usize = 5;
/// Every opcode is gated by a product of two selector factors.
pub const SELECTOR_DEGREE: usize = 2;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum_macros::EnumIter,
    strum_macros::EnumCount,
    strum_macros::Display,
)]
#[repr(usize)]
pub enum Opcode {
    ConditionalAdd,
    Double,
    OnCurve,
    PartialBitDecompose,
    FieldAdd,
    FieldMul,
}

/// Canonical ordering over opcodes; `GATE_TABLE[op.to_index()].opcode == op`.
pub const ALL_OPCODES: [Opcode; 6] = [
    Opcode::ConditionalAdd,
    Opcode::Double,
    Opcode::OnCurve,
    Opcode::PartialBitDecompose,
    Opcode::FieldAdd,
    Opcode::FieldMul,
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SelectorBits {
    pub q_ec: bool,
    pub q1: bool,
    pub q2: bool,
    pub q3: bool,
}

impl SelectorBits {
    pub const NOOP: Self = Self::new(false, false, false, false);

    pub const fn new(q_ec: bool, q1: bool, q2: bool, q3: bool) -> Self {
        Self { q_ec, q1, q2, q3 }
    }

    #[inline]
    pub fn is_noop(&self) -> bool {
        *self == Self::NOOP
    }

    /// Reads `[q_ec, q1, q2, q3]` from field cells.
    pub fn from_field_row<F: GateField>(cells: [F; 4]) -> Result<Self, GateError> {
        let mut bits = [false; 4];
        for (column, (bit, cell)) in bits.iter_mut().zip(cells.iter()).enumerate() {
            if !cell.is_boolean() {
                return Err(GateError::NonBooleanSelector { column });
            }
            *bit = cell.is_one();
        }
        Ok(Self::new(bits[0], bits[1], bits[2], bits[3]))
    }

    pub fn to_field<F: GateField>(&self) -> [F; 4] {
        [self.q_ec, self.q1, self.q2, self.q3].map(F::from_bool)
    }
}

impl fmt::Display for SelectorBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(q_ec={}, q1={}, q2={}, q3={})",
            self.q_ec as u8, self.q1 as u8, self.q2 as u8, self.q3 as u8
        )
    }
}

/// Static description of one opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gate {
    pub opcode: Opcode,
    /// Number of rows in the window.
    pub cost: usize,
    pub selectors: SelectorBits,
    /// Degree of the residuals before selector gating.
    pub residual_degree: usize,
    pub num_residuals: usize,
    pub statement: &'static str,
}

impl Gate {
    /// Degree of the gated constraint as committed by the proving backend.
    pub const fn degree(&self) -> usize {
        self.residual_degree + SELECTOR_DEGREE
    }
}

pub static GATE_TABLE: [Gate; 6] = [
    Gate {
        opcode: Opcode::ConditionalAdd,
        cost: 4,
        selectors: SelectorBits::new(true, true, false, false),
        residual_degree: 3,
        num_residuals: 5,
        statement: "p3 = p1 + p2 if cond else p1; (x1, y1), (x2, y2), (x3, -y3) collinear",
    },
    Gate {
        opcode: Opcode::Double,
        cost: 2,
        selectors: SelectorBits::new(true, false, true, false),
        residual_degree: 3,
        num_residuals: 2,
        statement: "(x1, y1) and (x3, -y3) lie on a tangent line of the curve",
    },
    Gate {
        opcode: Opcode::OnCurve,
        cost: 1,
        selectors: SelectorBits::new(true, false, false, true),
        residual_degree: 3,
        num_residuals: 1,
        statement: "y1^2 = x1^3 + b",
    },
    Gate {
        opcode: Opcode::PartialBitDecompose,
        cost: 3,
        selectors: SelectorBits::new(false, true, false, false),
        residual_degree: 2,
        num_residuals: 5,
        statement: "x3 = x1 + 2y1 + 4x2 + 8y2 + 16y3 and x1, y1, x2, y2 are binary",
    },
    Gate {
        opcode: Opcode::FieldAdd,
        cost: 2,
        selectors: SelectorBits::new(false, false, true, false),
        residual_degree: 1,
        num_residuals: 1,
        statement: "a1 = a0 + b0",
    },
    Gate {
        opcode: Opcode::FieldMul,
        cost: 2,
        selectors: SelectorBits::new(false, false, false, true),
        residual_degree: 2,
        num_residuals: 1,
        statement: "a1 = a0 * b0",
    },
];

impl Opcode {
    pub const fn to_index(&self) -> usize {
        match self {
            Opcode::ConditionalAdd => 0,
            Opcode::Double => 1,
            Opcode::OnCurve => 2,
            Opcode::PartialBitDecompose => 3,
            Opcode::FieldAdd => 4,
            Opcode::FieldMul => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        ALL_OPCODES.get(index).copied()
    }

    #[inline]
    pub fn gate(&self) -> &'static Gate {
        &GATE_TABLE[self.to_index()]
    }

    #[inline]
    pub fn cost(&self) -> usize {
        self.gate().cost
    }

    #[inline]
    pub fn selectors(&self) -> SelectorBits {
        self.gate().selectors
    }

    pub fn is_ec(&self) -> bool {
        self.selectors().q_ec
    }
}

/// The selector pattern that enables `opcode`.
pub fn select(opcode: Opcode) -> SelectorBits {
    opcode.selectors()
}

/// Inverse of [`select`].
pub fn dispatch(bits: SelectorBits) -> Result<Opcode, GateError> {
    match (bits.q_ec, bits.q1, bits.q2, bits.q3) {
        (true, true, false, false) => Ok(Opcode::ConditionalAdd),
        (true, false, true, false) => Ok(Opcode::Double),
        (true, false, false, true) => Ok(Opcode::OnCurve),
        (false, true, false, false) => Ok(Opcode::PartialBitDecompose),
        (false, false, true, false) => Ok(Opcode::FieldAdd),
        (false, false, false, true) => Ok(Opcode::FieldMul),
        _ => Err(GateError::UnknownSelectorCombination(bits)),
    }
}

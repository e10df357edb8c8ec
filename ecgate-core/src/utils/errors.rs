use thiserror::Error;

use crate::gate::layout::{Opcode, SelectorBits};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Vertical line: x1 == x2 with y1 != -y2, route to doubling")]
    VerticalLine,
    #[error("Point is not on the curve")]
    InvalidPoint,
    #[error("Cannot double a 2-torsion point (y == 0)")]
    InvalidDoubling,
    #[error("No opcode registered for selector pattern {0}")]
    UnknownSelectorCombination(SelectorBits),
    #[error("Selector column {column} holds a non-boolean value")]
    NonBooleanSelector { column: usize },
    #[error("Row {row} is inside a window but carries selectors")]
    SelectorInWindowTail { row: usize },
    #[error("Row {row} does not carry the {opcode} selectors recorded for its window")]
    WindowHeadMismatch { row: usize, opcode: Opcode },
    #[error("Bit decomposition input is not boolean")]
    RangeError,
    #[error("Condition flag is not boolean")]
    InvalidCondition,
    #[error("Only short Weierstrass curves with a = 0 are supported")]
    UnsupportedCurve,
    #[error("Window of span {span} starting at row {row} runs past the end of the trace")]
    TruncatedWindow { row: usize, span: usize },
}

/// A synthesis failure, tagged with the window it would have occupied.
/// Nothing is committed to the trace when this is returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Synthesis of window {window} ({opcode}) failed: {source}")]
pub struct SynthesisError {
    pub window: usize,
    pub opcode: Opcode,
    #[source]
    pub source: GateError,
}

impl SynthesisError {
    pub fn new(window: usize, opcode: Opcode, source: GateError) -> Self {
        Self {
            window,
            opcode,
            source,
        }
    }
}

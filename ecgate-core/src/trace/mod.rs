//! Row-major trace storage, window bookkeeping and whole-trace checking.

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rayon::prelude::*;

use crate::config::TraceConfig;
use crate::field::GateField;
use crate::gate::evaluator::{Evaluator, Residuals, WindowCells};
use crate::gate::layout::{dispatch, Opcode, SelectorBits, MAX_RESIDUALS};
use crate::utils::errors::GateError;

/// One trace row: two witness cells and the selector pattern. Only window
/// heads carry a non-zero pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Row<F: GateField> {
    pub a: F,
    pub b: F,
    pub selectors: SelectorBits,
}

impl<F: GateField> Row<F> {
    pub fn noop() -> Self {
        Self::witness(F::zero(), F::zero())
    }

    pub fn head(opcode: Opcode, a: F, b: F) -> Self {
        Self {
            a,
            b,
            selectors: opcode.selectors(),
        }
    }

    pub fn witness(a: F, b: F) -> Self {
        Self {
            a,
            b,
            selectors: SelectorBits::NOOP,
        }
    }
}

impl<F: GateField> Default for Row<F> {
    fn default() -> Self {
        Self::noop()
    }
}

/// Directory entry of a committed window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowRef {
    pub index: usize,
    pub start: usize,
    pub opcode: Opcode,
}

/// A reserved window handed out by [`Trace::reserve`].
#[derive(Debug)]
pub struct WindowSlot<'a, F: GateField> {
    pub index: usize,
    pub opcode: Opcode,
    pub rows: &'a mut [Row<F>],
}

/// Append-only trace. Rows are only ever added through whole windows, so the
/// directory always tiles the row vector.
#[derive(Clone, Debug, Default)]
pub struct Trace<F: GateField> {
    rows: Vec<Row<F>>,
    windows: Vec<WindowRef>,
}

impl<F: GateField> Trace<F> {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            windows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn num_windows(&self) -> usize {
        self.windows.len()
    }

    pub fn rows(&self) -> &[Row<F>] {
        &self.rows
    }

    pub fn windows(&self) -> &[WindowRef] {
        &self.windows
    }

    /// Rows of the window at `index`.
    pub fn window_rows(&self, index: usize) -> Option<&[Row<F>]> {
        self.windows
            .get(index)
            .map(|w| &self.rows[w.start..w.start + w.opcode.cost()])
    }

    /// Appends one contiguous block of no-op rows covering `opcodes` and
    /// returns a disjoint mutable slot per window, in order. The caller must
    /// fill every slot; slots can be written concurrently.
    pub fn reserve(&mut self, opcodes: &[Opcode]) -> Vec<WindowSlot<'_, F>> {
        let start = self.rows.len();
        let first_window = self.windows.len();
        let total: usize = opcodes.iter().map(Opcode::cost).sum();
        self.rows.resize(start + total, Row::noop());

        let mut row = start;
        for (i, opcode) in opcodes.iter().enumerate() {
            self.windows.push(WindowRef {
                index: first_window + i,
                start: row,
                opcode: *opcode,
            });
            row += opcode.cost();
        }

        let mut rest = &mut self.rows[start..];
        let mut slots = Vec::with_capacity(opcodes.len());
        for (i, opcode) in opcodes.iter().enumerate() {
            let (rows, tail) = std::mem::take(&mut rest).split_at_mut(opcode.cost());
            slots.push(WindowSlot {
                index: first_window + i,
                opcode: *opcode,
                rows,
            });
            rest = tail;
        }
        slots
    }

    /// Column-major copy of the trace, padded with no-op rows to
    /// [`TraceConfig::padded_len`].
    #[tracing::instrument(skip_all, name = "Trace::finalize", fields(rows = self.rows.len()))]
    pub fn finalize(&self, config: &TraceConfig) -> TraceColumns<F> {
        let len = config.padded_len(self.rows.len());
        let mut columns = TraceColumns::zeroed(len);
        for (i, row) in self.rows.iter().enumerate() {
            let [q_ec, q1, q2, q3] = row.selectors.to_field();
            columns.a[i] = row.a;
            columns.b[i] = row.b;
            columns.q_ec[i] = q_ec;
            columns.q1[i] = q1;
            columns.q2[i] = q2;
            columns.q3[i] = q3;
        }
        columns
    }

    /// [`check_all`] over the rows, plus a cross-check of the window
    /// directory: every recorded window must start with its opcode's head row.
    /// Directory failures carry the directory index. Failures are ordered by
    /// head row.
    pub fn check_all(&self, evaluator: &Evaluator<F>) -> Vec<WindowFailure<F>> {
        let mut failures = check_all(self.rows.as_slice(), evaluator);
        let mismatched: Vec<WindowFailure<F>> = self
            .windows
            .iter()
            .filter(|w| self.rows[w.start].selectors != w.opcode.selectors())
            .map(|w| WindowFailure {
                window: w.index,
                row: w.start,
                opcode: Some(w.opcode),
                kind: FailureKind::Malformed(GateError::WindowHeadMismatch {
                    row: w.start,
                    opcode: w.opcode,
                }),
            })
            .collect();
        if !mismatched.is_empty() {
            tracing::warn!(windows = mismatched.len(), "window directory disagrees with the rows");
            failures.extend(mismatched);
            failures.sort_by_key(|f| f.row);
        }
        failures
    }
}

/// Finalized trace columns, all of the same power-of-two length.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct TraceColumns<F: GateField> {
    pub a: Vec<F>,
    pub b: Vec<F>,
    pub q_ec: Vec<F>,
    pub q1: Vec<F>,
    pub q2: Vec<F>,
    pub q3: Vec<F>,
}

impl<F: GateField> TraceColumns<F> {
    fn zeroed(len: usize) -> Self {
        Self {
            a: vec![F::zero(); len],
            b: vec![F::zero(); len],
            q_ec: vec![F::zero(); len],
            q1: vec![F::zero(); len],
            q2: vec![F::zero(); len],
            q3: vec![F::zero(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }
}

/// Read access to a trace in either layout.
pub trait RowSource<F: GateField>: Sync {
    fn num_rows(&self) -> usize;

    /// `[q_ec, q1, q2, q3]` of `row`.
    fn selector_cells(&self, row: usize) -> [F; 4];

    /// `[a, b]` of `row`.
    fn cells(&self, row: usize) -> [F; 2];

    fn selectors(&self, row: usize) -> Result<SelectorBits, GateError> {
        SelectorBits::from_field_row(self.selector_cells(row))
    }

    /// Cells of the `MAX_GATE_SPAN` rows starting at `head`; rows past the
    /// end read as zero.
    fn window(&self, head: usize) -> WindowCells<F> {
        std::array::from_fn(|i| {
            if head + i < self.num_rows() {
                self.cells(head + i)
            } else {
                [F::zero(); 2]
            }
        })
    }
}

impl<F: GateField> RowSource<F> for [Row<F>] {
    fn num_rows(&self) -> usize {
        self.len()
    }

    fn selector_cells(&self, row: usize) -> [F; 4] {
        self[row].selectors.to_field()
    }

    fn cells(&self, row: usize) -> [F; 2] {
        [self[row].a, self[row].b]
    }

    fn selectors(&self, row: usize) -> Result<SelectorBits, GateError> {
        Ok(self[row].selectors)
    }
}

impl<F: GateField> RowSource<F> for TraceColumns<F> {
    fn num_rows(&self) -> usize {
        self.len()
    }

    fn selector_cells(&self, row: usize) -> [F; 4] {
        [self.q_ec[row], self.q1[row], self.q2[row], self.q3[row]]
    }

    fn cells(&self, row: usize) -> [F; 2] {
        [self.a[row], self.b[row]]
    }
}

/// Selector-weighted constraint expressions at `row`; see
/// [`Evaluator::gate_expressions`].
pub fn gate_expressions_at<F, S>(source: &S, evaluator: &Evaluator<F>, row: usize) -> [F; MAX_RESIDUALS]
where
    F: GateField,
    S: RowSource<F> + ?Sized,
{
    evaluator.gate_expressions(source.selector_cells(row), &source.window(row))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind<F: GateField> {
    /// The window dispatched but some residual is non-zero.
    Unsatisfied(Residuals<F>),
    /// The head row has no valid opcode, the window is cut off, or its rows
    /// disagree with the window layout.
    Malformed(GateError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowFailure<F: GateField> {
    /// Position among the window heads found by the scan.
    pub window: usize,
    /// Head row.
    pub row: usize,
    pub opcode: Option<Opcode>,
    pub kind: FailureKind<F>,
}

/// Scans `source` for window heads and checks every window. All-zero selector
/// rows between windows are padding. A head whose pattern is not registered
/// is reported and the scan resumes at the next row; a window whose tail rows
/// carry selectors is reported without being evaluated. Failures come back in
/// window order.
#[tracing::instrument(skip_all, name = "check_all", fields(rows = source.num_rows()))]
pub fn check_all<F, S>(source: &S, evaluator: &Evaluator<F>) -> Vec<WindowFailure<F>>
where
    F: GateField,
    S: RowSource<F> + ?Sized,
{
    let num_rows = source.num_rows();
    let mut heads: Vec<(usize, usize, Opcode)> = Vec::new();
    let mut malformed = Vec::new();

    let mut row = 0;
    let mut window = 0;
    while row < num_rows {
        let bits = match source.selectors(row) {
            Ok(bits) if bits.is_noop() => {
                row += 1;
                continue;
            }
            Ok(bits) => dispatch(bits),
            Err(e) => Err(e),
        };
        match bits {
            Ok(opcode) if row + opcode.cost() > num_rows => {
                malformed.push(WindowFailure {
                    window,
                    row,
                    opcode: Some(opcode),
                    kind: FailureKind::Malformed(GateError::TruncatedWindow {
                        row,
                        span: opcode.cost(),
                    }),
                });
                row = num_rows;
            }
            Ok(opcode) => {
                // the gate polynomial is applied at tail rows too, so their
                // selectors must be zero
                let tail = (row + 1..row + opcode.cost())
                    .find(|&r| !matches!(source.selectors(r), Ok(bits) if bits.is_noop()));
                match tail {
                    Some(r) => malformed.push(WindowFailure {
                        window,
                        row,
                        opcode: Some(opcode),
                        kind: FailureKind::Malformed(GateError::SelectorInWindowTail { row: r }),
                    }),
                    None => heads.push((window, row, opcode)),
                }
                row += opcode.cost();
            }
            Err(e) => {
                malformed.push(WindowFailure {
                    window,
                    row,
                    opcode: None,
                    kind: FailureKind::Malformed(e),
                });
                row += 1;
            }
        }
        window += 1;
    }

    let mut failures: Vec<WindowFailure<F>> = heads
        .par_iter()
        .filter_map(|&(window, row, opcode)| {
            let residuals = evaluator.evaluate(opcode, &source.window(row));
            (!residuals.is_satisfied()).then_some(WindowFailure {
                window,
                row,
                opcode: Some(opcode),
                kind: FailureKind::Unsatisfied(residuals),
            })
        })
        .collect();
    failures.extend(malformed);
    failures.sort_by_key(|f| f.window);

    if !failures.is_empty() {
        tracing::warn!(
            windows = window,
            failures = failures.len(),
            first = failures[0].window,
            "trace has failing windows"
        );
    }
    failures
}

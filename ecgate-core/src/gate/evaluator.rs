//! Residual evaluation for every opcode.
//!
//! An opcode's constraint holds on a window iff every residual is zero. The
//! evaluator knows nothing about synthesis; it only reads the `(a, b)` cells
//! of the window rows.

use itertools::Itertools;

use crate::curve::{collinearity_residual, tangent_residual, CurveParams};
use crate::field::GateField;
use crate::utils::errors::GateError;

use super::layout::{dispatch, Opcode, SelectorBits, ALL_OPCODES, MAX_GATE_SPAN, MAX_RESIDUALS};

/// `(a, b)` of the rows `head .. head + MAX_GATE_SPAN`. Rows beyond the
/// window (or the trace) are zero.
pub type WindowCells<F> = [[F; 2]; MAX_GATE_SPAN];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Residuals<F: GateField> {
    values: [F; MAX_RESIDUALS],
    len: usize,
}

impl<F: GateField> Residuals<F> {
    fn new(values: &[F]) -> Self {
        let mut res = Self {
            values: [F::zero(); MAX_RESIDUALS],
            len: values.len(),
        };
        res.values[..values.len()].copy_from_slice(values);
        res
    }

    pub fn as_slice(&self) -> &[F] {
        &self.values[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_satisfied(&self) -> bool {
        self.as_slice().iter().all(|r| r.is_zero())
    }

    /// Index of the first non-zero residual.
    pub fn first_violation(&self) -> Option<usize> {
        self.as_slice().iter().position(|r| !r.is_zero())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Evaluator<F: GateField> {
    curve: CurveParams<F>,
}

impl<F: GateField> Evaluator<F> {
    pub fn new(curve: CurveParams<F>) -> Self {
        Self { curve }
    }

    pub fn curve(&self) -> &CurveParams<F> {
        &self.curve
    }

    /// Residuals of `opcode` on `cells`.
    pub fn evaluate(&self, opcode: Opcode, cells: &WindowCells<F>) -> Residuals<F> {
        let [[x1, y1], [x2, y2], [x3, y3], [x4, y4]] = *cells;
        match opcode {
            // rows: p1 | p2 | (cond, _) | p3
            Opcode::ConditionalAdd => {
                let cond = x3;
                let not_cond = F::one() - cond;
                Residuals::new(&[
                    cond * collinearity_residual(x1, y1, x2, y2, x4, y4),
                    self.curve.on_curve_residual(x4, y4),
                    not_cond * (x4 - x1),
                    not_cond * (y4 - y1),
                    cond * (cond - F::one()),
                ])
            }
            // rows: p1 | p3
            Opcode::Double => Residuals::new(&[
                tangent_residual(x1, y1, x2, y2),
                self.curve.on_curve_residual(x2, y2),
            ]),
            Opcode::OnCurve => Residuals::new(&[self.curve.on_curve_residual(x1, y1)]),
            // rows: (x1, y1) | (x2, y2) | (x3, y3)
            Opcode::PartialBitDecompose => {
                let packed = x1
                    + y1.mul_u64(2)
                    + x2.mul_u64(4)
                    + y2.mul_u64(8)
                    + y3.mul_u64(16);
                Residuals::new(&[
                    x3 - packed,
                    boolean_residual(x1),
                    boolean_residual(y1),
                    boolean_residual(x2),
                    boolean_residual(y2),
                ])
            }
            // rows: (a0, b0) | (a1, _)
            Opcode::FieldAdd => Residuals::new(&[x2 - x1 - y1]),
            Opcode::FieldMul => Residuals::new(&[x2 - x1 * y1]),
        }
    }

    /// `evaluate(window) == 0`, dispatching on the head selectors.
    pub fn check(&self, selectors: SelectorBits, cells: &WindowCells<F>) -> Result<bool, GateError> {
        let opcode = dispatch(selectors)?;
        Ok(self.evaluate(opcode, cells).is_satisfied())
    }

    /// The selector-gated polynomial the proving backend commits to, evaluated
    /// at one row without dispatching:
    ///
    /// ```text
    ///   q_ec q1 G_cond_add + q_ec q2 G_double + q_ec q3 G_on_curve
    /// + (1 - q_ec) q1 G_decompose + (1 - q_ec) q2 G_add + (1 - q_ec) q3 G_mul
    /// ```
    ///
    /// one expression per residual slot. On an honest trace every expression
    /// vanishes at every row, window tails and padding included.
    pub fn gate_expressions(&self, selectors: [F; 4], cells: &WindowCells<F>) -> [F; MAX_RESIDUALS] {
        let [q_ec, q1, q2, q3] = selectors;
        let not_ec = F::one() - q_ec;
        let gates = [
            q_ec * q1,
            q_ec * q2,
            q_ec * q3,
            not_ec * q1,
            not_ec * q2,
            not_ec * q3,
        ];

        let mut acc = [F::zero(); MAX_RESIDUALS];
        for (opcode, gate) in ALL_OPCODES.iter().zip_eq(gates) {
            if gate.is_zero() {
                continue;
            }
            let residuals = self.evaluate(*opcode, cells);
            for (slot, r) in acc.iter_mut().zip(residuals.as_slice()) {
                *slot += gate * *r;
            }
        }
        acc
    }
}

/// `b (b - 1)`
#[inline]
fn boolean_residual<F: GateField>(b: F) -> F {
    b * (b - F::one())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Point;
    use crate::gate::layout::GATE_TABLE;
    use ark_bn254::{Fq, G1Projective};
    use ark_ec::CurveGroup;
    use ark_ff::{One, UniformRand, Zero};
    use ark_std::test_rng;
    use strum::IntoEnumIterator;

    fn fq(n: i64) -> Fq {
        <Fq as GateField>::from_i64(n)
    }

    fn evaluator() -> Evaluator<Fq> {
        Evaluator::new(CurveParams::from_sw_config::<ark_bn254::g1::Config>().unwrap())
    }

    fn cells(rows: &[[Fq; 2]]) -> WindowCells<Fq> {
        let mut out = [[Fq::zero(); 2]; MAX_GATE_SPAN];
        out[..rows.len()].copy_from_slice(rows);
        out
    }

    #[test]
    fn field_windows() {
        let ev = evaluator();
        let add = cells(&[[fq(5), fq(7)], [fq(12), fq(0)]]);
        assert!(ev.evaluate(Opcode::FieldAdd, &add).is_satisfied());
        let mul = cells(&[[fq(5), fq(7)], [fq(35), fq(0)]]);
        assert!(ev.evaluate(Opcode::FieldMul, &mul).is_satisfied());
        assert!(!ev.evaluate(Opcode::FieldMul, &add).is_satisfied());
        assert!(!ev.evaluate(Opcode::FieldAdd, &mul).is_satisfied());
    }

    #[test]
    fn partial_bit_decompose_window() {
        let ev = evaluator();
        let mut rng = test_rng();
        let y3 = Fq::rand(&mut rng);
        // x1 = 1, y1 = 0, x2 = 0, y2 = 1: low nibble 9
        let x3 = y3 * fq(16) + fq(9);
        let good = cells(&[[fq(1), fq(0)], [fq(0), fq(1)], [x3, y3]]);
        assert!(ev.evaluate(Opcode::PartialBitDecompose, &good).is_satisfied());

        // a non-binary limb that still balances the sum
        let x3 = y3 * fq(16) + fq(10);
        let non_binary = cells(&[[fq(2), fq(0)], [fq(0), fq(1)], [x3, y3]]);
        let res = ev.evaluate(Opcode::PartialBitDecompose, &non_binary);
        assert!(res.as_slice()[0].is_zero());
        assert_eq!(res.first_violation(), Some(1));

        let wrong_sum = cells(&[[fq(0), fq(0)], [fq(0), fq(1)], [x3, y3]]);
        assert_eq!(
            ev.evaluate(Opcode::PartialBitDecompose, &wrong_sum)
                .first_violation(),
            Some(0)
        );
    }

    #[test]
    fn ec_windows() {
        let ev = evaluator();
        let mut rng = test_rng();
        let a = G1Projective::rand(&mut rng);
        let b = G1Projective::rand(&mut rng);
        let p1: Point<Fq> = a.into_affine().into();
        let p2: Point<Fq> = b.into_affine().into();
        let sum: Point<Fq> = (a + b).into_affine().into();
        let dbl: Point<Fq> = (a + a).into_affine().into();

        let on_curve = cells(&[[p1.x, p1.y]]);
        assert!(ev.evaluate(Opcode::OnCurve, &on_curve).is_satisfied());

        let double = cells(&[[p1.x, p1.y], [dbl.x, dbl.y]]);
        assert!(ev.evaluate(Opcode::Double, &double).is_satisfied());
        let bad_double = cells(&[[p1.x, p1.y], [sum.x, sum.y]]);
        assert!(!ev.evaluate(Opcode::Double, &bad_double).is_satisfied());

        let add = |cond: Fq, p3: Point<Fq>| {
            cells(&[[p1.x, p1.y], [p2.x, p2.y], [cond, Fq::zero()], [p3.x, p3.y]])
        };
        assert!(ev.evaluate(Opcode::ConditionalAdd, &add(Fq::one(), sum)).is_satisfied());
        assert!(ev.evaluate(Opcode::ConditionalAdd, &add(Fq::zero(), p1)).is_satisfied());
        assert!(!ev.evaluate(Opcode::ConditionalAdd, &add(Fq::one(), dbl)).is_satisfied());
        assert!(!ev.evaluate(Opcode::ConditionalAdd, &add(Fq::zero(), sum)).is_satisfied());
        assert_eq!(
            ev.evaluate(Opcode::ConditionalAdd, &add(fq(2), sum))
                .first_violation(),
            Some(2)
        );
    }

    #[test]
    fn check_dispatches_on_selectors() {
        let ev = evaluator();
        let add = cells(&[[fq(5), fq(7)], [fq(12), fq(0)]]);
        assert_eq!(ev.check(Opcode::FieldAdd.selectors(), &add), Ok(true));
        assert_eq!(ev.check(Opcode::FieldMul.selectors(), &add), Ok(false));
        assert_eq!(
            ev.check(SelectorBits::NOOP, &add),
            Err(GateError::UnknownSelectorCombination(SelectorBits::NOOP))
        );
    }

    /// Evaluates every residual along a random line `t -> base + t * dir`
    /// through window space; a degree-d polynomial has vanishing (d+1)-th
    /// finite differences and (with overwhelming probability) a non-zero d-th.
    #[test]
    fn residual_degrees_match_table() {
        let ev = evaluator();
        let mut rng = test_rng();
        let base: [[Fq; 2]; MAX_GATE_SPAN] =
            std::array::from_fn(|_| [Fq::rand(&mut rng), Fq::rand(&mut rng)]);
        let dir: [[Fq; 2]; MAX_GATE_SPAN] =
            std::array::from_fn(|_| [Fq::rand(&mut rng), Fq::rand(&mut rng)]);

        fn finite_difference(values: &[Fq], order: usize) -> Fq {
            let mut v = values.to_vec();
            for _ in 0..order {
                v = v.windows(2).map(|w| w[1] - w[0]).collect();
            }
            v[0]
        }

        for op in Opcode::iter() {
            let gate = &GATE_TABLE[op.to_index()];
            let d = gate.residual_degree;
            let samples: Vec<Residuals<Fq>> = (0..=d + 1)
                .map(|t| {
                    let t = fq(t as i64);
                    let point: WindowCells<Fq> = std::array::from_fn(|i| {
                        [base[i][0] + t * dir[i][0], base[i][1] + t * dir[i][1]]
                    });
                    ev.evaluate(op, &point)
                })
                .collect();
            assert_eq!(samples[0].len(), gate.num_residuals, "{op}");

            let mut max_seen = false;
            for slot in 0..gate.num_residuals {
                let values: Vec<Fq> = samples.iter().map(|r| r.as_slice()[slot]).collect();
                assert!(finite_difference(&values, d + 1).is_zero(), "{op} slot {slot}");
                max_seen |= !finite_difference(&values, d).is_zero();
            }
            assert!(max_seen, "{op} never reaches degree {d}");
        }
    }

    #[test]
    fn gate_expressions_follow_selectors() {
        let ev = evaluator();
        let mul = cells(&[[fq(5), fq(7)], [fq(35), fq(0)]]);
        let as_field = |op: Opcode| op.selectors().to_field::<Fq>();

        assert!(ev
            .gate_expressions(as_field(Opcode::FieldMul), &mul)
            .iter()
            .all(|e| e.is_zero()));
        // the same cells under the add selector violate a1 = a0 + b0
        let exprs = ev.gate_expressions(as_field(Opcode::FieldAdd), &mul);
        assert_eq!(exprs[0], fq(35 - 12));
        // no-op rows never constrain anything
        assert!(ev
            .gate_expressions([Fq::zero(); 4], &mul)
            .iter()
            .all(|e| e.is_zero()));
    }
}

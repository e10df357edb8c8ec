//! Witness synthesis: turns a [`GateRequest`] into the rows of one window.
//!
//! Synthesis is all-or-nothing. Every value of a window is computed (and every
//! input validated) before the trace is touched, so a failed request leaves
//! the trace exactly as it was. Requests whose result is fixed by the group
//! law alone (identity inputs, `p + (-p)`) produce no rows at all.

use rayon::prelude::*;

use crate::config::TraceConfig;
use crate::curve::{CurveParams, Point};
use crate::field::{invert, par_batch_invert, GateField};
use crate::trace::{Row, Trace};
use crate::utils::errors::{GateError, SynthesisError};

use super::layout::Opcode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateRequest<F: GateField> {
    ConditionalAdd { p1: Point<F>, p2: Point<F>, cond: F },
    Double { p: Point<F> },
    OnCurve { p: Point<F> },
    /// `bits` are the four low bits of `value`, little-endian.
    PartialBitDecompose { bits: [F; 4], value: F },
    FieldAdd { a: F, b: F },
    FieldMul { a: F, b: F },
}

impl<F: GateField> GateRequest<F> {
    pub fn opcode(&self) -> Opcode {
        match self {
            GateRequest::ConditionalAdd { .. } => Opcode::ConditionalAdd,
            GateRequest::Double { .. } => Opcode::Double,
            GateRequest::OnCurve { .. } => Opcode::OnCurve,
            GateRequest::PartialBitDecompose { .. } => Opcode::PartialBitDecompose,
            GateRequest::FieldAdd { .. } => Opcode::FieldAdd,
            GateRequest::FieldMul { .. } => Opcode::FieldMul,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutput<F: GateField> {
    Point(Point<F>),
    Field(F),
}

impl<F: GateField> GateOutput<F> {
    pub fn as_point(&self) -> Option<Point<F>> {
        match self {
            GateOutput::Point(p) => Some(*p),
            GateOutput::Field(_) => None,
        }
    }

    pub fn as_field(&self) -> Option<F> {
        match self {
            GateOutput::Field(f) => Some(*f),
            GateOutput::Point(_) => None,
        }
    }
}

/// Rows computed for one request. `rows` is empty when the request was
/// resolved structurally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment<F: GateField> {
    pub opcode: Opcode,
    pub rows: Vec<Row<F>>,
    pub output: GateOutput<F>,
}

impl<F: GateField> Assignment<F> {
    pub fn is_structural(&self) -> bool {
        self.rows.is_empty()
    }
}

type Assigned<F, T> = Result<(Vec<Row<F>>, T), GateError>;

#[derive(Clone, Copy, Debug)]
pub struct Synthesizer<F: GateField> {
    curve: CurveParams<F>,
    config: TraceConfig,
}

impl<F: GateField> Synthesizer<F> {
    pub fn new(curve: CurveParams<F>, config: TraceConfig) -> Self {
        Self { curve, config }
    }

    pub fn curve(&self) -> &CurveParams<F> {
        &self.curve
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Computes the window for `request` without touching any trace.
    pub fn assign(&self, request: &GateRequest<F>) -> Result<Assignment<F>, GateError> {
        self.assign_with_inverse(request, None)
    }

    /// Like [`Self::assign`], reusing `inverse` as the inverse of
    /// [`Self::slope_denominator`] when it is given.
    fn assign_with_inverse(
        &self,
        request: &GateRequest<F>,
        inverse: Option<F>,
    ) -> Result<Assignment<F>, GateError> {
        let opcode = request.opcode();
        let (rows, output) = match *request {
            GateRequest::ConditionalAdd { p1, p2, cond } => {
                let (rows, p3) = self.conditional_add(&p1, &p2, cond, inverse)?;
                (rows, GateOutput::Point(p3))
            }
            GateRequest::Double { p } => {
                let (rows, p3) = self.double(&p, inverse)?;
                (rows, GateOutput::Point(p3))
            }
            GateRequest::OnCurve { p } => {
                let (rows, p) = self.on_curve(&p);
                (rows, GateOutput::Point(p))
            }
            GateRequest::PartialBitDecompose { bits, value } => {
                let (rows, high) = partial_bit_decompose(bits, value)?;
                (rows, GateOutput::Field(high))
            }
            GateRequest::FieldAdd { a, b } => {
                let (rows, c) = field_op(Opcode::FieldAdd, a, b, a + b);
                (rows, GateOutput::Field(c))
            }
            GateRequest::FieldMul { a, b } => {
                let (rows, c) = field_op(Opcode::FieldMul, a, b, a * b);
                (rows, GateOutput::Field(c))
            }
        };
        Ok(Assignment {
            opcode,
            rows,
            output,
        })
    }

    /// The one field element the request has to invert, if any: `x2 - x1`
    /// for a chord, `2y` for a tangent. Requests that will fail validation
    /// or resolve structurally have none.
    fn slope_denominator(&self, request: &GateRequest<F>) -> Option<F> {
        match request {
            GateRequest::ConditionalAdd { p1, p2, cond } => {
                if !cond.is_one()
                    || p1.is_identity()
                    || p2.is_identity()
                    || !self.curve.is_on_curve(p1)
                    || !self.curve.is_on_curve(p2)
                {
                    None
                } else if p1.x != p2.x {
                    Some(p2.x - p1.x)
                } else if p1.y == p2.y && !p1.y.is_zero() {
                    Some(p1.y + p1.y)
                } else {
                    None
                }
            }
            GateRequest::Double { p } => {
                (!p.is_identity() && !p.y.is_zero() && self.curve.is_on_curve(p))
                    .then(|| p.y + p.y)
            }
            _ => None,
        }
    }

    fn check_point(&self, p: &Point<F>) -> Result<(), GateError> {
        if self.curve.is_on_curve(p) {
            Ok(())
        } else {
            Err(GateError::InvalidPoint)
        }
    }

    /// Rows: `p1 | p2 | (cond, 0) | p3`.
    fn conditional_add(
        &self,
        p1: &Point<F>,
        p2: &Point<F>,
        cond: F,
        inverse: Option<F>,
    ) -> Assigned<F, Point<F>> {
        if !cond.is_boolean() {
            return Err(GateError::InvalidCondition);
        }
        self.check_point(p1)?;
        self.check_point(p2)?;

        if p1.is_identity() || p2.is_identity() {
            return Ok((vec![], self.curve.conditional_add(p1, p2, cond)?));
        }
        let p3 = if cond.is_zero() {
            *p1
        } else if p1.x != p2.x {
            let inv_dx = match inverse {
                Some(inv) => inv,
                None => invert(&(p2.x - p1.x))?,
            };
            self.curve.chord(p1, p2, inv_dx)
        } else if p1.y == -p2.y {
            return Ok((vec![], Point::identity()));
        } else {
            // p1 == p2: the collinearity residual vanishes and the tangent
            // point is the honest witness
            let inv_2y = match inverse {
                Some(inv) => inv,
                None => invert(&(p1.y + p1.y))?,
            };
            self.curve.tangent(p1, inv_2y)
        };

        let rows = vec![
            Row::head(Opcode::ConditionalAdd, p1.x, p1.y),
            Row::witness(p2.x, p2.y),
            Row::witness(cond, F::zero()),
            Row::witness(p3.x, p3.y),
        ];
        Ok((rows, p3))
    }

    /// Rows: `p1 | p3`.
    fn double(&self, p: &Point<F>, inverse: Option<F>) -> Assigned<F, Point<F>> {
        if p.is_identity() {
            return Ok((vec![], *p));
        }
        self.check_point(p)?;
        if p.y.is_zero() {
            return Err(GateError::InvalidDoubling);
        }
        let inv_2y = match inverse {
            Some(inv) => inv,
            None => invert(&(p.y + p.y))?,
        };
        let p3 = self.curve.tangent(p, inv_2y);
        let rows = vec![
            Row::head(Opcode::Double, p.x, p.y),
            Row::witness(p3.x, p3.y),
        ];
        Ok((rows, p3))
    }

    /// Writes the point even when it is off the curve; the window then fails
    /// evaluation, which is how unsatisfiable traces are built on purpose.
    fn on_curve(&self, p: &Point<F>) -> (Vec<Row<F>>, Point<F>) {
        if p.is_identity() {
            return (vec![], *p);
        }
        (vec![Row::head(Opcode::OnCurve, p.x, p.y)], *p)
    }

    /// Assigns and commits `request` as the next window of `trace`.
    pub fn append(
        &self,
        trace: &mut Trace<F>,
        request: &GateRequest<F>,
    ) -> Result<GateOutput<F>, SynthesisError> {
        let window = trace.num_windows();
        let assignment = self
            .assign(request)
            .map_err(|e| SynthesisError::new(window, request.opcode(), e))?;
        Ok(commit(trace, assignment))
    }

    /// Assigns all `requests` in parallel, then commits them as consecutive
    /// windows. Slope denominators of the whole batch share one batched
    /// inversion. If any request fails nothing is written; the error's
    /// window index counts requests from the first free window.
    #[tracing::instrument(skip_all, name = "Synthesizer::append_batch", fields(requests = requests.len()))]
    pub fn append_batch(
        &self,
        trace: &mut Trace<F>,
        requests: &[GateRequest<F>],
    ) -> Result<Vec<GateOutput<F>>, SynthesisError> {
        let first_window = trace.num_windows();
        let Some(first) = requests.first() else {
            return Ok(vec![]);
        };

        let mut inverses: Vec<F> = requests
            .par_iter()
            .map(|r| self.slope_denominator(r).unwrap_or_else(F::zero))
            .collect();
        par_batch_invert(&mut inverses, self.config.batch_inverse_chunk)
            .map_err(|e| SynthesisError::new(first_window, first.opcode(), e))?;

        let assignments = requests
            .par_iter()
            .zip(inverses.par_iter())
            .enumerate()
            .map(|(i, (request, inv))| {
                self.assign_with_inverse(request, (!inv.is_zero()).then_some(*inv))
                    .map_err(|e| SynthesisError::new(first_window + i, request.opcode(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let placed: Vec<&Assignment<F>> =
            assignments.iter().filter(|a| !a.is_structural()).collect();
        let opcodes: Vec<Opcode> = placed.iter().map(|a| a.opcode).collect();
        trace
            .reserve(&opcodes)
            .into_par_iter()
            .zip(placed.into_par_iter())
            .for_each(|(slot, assignment)| slot.rows.copy_from_slice(&assignment.rows));

        tracing::debug!(
            windows = opcodes.len(),
            structural = requests.len() - opcodes.len(),
            "committed batch"
        );
        Ok(assignments.into_iter().map(|a| a.output).collect())
    }

    /// [`Self::append`] for a conditional addition, returning the point.
    pub fn append_conditional_add(
        &self,
        trace: &mut Trace<F>,
        p1: &Point<F>,
        p2: &Point<F>,
        cond: F,
    ) -> Result<Point<F>, SynthesisError> {
        append_with(trace, Opcode::ConditionalAdd, || {
            self.conditional_add(p1, p2, cond, None)
        })
    }

    /// [`Self::append`] for a doubling, returning the point.
    pub fn append_double(&self, trace: &mut Trace<F>, p: &Point<F>) -> Result<Point<F>, SynthesisError> {
        append_with(trace, Opcode::Double, || self.double(p, None))
    }

    /// [`Self::append`] for an on-curve check, returning the point.
    pub fn append_on_curve(&self, trace: &mut Trace<F>, p: &Point<F>) -> Result<Point<F>, SynthesisError> {
        append_with(trace, Opcode::OnCurve, || Ok(self.on_curve(p)))
    }
}

/// Rows: `(x1, y1) | (x2, y2) | (value, high)` with
/// `high = (value - (x1 + 2y1 + 4x2 + 8y2)) / 16`.
fn partial_bit_decompose<F: GateField>(bits: [F; 4], value: F) -> Assigned<F, F> {
    if !bits.iter().all(|b| b.is_boolean()) {
        return Err(GateError::RangeError);
    }
    let [x1, y1, x2, y2] = bits;
    let low = x1 + y1.mul_u64(2) + x2.mul_u64(4) + y2.mul_u64(8);
    let high = (value - low) * invert(&F::from_u64(16))?;
    let rows = vec![
        Row::head(Opcode::PartialBitDecompose, x1, y1),
        Row::witness(x2, y2),
        Row::witness(value, high),
    ];
    Ok((rows, high))
}

/// Rows: `(a, b) | (c, 0)`.
fn field_op<F: GateField>(opcode: Opcode, a: F, b: F, c: F) -> (Vec<Row<F>>, F) {
    (vec![Row::head(opcode, a, b), Row::witness(c, F::zero())], c)
}

fn commit<F: GateField>(trace: &mut Trace<F>, assignment: Assignment<F>) -> GateOutput<F> {
    if assignment.is_structural() {
        tracing::debug!(opcode = %assignment.opcode, "resolved without rows");
        return assignment.output;
    }
    let mut slots = trace.reserve(&[assignment.opcode]);
    slots[0].rows.copy_from_slice(&assignment.rows);
    tracing::debug!(window = slots[0].index, opcode = %assignment.opcode, "committed window");
    assignment.output
}

fn append_with<F, T>(
    trace: &mut Trace<F>,
    opcode: Opcode,
    assign: impl FnOnce() -> Assigned<F, T>,
) -> Result<T, SynthesisError>
where
    F: GateField,
{
    let window = trace.num_windows();
    let (rows, output) = assign().map_err(|e| SynthesisError::new(window, opcode, e))?;
    if rows.is_empty() {
        tracing::debug!(opcode = %opcode, "resolved without rows");
    } else {
        for slot in trace.reserve(&[opcode]) {
            slot.rows.copy_from_slice(&rows);
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Fq, G1Projective};
    use ark_ec::CurveGroup;
    use ark_ff::{One, UniformRand, Zero};
    use ark_std::test_rng;

    fn fq(n: i64) -> Fq {
        <Fq as GateField>::from_i64(n)
    }

    fn synthesizer() -> Synthesizer<Fq> {
        Synthesizer::new(
            CurveParams::from_sw_config::<ark_bn254::g1::Config>().unwrap(),
            TraceConfig::default(),
        )
    }

    fn random_point(rng: &mut impl ark_std::rand::Rng) -> Point<Fq> {
        G1Projective::rand(rng).into_affine().into()
    }

    #[test]
    fn conditional_add_rows() {
        let mut rng = test_rng();
        let synth = synthesizer();
        let p1 = random_point(&mut rng);
        let p2 = random_point(&mut rng);

        let a = synth
            .assign(&GateRequest::ConditionalAdd { p1, p2, cond: Fq::one() })
            .unwrap();
        let p3 = synth.curve().add(&p1, &p2).unwrap();
        assert_eq!(a.output, GateOutput::Point(p3));
        assert_eq!(a.rows.len(), Opcode::ConditionalAdd.cost());
        assert_eq!(a.rows[0], Row::head(Opcode::ConditionalAdd, p1.x, p1.y));
        assert_eq!(a.rows[2], Row::witness(Fq::one(), Fq::zero()));
        assert_eq!(a.rows[3], Row::witness(p3.x, p3.y));

        let a = synth
            .assign(&GateRequest::ConditionalAdd { p1, p2, cond: Fq::zero() })
            .unwrap();
        assert_eq!(a.output, GateOutput::Point(p1));
        assert_eq!(a.rows[3], Row::witness(p1.x, p1.y));
    }

    #[test]
    fn structural_cases_have_no_rows() {
        let mut rng = test_rng();
        let synth = synthesizer();
        let p = random_point(&mut rng);
        let o = Point::identity();

        let cases = [
            (GateRequest::ConditionalAdd { p1: o, p2: p, cond: Fq::one() }, p),
            (GateRequest::ConditionalAdd { p1: p, p2: o, cond: Fq::one() }, p),
            (GateRequest::ConditionalAdd { p1: p, p2: p.neg(), cond: Fq::one() }, o),
            (GateRequest::Double { p: o }, o),
            (GateRequest::OnCurve { p: o }, o),
        ];
        for (request, expected) in cases {
            let a = synth.assign(&request).unwrap();
            assert!(a.is_structural(), "{request:?}");
            assert_eq!(a.output, GateOutput::Point(expected));
        }
    }

    #[test]
    fn conditional_add_of_equal_points_doubles() {
        let mut rng = test_rng();
        let synth = synthesizer();
        let p = random_point(&mut rng);
        let a = synth
            .assign(&GateRequest::ConditionalAdd { p1: p, p2: p, cond: Fq::one() })
            .unwrap();
        assert_eq!(a.output.as_point(), Some(synth.curve().double(&p).unwrap()));
        assert!(!a.is_structural());
    }

    #[test]
    fn invalid_inputs_rejected() {
        let mut rng = test_rng();
        let synth = synthesizer();
        let p = random_point(&mut rng);
        let off = Point::new(p.x, p.y + Fq::one());

        let err = |r: GateRequest<Fq>| synth.assign(&r).unwrap_err();
        assert_eq!(
            err(GateRequest::ConditionalAdd { p1: p, p2: p, cond: fq(2) }),
            GateError::InvalidCondition
        );
        assert_eq!(
            err(GateRequest::ConditionalAdd { p1: off, p2: p, cond: Fq::one() }),
            GateError::InvalidPoint
        );
        assert_eq!(
            err(GateRequest::ConditionalAdd { p1: p, p2: off, cond: Fq::zero() }),
            GateError::InvalidPoint
        );
        assert_eq!(err(GateRequest::Double { p: off }), GateError::InvalidPoint);
        assert_eq!(
            err(GateRequest::PartialBitDecompose {
                bits: [Fq::one(), fq(2), Fq::zero(), Fq::zero()],
                value: fq(5),
            }),
            GateError::RangeError
        );

        // OnCurve writes whatever it is given
        let a = synth.assign(&GateRequest::OnCurve { p: off }).unwrap();
        assert_eq!(a.rows, vec![Row::head(Opcode::OnCurve, off.x, off.y)]);
    }

    #[test]
    fn two_torsion_doubling_rejected() {
        let synth = Synthesizer::new(CurveParams::new(fq(8)), TraceConfig::default());
        let p = Point::new(fq(-2), Fq::zero());
        assert_eq!(
            synth.assign(&GateRequest::Double { p }).unwrap_err(),
            GateError::InvalidDoubling
        );
    }

    #[test]
    fn partial_bit_decompose_solves_high_part() {
        // 0b1011_0110: low nibble 0110 = [0, 1, 1, 0], high part 0b1011
        let a = synthesizer()
            .assign(&GateRequest::PartialBitDecompose {
                bits: [Fq::zero(), Fq::one(), Fq::one(), Fq::zero()],
                value: fq(0b1011_0110),
            })
            .unwrap();
        assert_eq!(a.output, GateOutput::Field(fq(0b1011)));
        assert_eq!(a.rows[2], Row::witness(fq(0b1011_0110), fq(0b1011)));
    }

    #[test]
    fn field_ops() {
        let synth = synthesizer();
        let add = synth.assign(&GateRequest::FieldAdd { a: fq(5), b: fq(7) }).unwrap();
        assert_eq!(add.output.as_field(), Some(fq(12)));
        assert_eq!(add.rows[1], Row::witness(fq(12), Fq::zero()));
        let mul = synth.assign(&GateRequest::FieldMul { a: fq(5), b: fq(7) }).unwrap();
        assert_eq!(mul.output.as_field(), Some(fq(35)));
        assert_eq!(mul.output.as_point(), None);
    }

    #[test]
    fn failed_append_leaves_trace_untouched() {
        let mut rng = test_rng();
        let synth = synthesizer();
        let mut trace = Trace::new();
        synth
            .append(&mut trace, &GateRequest::FieldAdd { a: fq(1), b: fq(2) })
            .unwrap();

        let p = random_point(&mut rng);
        let err = synth
            .append(&mut trace, &GateRequest::ConditionalAdd { p1: p, p2: p, cond: fq(3) })
            .unwrap_err();
        assert_eq!(err, SynthesisError::new(1, Opcode::ConditionalAdd, GateError::InvalidCondition));
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.num_windows(), 1);

        let requests = [
            GateRequest::Double { p },
            GateRequest::Double { p: Point::new(p.x, p.y + Fq::one()) },
        ];
        let err = synth.append_batch(&mut trace, &requests).unwrap_err();
        assert_eq!(err, SynthesisError::new(2, Opcode::Double, GateError::InvalidPoint));
        assert_eq!(trace.len(), 2);
    }
}

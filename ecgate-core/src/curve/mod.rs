//! Short Weierstrass curves `y^2 = x^3 + b` (`a = 0`) over the native field.
//!
//! The group law here is the reference the witness synthesizer uses to fill
//! rows. The gate itself never checks the slope form: the evaluator checks the
//! division-free identities exposed at the bottom of this module
//! ([`collinearity_residual`], [`tangent_residual`] and
//! [`CurveParams::on_curve_residual`]) so that every EC constraint stays at
//! degree <= 5 once multiplied by its selectors.
//!
//! The identities are satisfied by `p3 = -p1` as well as the sum: `(x1, -y1)`
//! zeroes both `y3 + y1` and `x3 - x1`, and lies on the curve whenever `p1`
//! does. The same holds for `-p2` in the collinearity residual. A window pins
//! its output to the group law only up to that choice.

use ark_ec::short_weierstrass::{Affine, SWCurveConfig};

use crate::field::{invert, GateField};
use crate::utils::errors::GateError;

/// An affine point. The identity has no finite coordinates; `x` and `y` are
/// zeroed and ignored whenever `infinity` is set.
#[derive(Clone, Copy, Debug)]
pub struct Point<F: GateField> {
    pub x: F,
    pub y: F,
    pub infinity: bool,
}

impl<F: GateField> Point<F> {
    pub fn new(x: F, y: F) -> Self {
        Self {
            x,
            y,
            infinity: false,
        }
    }

    pub fn identity() -> Self {
        Self {
            x: F::zero(),
            y: F::zero(),
            infinity: true,
        }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.infinity
    }

    pub fn neg(&self) -> Self {
        if self.infinity {
            *self
        } else {
            Self::new(self.x, -self.y)
        }
    }
}

impl<F: GateField> PartialEq for Point<F> {
    fn eq(&self, other: &Self) -> bool {
        match (self.infinity, other.infinity) {
            (true, true) => true,
            (false, false) => self.x == other.x && self.y == other.y,
            _ => false,
        }
    }
}

impl<F: GateField> Eq for Point<F> {}

impl<P> From<Affine<P>> for Point<P::BaseField>
where
    P: SWCurveConfig,
    P::BaseField: GateField,
{
    fn from(p: Affine<P>) -> Self {
        if p.infinity {
            Self::identity()
        } else {
            Self::new(p.x, p.y)
        }
    }
}

/// Curve context: the constant `b` of `y^2 = x^3 + b`. The modulus is the one
/// of `F`. Immutable once built and freely shared between threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurveParams<F: GateField> {
    pub b: F,
}

impl<F: GateField> CurveParams<F> {
    pub fn new(b: F) -> Self {
        Self { b }
    }

    /// Reads `b` from an arkworks curve configuration. Curves with a non-zero
    /// `a` coefficient are rejected.
    pub fn from_sw_config<P>() -> Result<Self, GateError>
    where
        P: SWCurveConfig<BaseField = F>,
    {
        if !P::COEFF_A.is_zero() {
            return Err(GateError::UnsupportedCurve);
        }
        Ok(Self::new(P::COEFF_B))
    }

    /// `y^2 - x^3 - b`
    #[inline]
    pub fn on_curve_residual(&self, x: F, y: F) -> F {
        y.square() - x.square() * x - self.b
    }

    pub fn is_on_curve(&self, p: &Point<F>) -> bool {
        p.infinity || self.on_curve_residual(p.x, p.y).is_zero()
    }

    /// Chord addition. Fails with [`GateError::VerticalLine`] when the inputs
    /// share an x coordinate without being inverses of each other; callers
    /// route that case to [`Self::double`] (see [`Self::sum`]).
    pub fn add(&self, p1: &Point<F>, p2: &Point<F>) -> Result<Point<F>, GateError> {
        if p1.infinity {
            return Ok(*p2);
        }
        if p2.infinity {
            return Ok(*p1);
        }
        if p1.x == p2.x {
            return if p1.y == -p2.y {
                Ok(Point::identity())
            } else {
                Err(GateError::VerticalLine)
            };
        }
        Ok(self.chord(p1, p2, invert(&(p2.x - p1.x))?))
    }

    /// Tangent doubling. The identity doubles to itself; a 2-torsion point
    /// has a vertical tangent and is rejected.
    pub fn double(&self, p: &Point<F>) -> Result<Point<F>, GateError> {
        if p.infinity {
            return Ok(*p);
        }
        if p.y.is_zero() {
            return Err(GateError::InvalidDoubling);
        }
        Ok(self.tangent(p, invert(&(p.y + p.y))?))
    }

    /// Third intersection of the chord through two finite points, reflected.
    /// `inv_dx` must be `(x2 - x1)^-1`.
    #[inline]
    pub fn chord(&self, p1: &Point<F>, p2: &Point<F>, inv_dx: F) -> Point<F> {
        let lambda = (p2.y - p1.y) * inv_dx;
        let x3 = lambda.square() - p1.x - p2.x;
        let y3 = lambda * (p1.x - x3) - p1.y;
        Point::new(x3, y3)
    }

    /// Doubling of a finite point given `inv_2y = (2y)^-1`.
    #[inline]
    pub fn tangent(&self, p: &Point<F>, inv_2y: F) -> Point<F> {
        let x_sq = p.x.square();
        let lambda = (x_sq + x_sq + x_sq) * inv_2y;
        let x3 = lambda.square() - p.x - p.x;
        let y3 = lambda * (p.x - x3) - p.y;
        Point::new(x3, y3)
    }

    /// Complete addition: [`Self::add`] with the vertical-line case recovered
    /// locally by doubling.
    pub fn sum(&self, p1: &Point<F>, p2: &Point<F>) -> Result<Point<F>, GateError> {
        match self.add(p1, p2) {
            Err(GateError::VerticalLine) => self.double(p1),
            res => res,
        }
    }

    /// `p1 + p2` if `cond == 1`, `p1` if `cond == 0`.
    pub fn conditional_add(
        &self,
        p1: &Point<F>,
        p2: &Point<F>,
        cond: F,
    ) -> Result<Point<F>, GateError> {
        if !cond.is_boolean() {
            return Err(GateError::InvalidCondition);
        }
        if cond.is_zero() {
            Ok(*p1)
        } else {
            self.sum(p1, p2)
        }
    }

    /// Double-and-add over little-endian `bits`, most significant bit first.
    pub fn scalar_mul(&self, p: &Point<F>, bits: &[bool]) -> Result<Point<F>, GateError> {
        bits.iter().rev().try_fold(Point::identity(), |acc, bit| {
            let acc = self.sum(&acc, &acc)?;
            if *bit {
                self.sum(&acc, p)
            } else {
                Ok(acc)
            }
        })
    }
}

/// `(x2 - x1)(y3 + y1) + (y2 - y1)(x3 - x1)`: zero iff `(x1, y1)`, `(x2, y2)`
/// and `(x3, -y3)` lie on one line. Degree 2.
#[inline]
pub fn collinearity_residual<F: GateField>(x1: F, y1: F, x2: F, y2: F, x3: F, y3: F) -> F {
    (x2 - x1) * (y3 + y1) + (y2 - y1) * (x3 - x1)
}

/// `2 y1 (y3 + y1) + 3 x1^2 (x3 - x1)`: zero iff `(x3, -y3)` lies on the
/// tangent at `(x1, y1)`. Degree 3. Also zero at `(x3, y3) = (x1, -y1)`.
#[inline]
pub fn tangent_residual<F: GateField>(x1: F, y1: F, x3: F, y3: F) -> F {
    let x1_sq = x1.square();
    (y1 + y1) * (y3 + y1) + (x1_sq + x1_sq + x1_sq) * (x3 - x1)
}

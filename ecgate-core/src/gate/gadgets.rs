//! Composite operations built from chains of windows.
//!
//! Windows are independent constraints; linking the output cells of one
//! window to the input cells of the next (copy constraints) is left to the
//! proving layer.

use crate::curve::Point;
use crate::field::{invert, GateField};
use crate::trace::Trace;
use crate::utils::errors::{GateError, SynthesisError};

use super::layout::Opcode;
use super::synthesizer::{GateRequest, Synthesizer};

/// Bits peeled off per [`Opcode::PartialBitDecompose`] window.
pub const BITS_PER_WINDOW: usize = 4;

/// Commits an on-curve window for `p`. Unlike a raw on-curve request, a point
/// off the curve is rejected up front.
pub fn load_point<F: GateField>(
    synth: &Synthesizer<F>,
    trace: &mut Trace<F>,
    p: &Point<F>,
) -> Result<Point<F>, SynthesisError> {
    if !synth.curve().is_on_curve(p) {
        return Err(SynthesisError::new(
            trace.num_windows(),
            Opcode::OnCurve,
            GateError::InvalidPoint,
        ));
    }
    synth.append_on_curve(trace, p)
}

/// Little-endian decomposition of `value` into `num_bits` bits, one
/// partial-decompose window per four bits. Each window consumes the high part
/// left by the previous one; the last high part is zero.
#[tracing::instrument(skip_all, name = "decompose", fields(num_bits = num_bits))]
pub fn decompose<F: GateField>(
    synth: &Synthesizer<F>,
    trace: &mut Trace<F>,
    value: F,
    num_bits: usize,
) -> Result<Vec<F>, SynthesisError> {
    let range_error = |e| SynthesisError::new(trace.num_windows(), Opcode::PartialBitDecompose, e);
    if value.num_bits() as usize > num_bits {
        return Err(range_error(GateError::RangeError));
    }
    let inv_16 = invert(&F::from_u64(16)).map_err(range_error)?;

    let num_windows = num_bits.div_ceil(BITS_PER_WINDOW);
    let mut requests = Vec::with_capacity(num_windows);
    let mut bits = Vec::with_capacity(num_windows * BITS_PER_WINDOW);
    let mut rest = value;
    for w in 0..num_windows {
        let chunk: [F; BITS_PER_WINDOW] =
            std::array::from_fn(|i| F::from_bool(value.bit(w * BITS_PER_WINDOW + i)));
        let low = chunk[0] + chunk[1].mul_u64(2) + chunk[2].mul_u64(4) + chunk[3].mul_u64(8);
        requests.push(GateRequest::PartialBitDecompose {
            bits: chunk,
            value: rest,
        });
        bits.extend_from_slice(&chunk);
        rest = (rest - low) * inv_16;
    }

    synth.append_batch(trace, &requests)?;
    bits.truncate(num_bits);
    Ok(bits)
}

/// `[scalar] p` by most-significant-bit-first double-and-add over the
/// `num_bits`-bit decomposition of `scalar`. Commits the on-curve check of
/// `p`, the decomposition, then one double and one conditional-add window per
/// bit (fewer while the accumulator is the identity).
#[tracing::instrument(skip_all, name = "scalar_mul", fields(num_bits = num_bits))]
pub fn scalar_mul<F: GateField>(
    synth: &Synthesizer<F>,
    trace: &mut Trace<F>,
    p: &Point<F>,
    scalar: F,
    num_bits: usize,
) -> Result<Point<F>, SynthesisError> {
    let p = load_point(synth, trace, p)?;
    let bits = decompose(synth, trace, scalar, num_bits)?;

    let mut acc = Point::identity();
    for bit in bits.iter().rev() {
        acc = synth.append_double(trace, &acc)?;
        acc = synth.append_conditional_add(trace, &acc, &p, *bit)?;
    }
    Ok(acc)
}

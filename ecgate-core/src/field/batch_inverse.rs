use rayon::prelude::*;
use std::iter::zip;

use super::{invert, GateField};
use crate::utils::errors::GateError;

/// Inverts every non-zero value of `values` in place using Montgomery batch
/// inversion: one true inversion plus three multiplications per element.
/// Zero entries are skipped and stay zero.
pub fn batch_invert<F: GateField>(values: &mut [F]) -> Result<(), GateError> {
    let mut prefix = vec![F::zero(); values.len()];
    let mut acc = F::one();
    zip(values.iter(), prefix.iter_mut())
        .filter(|(v, _)| !v.is_zero())
        .for_each(|(v, p)| {
            *p = acc;
            acc *= *v;
        });

    // acc is a product of non-zero elements, so this only fails if the
    // field implementation is broken
    let mut acc_inv = invert(&acc)?;
    zip(values.iter_mut(), prefix.iter())
        .rev()
        .filter(|(v, _)| !v.is_zero())
        .for_each(|(v, p)| {
            let inv = acc_inv * *p;
            acc_inv *= *v;
            *v = inv;
        });
    Ok(())
}

/// Splits `values` into independent batches of `chunk_size` and inverts the
/// batches concurrently.
#[tracing::instrument(skip_all, fields(len = values.len()))]
pub fn par_batch_invert<F: GateField>(values: &mut [F], chunk_size: usize) -> Result<(), GateError> {
    values
        .par_chunks_mut(chunk_size.max(1))
        .try_for_each(|chunk| batch_invert(chunk))
}

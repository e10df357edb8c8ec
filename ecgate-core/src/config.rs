use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use crate::utils::math::Math;

/// Configuration of trace synthesis and finalization. Only `min_log_rows`
/// affects the finalized columns; prover and verifier must agree on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct TraceConfig {
    /// Log of the smallest padded column length.
    pub min_log_rows: usize,

    /// Number of denominators inverted per batch during parallel synthesis.
    pub batch_inverse_chunk: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            min_log_rows: 4,
            batch_inverse_chunk: 4096,
        }
    }
}

impl TraceConfig {
    /// Column length of a finalized trace with `num_rows` rows.
    #[inline]
    pub fn padded_len(&self, num_rows: usize) -> usize {
        num_rows.next_power_of_two().max(self.min_log_rows.pow2())
    }

    pub fn log_padded_len(&self, num_rows: usize) -> usize {
        self.padded_len(num_rows).log_2()
    }
}

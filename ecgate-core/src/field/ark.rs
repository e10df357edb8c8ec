use ark_ff::{BigInteger, PrimeField, UniformRand};

use super::{FieldOps, GateField};

macro_rules! impl_gate_field {
    ($field:ty) => {
        impl FieldOps for $field {}
        impl FieldOps<&$field, $field> for &$field {}
        impl FieldOps<&$field, $field> for $field {}

        impl GateField for $field {
            fn random<R: rand_core::RngCore>(rng: &mut R) -> Self {
                <Self as UniformRand>::rand(rng)
            }

            #[inline]
            fn from_u64(n: u64) -> Self {
                <Self as From<u64>>::from(n)
            }

            #[inline]
            fn from_i64(val: i64) -> Self {
                if val.is_negative() {
                    -<Self as GateField>::from_u64(val.unsigned_abs())
                } else {
                    <Self as GateField>::from_u64(val as u64)
                }
            }

            #[inline]
            fn square(&self) -> Self {
                <Self as ark_ff::Field>::square(self)
            }

            #[inline]
            fn inverse(&self) -> Option<Self> {
                <Self as ark_ff::Field>::inverse(self)
            }

            fn bit(&self, i: usize) -> bool {
                self.into_bigint().get_bit(i)
            }

            fn num_bits(&self) -> u32 {
                self.into_bigint().num_bits()
            }
        }
    };
}

impl_gate_field!(ark_bn254::Fr);
impl_gate_field!(ark_bn254::Fq);

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Fq, Fr};
    use ark_std::{test_rng, One, Zero};

    #[test]
    fn signed_conversion() {
        let mut rng = test_rng();
        for _ in 0..256 {
            let x = rand_core::RngCore::next_u32(&mut rng) as i64;
            assert_eq!(
                <Fr as GateField>::from_i64(-x) + <Fr as GateField>::from_i64(x),
                Fr::zero()
            );
        }
        assert_eq!(<Fq as GateField>::from_i64(i64::MIN), -Fq::from(1u64 << 63));
    }

    #[test]
    fn bits_match_integer() {
        let v = <Fq as GateField>::from_u64(0b1011_0010);
        let bits: Vec<bool> = (0..8).map(|i| v.bit(i)).collect();
        assert_eq!(
            bits,
            vec![false, true, false, false, true, true, false, true]
        );
        assert_eq!(v.num_bits(), 8);
        assert!(Fq::one().is_boolean());
        assert!(!<Fq as GateField>::from_u64(2).is_boolean());
    }
}

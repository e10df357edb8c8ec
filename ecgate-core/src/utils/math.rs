pub trait Math {
    fn pow2(self) -> usize;
    fn log_2(self) -> usize;
}

impl Math for usize {
    #[inline]
    fn pow2(self) -> usize {
        let base: usize = 2;
        base.pow(self as u32)
    }

    /// Ceiling log2; `log_2(5) == 3`.
    fn log_2(self) -> usize {
        assert_ne!(self, 0);

        if self.is_power_of_two() {
            (1usize.leading_zeros() - self.leading_zeros()) as usize
        } else {
            (0usize.leading_zeros() - self.leading_zeros()) as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Math;

    #[test]
    fn log_2_rounds_up() {
        assert_eq!(1usize.log_2(), 0);
        assert_eq!(4usize.log_2(), 2);
        assert_eq!(5usize.log_2(), 3);
        assert_eq!(3usize.pow2(), 8);
    }
}

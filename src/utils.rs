use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftDirection, FftPlanner};

use crate::error::LftError;

/// A complex-to-complex transform plan of one fixed length and direction,
/// together with its own scratch space. Cloning gives an independent scratch
/// buffer sharing the same plan, so each worker thread can own one.
#[derive(Clone)]
pub struct FftHelper {
    len: usize,
    direction: FftDirection,
    plan: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl FftHelper {
    /// Plan an unnormalised forward transform of `len` samples.
    pub fn forward(len: usize) -> Result<Self, LftError> {
        Self::new(len, FftDirection::Forward)
    }

    /// Plan an inverse transform of `len` samples, scaled by `1/len` so that
    /// forward-then-inverse round-trips amplitude.
    pub fn inverse(len: usize) -> Result<Self, LftError> {
        Self::new(len, FftDirection::Inverse)
    }

    fn new(len: usize, direction: FftDirection) -> Result<Self, LftError> {
        if len == 0 {
            return Err(LftError::Computation(format!(
                "cannot plan a {direction:?} transform of length 0"
            )));
        }
        let mut planner = FftPlanner::new();
        let plan = planner.plan_fft(len, direction);

        let scratch_len = plan.get_inplace_scratch_len();
        let mut scratch = Vec::new();
        scratch.try_reserve_exact(scratch_len).map_err(|_| {
            LftError::Computation(format!(
                "failed to allocate {scratch_len} scratch samples for a {direction:?} transform of length {len}"
            ))
        })?;
        scratch.resize(scratch_len, Complex::new(0.0, 0.0));

        Ok(Self {
            len,
            direction,
            plan,
            scratch,
        })
    }

    /// Transform `buffer` in place.
    pub fn process(&mut self, buffer: &mut [Complex<f64>]) -> Result<(), LftError> {
        if buffer.len() != self.len {
            return Err(LftError::Computation(format!(
                "buffer of length {} does not match {:?} transform plan of length {}",
                buffer.len(),
                self.direction,
                self.len
            )));
        }
        self.plan.process_with_scratch(buffer, &mut self.scratch);
        if self.direction == FftDirection::Inverse {
            let scale = 1.0 / self.len as f64;
            for value in buffer.iter_mut() {
                *value *= scale;
            }
        }
        Ok(())
    }
}

/// Allocate a zero-filled complex buffer, reporting allocation failure
/// instead of aborting.
pub fn try_zeroed_buffer(len: usize, what: &str) -> Result<Vec<Complex<f64>>, LftError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|_| {
        LftError::ResourceExhaustion(format!("failed to allocate {len} samples for {what}"))
    })?;
    buffer.resize(len, Complex::new(0.0, 0.0));
    Ok(buffer)
}

/// Add the power `|z|^2` of each complex sample onto `dest`.
pub fn accumulate_power_add(dest: &mut [f64], src: &[Complex<f64>]) {
    debug_assert_eq!(dest.len(), src.len());
    for (acc, value) in dest.iter_mut().zip(src.iter()) {
        *acc += value.norm_sqr();
    }
}

/// Sum of `|z|^2` over the buffer.
pub fn total_energy(src: &[Complex<f64>]) -> f64 {
    src.iter().map(|z| z.norm_sqr()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn inverse_undoes_forward() {
        let original: Vec<Complex<f64>> = (0..12)
            .map(|i| Complex::new(i as f64, -(i as f64) * 0.5))
            .collect();
        let mut buffer = original.clone();
        FftHelper::forward(12).unwrap().process(&mut buffer).unwrap();
        FftHelper::inverse(12).unwrap().process(&mut buffer).unwrap();
        for (a, b) in buffer.iter().zip(original.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn forward_is_unnormalised() {
        let mut buffer = vec![Complex::new(1.0, 0.0); 8];
        FftHelper::forward(8).unwrap().process(&mut buffer).unwrap();
        assert_abs_diff_eq!(buffer[0].re, 8.0, epsilon = 1e-12);
        for z in &buffer[1..] {
            assert_abs_diff_eq!(z.norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn zero_length_plan_is_a_computation_error() {
        assert!(matches!(
            FftHelper::inverse(0),
            Err(LftError::Computation(_))
        ));
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let mut helper = FftHelper::forward(4).unwrap();
        let mut buffer = vec![Complex::new(0.0, 0.0); 5];
        assert!(matches!(
            helper.process(&mut buffer),
            Err(LftError::Computation(_))
        ));
    }

    #[test]
    fn impossible_allocation_is_resource_exhaustion() {
        assert!(matches!(
            try_zeroed_buffer(usize::MAX, "a buffer too large to exist"),
            Err(LftError::ResourceExhaustion(_))
        ));
        assert_eq!(try_zeroed_buffer(3, "three samples").unwrap().len(), 3);
    }

    #[test]
    fn power_accumulates() {
        let src = [Complex::new(3.0, 4.0), Complex::new(0.0, 1.0)];
        let mut dest = [1.0, 0.0];
        accumulate_power_add(&mut dest, &src);
        assert_eq!(dest, [26.0, 1.0]);
        assert_eq!(total_energy(&src), 26.0);
    }
}

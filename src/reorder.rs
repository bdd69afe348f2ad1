//! Frequency-bin ordering conventions.
//!
//! Transform libraries return spectra in *native* order:
//! `f[0], f[1], ... f[N/2], f[-(N-1)/2], ... f[-2], f[-1]`.
//! SFT files and the long transform use *centered* order:
//! `f[-(N-1)/2], ... f[-1], f[0], f[1], ... f[N/2]`.

use crate::error::LftError;

/// Number of DC + positive-frequency bins and of negative-frequency bins for
/// a buffer of `n` bins. The positive half rounds up.
pub fn half_split(n: usize) -> (usize, usize) {
    let nhalf_pos = (n as f64 / 2.0 + 0.5).floor() as usize;
    (nhalf_pos, n - nhalf_pos)
}

fn check_non_empty<T>(data: &[T]) -> Result<(), LftError> {
    if data.is_empty() {
        return Err(LftError::InvalidArgument(
            "cannot reorder an empty frequency buffer".into(),
        ));
    }
    Ok(())
}

/// Reorder a native-order spectrum into centered order, in place.
pub fn native_to_centered<T: Copy>(data: &mut [T]) -> Result<(), LftError> {
    check_non_empty(data)?;
    let (nhalf_pos, nhalf_neg) = half_split(data.len());
    let tmp = data.to_vec();
    data[..nhalf_neg].copy_from_slice(&tmp[nhalf_pos..]);
    data[nhalf_neg..].copy_from_slice(&tmp[..nhalf_pos]);
    Ok(())
}

/// Reorder a centered-order spectrum into native order, in place. Exact
/// inverse of [`native_to_centered`].
pub fn centered_to_native<T: Copy>(data: &mut [T]) -> Result<(), LftError> {
    check_non_empty(data)?;
    let (nhalf_pos, nhalf_neg) = half_split(data.len());
    let tmp = data.to_vec();
    data[nhalf_pos..].copy_from_slice(&tmp[..nhalf_neg]);
    data[..nhalf_pos].copy_from_slice(&tmp[nhalf_neg..]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_buffer(rng: &mut StdRng, n: usize) -> Vec<Complex<f64>> {
        (0..n)
            .map(|_| Complex::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
            .collect()
    }

    #[test]
    fn half_split_rounds_positive_half_up() {
        assert_eq!(half_split(1), (1, 0));
        assert_eq!(half_split(2), (1, 1));
        assert_eq!(half_split(4), (2, 2));
        assert_eq!(half_split(5), (3, 2));
        assert_eq!(half_split(101), (51, 50));
    }

    #[test]
    fn four_bins_swap_halves() {
        let mut x = [0, 1, 2, 3];
        native_to_centered(&mut x).unwrap();
        assert_eq!(x, [2, 3, 0, 1]);
    }

    #[test]
    fn five_bins_keep_extra_positive_bin() {
        let mut x = [0, 1, 2, 3, 4];
        native_to_centered(&mut x).unwrap();
        assert_eq!(x, [3, 4, 0, 1, 2]);
        centered_to_native(&mut x).unwrap();
        assert_eq!(x, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn reorder_is_invertible_both_ways() {
        let mut rng = StdRng::seed_from_u64(2009);
        for n in [1usize, 2, 3, 4, 5, 100, 101] {
            let original = random_buffer(&mut rng, n);

            let mut x = original.clone();
            native_to_centered(&mut x).unwrap();
            centered_to_native(&mut x).unwrap();
            assert_eq!(x, original, "native->centered->native, n = {n}");

            let mut y = original.clone();
            centered_to_native(&mut y).unwrap();
            native_to_centered(&mut y).unwrap();
            assert_eq!(y, original, "centered->native->centered, n = {n}");
        }
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let mut x: Vec<Complex<f64>> = vec![];
        assert!(matches!(
            native_to_centered(&mut x),
            Err(LftError::InvalidArgument(_))
        ));
        assert!(matches!(
            centered_to_native(&mut x),
            Err(LftError::InvalidArgument(_))
        ));
    }
}

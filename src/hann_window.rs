//! Hann analysis window, sized at runtime to the analysis block.

use core::f32::consts::PI;

use libm::cosf;

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

/// Fill a slice with Hann coefficients: `w[i] = 0.5 * (1 - cos(2πi/(N-1)))`.
///
/// A window of length 0 or 1 is all ones.
pub fn fill_hann_window(window: &mut [f32]) {
    let len = window.len();
    if len <= 1 {
        window.fill(1.0);
        return;
    }
    let denominator = (len - 1) as f32;
    for (i, coefficient) in window.iter_mut().enumerate() {
        *coefficient = 0.5 * (1.0 - cosf(2.0 * PI * i as f32 / denominator));
    }
}

/// Allocate a Hann window of the given length.
pub fn hann_window(len: usize) -> Vec<f32> {
    let mut window = vec![0.0; len];
    fill_hann_window(&mut window);
    window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_are_zero() {
        let window = hann_window(512);
        assert!(window[0].abs() < 1e-6);
        assert!(window[511].abs() < 1e-6);
    }

    #[test]
    fn test_midpoint_is_one() {
        // Odd length puts a sample exactly on the peak.
        let window = hann_window(513);
        assert!((window[256] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_symmetry() {
        let window = hann_window(64);
        for i in 0..32 {
            let left = window[i];
            let right = window[63 - i];
            assert!(
                (left - right).abs() < 1e-5,
                "window not symmetric at {} vs {}: {} vs {}",
                i,
                63 - i,
                left,
                right
            );
        }
    }

    #[test]
    fn test_degenerate_lengths() {
        assert!(hann_window(0).is_empty());
        assert_eq!(hann_window(1), [1.0]);
    }
}

//! Input preparation for the multi-band network
//!
//! The network processes the lower and upper halves of the spectrum in
//! separate encoders and sees an extra side channel (left minus right).

use ndarray::{s, Array4, ArrayView4, Axis};

use crate::error::{Result, SeparationError};

/// Frames trimmed from each side of the multi-band network's output
pub const MULTIBAND_OFFSET: usize = 160;

/// Split `[batch, channel, freq, time]` at `freq / 2`
///
/// # Returns
///
/// `(low, high)` with `low` holding bins `..freq / 2`
pub fn split_bands<A>(x: ArrayView4<'_, A>) -> (ArrayView4<'_, A>, ArrayView4<'_, A>) {
    let half = x.len_of(Axis(2)) / 2;
    x.split_at(Axis(2), half)
}

/// Channel 0 minus channel 1, as a single-channel `[batch, 1, freq, time]` tensor
///
/// # Errors
///
/// `InvalidInput` if `x` has fewer than two channels
pub fn stereo_difference(x: ArrayView4<f32>) -> Result<Array4<f32>> {
    if x.len_of(Axis(1)) < 2 {
        return Err(SeparationError::InvalidInput(format!(
            "Stereo difference needs 2 channels, got {}",
            x.len_of(Axis(1))
        )));
    }

    let left = x.slice(s![.., 0..1, .., ..]);
    let right = x.slice(s![.., 1..2, .., ..]);
    Ok(&left - &right)
}

/// Drop [`MULTIBAND_OFFSET`] frames from both ends of the time axis
///
/// # Errors
///
/// `ShapeMismatch` if there are not more than `2 * MULTIBAND_OFFSET` frames
pub fn trim_offset<A>(x: ArrayView4<'_, A>) -> Result<ArrayView4<'_, A>> {
    let frames = x.len_of(Axis(3));
    if frames <= 2 * MULTIBAND_OFFSET {
        return Err(SeparationError::ShapeMismatch(format!(
            "Need more than {} frames to trim the network offset, got {}",
            2 * MULTIBAND_OFFSET,
            frames
        )));
    }
    Ok(x.slice_move(s![.., .., .., MULTIBAND_OFFSET..frames - MULTIBAND_OFFSET]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_bands_halves() {
        let x = Array4::from_shape_fn((1, 2, 9, 3), |(_, _, f, _)| f as f32);
        let (low, high) = split_bands(x.view());
        assert_eq!(low.dim(), (1, 2, 4, 3));
        assert_eq!(high.dim(), (1, 2, 5, 3));
        assert_eq!(low[[0, 0, 3, 0]], 3.0);
        assert_eq!(high[[0, 1, 0, 2]], 4.0);
    }

    #[test]
    fn test_stereo_difference() {
        let x = Array4::from_shape_fn((2, 2, 3, 4), |(_, c, f, t)| {
            if c == 0 {
                (f + t) as f32
            } else {
                t as f32
            }
        });
        let side = stereo_difference(x.view()).unwrap();
        assert_eq!(side.dim(), (2, 1, 3, 4));
        assert_eq!(side[[1, 0, 2, 3]], 2.0);
        assert_eq!(side[[0, 0, 0, 1]], 0.0);
    }

    #[test]
    fn test_stereo_difference_needs_two_channels() {
        let x = Array4::<f32>::zeros((1, 1, 2, 2));
        assert!(matches!(
            stereo_difference(x.view()),
            Err(SeparationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_trim_offset() {
        let x = Array4::from_shape_fn((1, 1, 1, 400), |(_, _, _, t)| t as f32);
        let trimmed = trim_offset(x.view()).unwrap();
        assert_eq!(trimmed.len_of(Axis(3)), 80);
        assert_eq!(trimmed[[0, 0, 0, 0]], 160.0);

        let short = Array4::<f32>::zeros((1, 1, 1, 320));
        assert!(trim_offset(short.view()).is_err());
    }
}

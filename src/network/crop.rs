//! Crop-and-concatenate for skip connections
//!
//! Encoder features are longer in time than the decoder features they are
//! merged with. The encoder side is cropped symmetrically to the decoder's
//! length before the two are joined along the channel axis.

use ndarray::{concatenate, s, Array4, ArrayView4, Axis};

use crate::error::{Result, SeparationError};

/// What [`reconcile`] returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropMode {
    /// Primary followed by the cropped secondary along the channel axis
    Concat,
    /// The cropped secondary alone
    CropOnly,
}

/// Crop `secondary`'s time axis to `primary`'s length and optionally concatenate
///
/// Both tensors are indexed `[batch, channel, freq, time]`. The crop keeps
/// `secondary[.., .., .., start..start + t1]` with `start = (t2 - t1) / 2`.
///
/// # Errors
///
/// `ShapeMismatch` if `secondary` is shorter in time than `primary`, or if
/// batch/freq sizes disagree when concatenating
pub fn reconcile<'a, A: Clone>(
    primary: ArrayView4<'a, A>,
    secondary: ArrayView4<'a, A>,
    mode: CropMode,
) -> Result<Array4<A>> {
    let t1 = primary.len_of(Axis(3));
    let t2 = secondary.len_of(Axis(3));
    if t2 < t1 {
        return Err(SeparationError::ShapeMismatch(format!(
            "Cannot crop {} time steps down to {}",
            t2, t1
        )));
    }

    let start = (t2 - t1) / 2;
    let cropped = secondary.slice_move(s![.., .., .., start..start + t1]);

    match mode {
        CropMode::CropOnly => Ok(cropped.to_owned()),
        CropMode::Concat => concatenate(Axis(1), &[primary, cropped]).map_err(|e| {
            SeparationError::ShapeMismatch(format!(
                "Cannot concatenate {:?} with {:?}: {}",
                primary.shape(),
                cropped.shape(),
                e
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(shape: (usize, usize, usize, usize)) -> Array4<f32> {
        Array4::from_shape_fn(shape, |(_, _, _, t)| t as f32)
    }

    #[test]
    fn test_crop_removes_equal_margins() {
        let primary = Array4::<f32>::zeros((1, 2, 3, 10));
        let secondary = ramp((1, 4, 3, 14));

        let cropped = reconcile(primary.view(), secondary.view(), CropMode::CropOnly).unwrap();
        assert_eq!(cropped.dim(), (1, 4, 3, 10));
        assert_eq!(cropped[[0, 0, 0, 0]], 2.0);
        assert_eq!(cropped[[0, 3, 2, 9]], 11.0);
    }

    #[test]
    fn test_odd_difference_rounds_start_down() {
        let primary = Array4::<f32>::zeros((1, 1, 1, 4));
        let secondary = ramp((1, 1, 1, 7));
        let cropped = reconcile(primary.view(), secondary.view(), CropMode::CropOnly).unwrap();
        assert_eq!(cropped[[0, 0, 0, 0]], 1.0);
    }

    #[test]
    fn test_concat_stacks_channels() {
        let primary = Array4::<f32>::from_elem((2, 3, 5, 10), -1.0);
        let secondary = ramp((2, 4, 5, 14));

        let merged = reconcile(primary.view(), secondary.view(), CropMode::Concat).unwrap();
        assert_eq!(merged.dim(), (2, 7, 5, 10));
        assert_eq!(merged[[1, 2, 4, 9]], -1.0);
        assert_eq!(merged[[1, 3, 0, 0]], 2.0);
    }

    #[test]
    fn test_equal_lengths_pass_through() {
        let primary = Array4::<f32>::zeros((1, 1, 2, 6));
        let secondary = ramp((1, 1, 2, 6));
        let cropped = reconcile(primary.view(), secondary.view(), CropMode::CropOnly).unwrap();
        assert_eq!(cropped, secondary);
    }

    #[test]
    fn test_concat_of_views_into_separate_arrays() {
        let primary = Array4::<f32>::ones((1, 1, 2, 3));
        let merged = {
            let secondary = ramp((1, 2, 2, 5));
            reconcile(primary.view(), secondary.view(), CropMode::Concat).unwrap()
        };
        assert_eq!(merged.dim(), (1, 3, 2, 3));
        assert_eq!(merged[[0, 0, 1, 2]], 1.0);
        assert_eq!(merged[[0, 2, 1, 0]], 1.0);
        assert_eq!(merged[[0, 2, 1, 2]], 3.0);
    }

    #[test]
    fn test_shorter_secondary_rejected() {
        let primary = Array4::<f32>::zeros((1, 1, 1, 10));
        let secondary = Array4::<f32>::zeros((1, 1, 1, 8));
        let result = reconcile(primary.view(), secondary.view(), CropMode::Concat);
        assert!(matches!(result, Err(SeparationError::ShapeMismatch(_))));
    }

    #[test]
    fn test_concat_freq_mismatch_rejected() {
        let primary = Array4::<f32>::zeros((1, 1, 4, 10));
        let secondary = Array4::<f32>::zeros((1, 1, 5, 12));
        let result = reconcile(primary.view(), secondary.view(), CropMode::Concat);
        assert!(matches!(result, Err(SeparationError::ShapeMismatch(_))));
    }
}

//! Applying masks to mixture spectrograms

use ndarray::Array3;

use crate::error::{Result, SeparationError};
use crate::spectral::{synthesize, Magnitude, Phase};
use crate::Waveform;

fn check_shapes(mask: &Array3<f32>, magnitude: &Magnitude) -> Result<()> {
    if mask.dim() != magnitude.dim() {
        return Err(SeparationError::ShapeMismatch(format!(
            "Mask shape {:?} does not match magnitude shape {:?}",
            mask.shape(),
            magnitude.shape()
        )));
    }
    Ok(())
}

/// Element-wise product of a mask and a mixture magnitude
pub fn apply_mask(mask: &Array3<f32>, mixture: &Magnitude) -> Result<Magnitude> {
    check_shapes(mask, mixture)?;
    Ok(mask * mixture)
}

/// Mask of the residual source: `1 - mask`
pub fn complement(mask: &Array3<f32>) -> Array3<f32> {
    mask.mapv(|m| 1.0 - m)
}

/// Estimate a source waveform from a mask and the mixture spectrogram
///
/// The masked magnitude is resynthesized with the mixture's own phase.
///
/// # Errors
///
/// `ShapeMismatch` if the mask, magnitude and phase disagree, plus any
/// error from [`synthesize`]
pub fn reconstruct(
    mask: &Array3<f32>,
    mixture: &Magnitude,
    mixture_phase: &Phase,
    hop_length: usize,
) -> Result<Waveform> {
    let masked = apply_mask(mask, mixture)?;
    synthesize(&masked, mixture_phase, hop_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::analyze_with_phase;
    use ndarray::Array2;

    #[test]
    fn test_apply_and_complement_sum_to_mixture() {
        let mixture = Array3::from_shape_fn((2, 3, 4), |(c, f, t)| (c + f * t) as f32);
        let mask = Array3::from_shape_fn((2, 3, 4), |(_, f, t)| ((f + t) % 3) as f32 / 2.0);

        let source = apply_mask(&mask, &mixture).unwrap();
        let residual = apply_mask(&complement(&mask), &mixture).unwrap();
        for ((s, r), m) in source.iter().zip(residual.iter()).zip(mixture.iter()) {
            assert!((s + r - m).abs() < 1e-6);
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let mask = Array3::<f32>::ones((2, 3, 4));
        let mixture = Array3::<f32>::ones((2, 3, 5));
        assert!(matches!(
            apply_mask(&mask, &mixture),
            Err(SeparationError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_unit_mask_reconstructs_mixture() {
        let hop = 64;
        let samples = hop * 30;
        let waveform = Array2::from_shape_fn((2, samples), |(c, i)| {
            (i as f32 * 0.07 + c as f32).sin() * 0.4
        });
        let (magnitude, phase) = analyze_with_phase(&waveform, hop).unwrap();
        let mask = Array3::<f32>::ones(magnitude.dim());

        let rebuilt = reconstruct(&mask, &magnitude, &phase, hop).unwrap();
        assert_eq!(rebuilt.nrows(), 2);

        let edge = 2 * hop;
        for i in edge..rebuilt.ncols() - edge {
            assert!((rebuilt[[0, i]] - waveform[[0, i]]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_zero_mask_is_silent() {
        let hop = 32;
        let waveform = Array2::from_shape_fn((2, hop * 20), |(_, i)| (i as f32 * 0.2).cos());
        let (magnitude, phase) = analyze_with_phase(&waveform, hop).unwrap();
        let mask = Array3::<f32>::zeros(magnitude.dim());

        let rebuilt = reconstruct(&mask, &magnitude, &phase, hop).unwrap();
        assert!(rebuilt.iter().all(|&v| v.abs() < 1e-6));
    }
}

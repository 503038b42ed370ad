//! Joint peak normalization of mixture/instrument spectrograms
//!
//! Both magnitudes are divided by one shared coefficient, the largest value
//! found in either array, so the loudness of the instrument relative to the
//! mixture survives normalization.
//!
//! # Example
//!
//! ```no_run
//! use ndarray::Array3;
//! use stratum_sep::preprocessing::normalization::SpectrogramPair;
//!
//! let mixture = Array3::<f32>::from_elem((2, 513, 100), 4.0);
//! let instrument = Array3::<f32>::from_elem((2, 513, 100), 2.0);
//! let pair = SpectrogramPair::normalized(mixture, instrument)?;
//! assert_eq!(pair.coefficient, 4.0);
//! # Ok::<(), stratum_sep::SeparationError>(())
//! ```

use crate::error::{Result, SeparationError};
use crate::spectral::Magnitude;

/// Mixture and instrument magnitudes sharing one normalization coefficient
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramPair {
    /// Normalized mixture magnitude `[2, bins, frames]`
    pub mixture: Magnitude,

    /// Normalized instrument magnitude, same shape as `mixture`
    pub instrument: Magnitude,

    /// Coefficient both arrays were divided by
    pub coefficient: f32,
}

/// Largest value of a magnitude array (0.0 when empty)
fn peak(magnitude: &Magnitude) -> f32 {
    magnitude.iter().copied().fold(0.0f32, f32::max)
}

impl SpectrogramPair {
    /// Normalize a raw mixture/instrument pair by their joint maximum
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the two arrays differ in shape
    /// - `NumericalError` if both arrays are entirely zero
    pub fn normalized(mixture: Magnitude, instrument: Magnitude) -> Result<Self> {
        if mixture.dim() != instrument.dim() {
            return Err(SeparationError::ShapeMismatch(format!(
                "Mixture shape {:?} does not match instrument shape {:?}",
                mixture.shape(),
                instrument.shape()
            )));
        }

        let coefficient = peak(&mixture).max(peak(&instrument));
        if coefficient <= 0.0 || !coefficient.is_finite() {
            return Err(SeparationError::NumericalError(format!(
                "Cannot normalize spectrogram pair with peak {}",
                coefficient
            )));
        }

        log::debug!(
            "Joint normalization: shape {:?}, coefficient={:.6}",
            mixture.shape(),
            coefficient
        );

        Ok(Self {
            mixture: mixture / coefficient,
            instrument: instrument / coefficient,
            coefficient,
        })
    }

    /// Shape shared by both arrays
    pub fn shape(&self) -> (usize, usize, usize) {
        self.mixture.dim()
    }
}

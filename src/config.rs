//! Configuration parameters for spectrogram preparation and mask refinement

use serde::{Deserialize, Serialize};

use crate::preprocessing::silence::SilenceTrimmer;

/// Parameters used when building a cached spectrogram pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparationConfig {
    /// Target sample rate in Hz; audio is resampled to this rate (default: 44100)
    pub sample_rate: u32,

    /// STFT hop length in samples (default: 1024)
    /// The FFT size is derived from it as `2 * (hop_length - 1)`
    pub hop_length: usize,

    /// Leading/trailing silence trimming applied before alignment
    pub silence: SilenceTrimmer,
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            hop_length: 1024,
            silence: SilenceTrimmer::default(),
        }
    }
}

impl PreparationConfig {
    /// FFT size implied by the hop length
    pub fn n_fft(&self) -> usize {
        crate::spectral::n_fft_for_hop(self.hop_length)
    }
}

/// Mask refinement parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskRefineConfig {
    /// A low-energy run must be strictly longer than this many frames (default: 64)
    pub min_range: usize,

    /// Frames whose mean reference magnitude is below this are low-energy (default: 0.4)
    pub threshold: f32,

    /// Width of the fade-in/fade-out ramps in frames (default: 32)
    pub fade_width: usize,
}

impl Default for MaskRefineConfig {
    fn default() -> Self {
        Self {
            min_range: 64,
            threshold: 0.4,
            fade_width: 32,
        }
    }
}

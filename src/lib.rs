//! # Stratum Sep
//!
//! Data preparation and mask post-processing for stereo music source
//! separation: turning mixture/instrument recordings into aligned, jointly
//! normalized magnitude spectrograms, and smoothing the masks a separation
//! network predicts from them.
//!
//! ## Features
//!
//! - **STFT**: magnitude/phase analysis with `n_fft = 2 * (hop - 1)` and overlap-add resynthesis
//! - **Alignment**: FFT cross-correlation delay estimation between mixture and stem
//! - **Spectrogram Cache**: `.npy` files beside the audio, joint peak normalization
//! - **Mask Refinement**: fade-in/fade-out blending over long low-energy runs
//! - **Network Contracts**: crop-and-concatenate and band splitting on 4-D tensors
//!
//! ## Quick Start
//!
//! ```no_run
//! use stratum_sep::{prepare_pair, PreparationConfig};
//!
//! let pair = prepare_pair(
//!     "dataset/mixtures/song01.wav".as_ref(),
//!     "dataset/instruments/song01.wav".as_ref(),
//!     &PreparationConfig::default(),
//! )?;
//!
//! println!("Spectrogram {:?}, coefficient {:.3}", pair.shape(), pair.coefficient);
//! # Ok::<(), stratum_sep::SeparationError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Audio → Decode/Resample → Trim Silence → Align → STFT → Cache → Normalize
//!                                         Predicted Mask → Refine → Apply → ISTFT
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod error;
pub mod io;
pub mod masking;
pub mod network;
pub mod preprocessing;
pub mod spectral;

use std::path::Path;

use ndarray::Array2;

pub use cache::SpectrogramCache;
pub use config::{MaskRefineConfig, PreparationConfig};
pub use error::{Result, SeparationError};
pub use preprocessing::normalization::SpectrogramPair;
pub use spectral::{Magnitude, Phase};

/// Stereo waveform indexed `[channel, sample]`, amplitudes roughly in [-1, 1]
pub type Waveform = Array2<f32>;

/// Prepare one mixture/instrument pair with the on-disk cache
///
/// Decodes with Symphonia, caches raw magnitudes as `.npy` files next to the
/// audio, and returns the jointly normalized pair.
///
/// # Arguments
///
/// * `mixture_path` - Mixture recording
/// * `instrument_path` - Isolated instrument recording
/// * `config` - Sample rate, hop length and silence trimming parameters
///
/// # Errors
///
/// Returns `SeparationError` if decoding, caching or normalization fails
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use stratum_sep::{prepare_pair, PreparationConfig};
///
/// let config = PreparationConfig {
///     hop_length: 512,
///     ..Default::default()
/// };
/// let pair = prepare_pair(Path::new("mix.flac"), Path::new("vocals.flac"), &config)?;
/// assert_eq!(pair.shape().1, 512);
/// # Ok::<(), stratum_sep::SeparationError>(())
/// ```
pub fn prepare_pair(
    mixture_path: &Path,
    instrument_path: &Path,
    config: &PreparationConfig,
) -> Result<SpectrogramPair> {
    log::debug!(
        "Preparing pair {} / {} at {} Hz, hop {}",
        mixture_path.display(),
        instrument_path.display(),
        config.sample_rate,
        config.hop_length
    );

    SpectrogramCache::on_disk()
        .with_silence(config.silence.clone())
        .load_or_compute(
            mixture_path,
            instrument_path,
            config.sample_rate,
            config.hop_length,
        )
}

//! Time-frequency transforms
//!
//! - Short-time Fourier transform producing magnitude and unit phase
//! - Inverse transform from magnitude and phase back to a stereo waveform
//! - Window and padding helpers shared with frame-based preprocessing

pub mod stft;
pub mod window;

use ndarray::Array3;
use rustfft::num_complex::Complex32;

/// Magnitude spectrogram indexed `[channel, frequency_bin, time_frame]`
pub type Magnitude = Array3<f32>;

/// Unit-modulus phase spectrogram, same indexing as [`Magnitude`]
pub type Phase = Array3<Complex32>;

/// FFT size used for a given hop length: `2 * (hop_length - 1)`
///
/// The spectrum then has exactly `hop_length` frequency bins.
pub fn n_fft_for_hop(hop_length: usize) -> usize {
    2 * hop_length.saturating_sub(1)
}

pub use stft::{analyze, analyze_with_phase, complex_spectrum, synthesize};

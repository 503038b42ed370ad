//! Stereo short-time Fourier transform and its inverse
//!
//! The FFT size is tied to the hop length: `n_fft = 2 * (hop_length - 1)`,
//! giving exactly `hop_length` frequency bins per frame. Frames are centered
//! (the signal is reflect-padded by `n_fft / 2` on both sides) and weighted
//! with a periodic Hann window.
//!
//! # Example
//!
//! ```no_run
//! use ndarray::Array2;
//! use stratum_sep::spectral::{analyze_with_phase, synthesize};
//!
//! let waveform = Array2::<f32>::zeros((2, 44100));
//! let (magnitude, phase) = analyze_with_phase(&waveform, 1024)?;
//! let restored = synthesize(&magnitude, &phase, 1024)?;
//! # Ok::<(), stratum_sep::SeparationError>(())
//! ```

use ndarray::{Array2, Array3, ArrayView2, Zip};
use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

use super::window::{centered_frame_count, hann_window, reflect_pad};
use super::{n_fft_for_hop, Magnitude, Phase};
use crate::error::{Result, SeparationError};
use crate::Waveform;

/// Number of channels every transform in this module works on
const STEREO: usize = 2;

fn validate_waveform(waveform: ArrayView2<'_, f32>, hop_length: usize) -> Result<usize> {
    if hop_length < 2 {
        return Err(SeparationError::InvalidInput(format!(
            "Hop length must be >= 2, got {}",
            hop_length
        )));
    }

    let (channels, samples) = waveform.dim();
    if channels != STEREO {
        return Err(SeparationError::InvalidInput(format!(
            "Expected a 2-channel waveform, got {} channels",
            channels
        )));
    }

    let n_fft = n_fft_for_hop(hop_length);
    if samples < n_fft {
        return Err(SeparationError::InvalidInput(format!(
            "Waveform has {} samples, need at least {} (n_fft)",
            samples, n_fft
        )));
    }

    Ok(n_fft)
}

/// Compute the complex STFT of a stereo waveform
///
/// # Returns
///
/// Complex spectrum `[2, hop_length, 1 + samples / hop_length]`
///
/// # Errors
///
/// `InvalidInput` if the waveform is not stereo, is shorter than `n_fft`
/// samples, or `hop_length < 2`
pub fn complex_spectrum(waveform: &Waveform, hop_length: usize) -> Result<Array3<Complex32>> {
    let n_fft = validate_waveform(waveform.view(), hop_length)?;
    let samples = waveform.ncols();
    let bins = n_fft / 2 + 1;
    let frames = centered_frame_count(samples, hop_length);

    log::debug!(
        "Computing STFT: {} samples, n_fft={}, hop={}, {} bins x {} frames",
        samples,
        n_fft,
        hop_length,
        bins,
        frames
    );

    let window = hann_window(n_fft);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let mut scratch = vec![Complex32::default(); fft.get_inplace_scratch_len()];
    let mut buffer = vec![Complex32::default(); n_fft];

    let mut spectrum = Array3::<Complex32>::zeros((STEREO, bins, frames));

    for (ch, row) in waveform.outer_iter().enumerate() {
        let channel: Vec<f32> = row.to_vec();
        let padded = reflect_pad(&channel, n_fft / 2);

        for t in 0..frames {
            let start = t * hop_length;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex32::new(padded[start + i] * window[i], 0.0);
            }

            fft.process_with_scratch(&mut buffer, &mut scratch);

            for (k, value) in buffer.iter().take(bins).enumerate() {
                spectrum[[ch, k, t]] = *value;
            }
        }
    }

    Ok(spectrum)
}

fn unit_phasor(c: Complex32) -> Complex32 {
    let norm = c.norm();
    if norm > 0.0 {
        c / norm
    } else {
        Complex32::new(1.0, 0.0)
    }
}

/// Magnitude spectrogram `|STFT|` of a stereo waveform
///
/// See [`complex_spectrum`] for shape and error conditions.
pub fn analyze(waveform: &Waveform, hop_length: usize) -> Result<Magnitude> {
    let spectrum = complex_spectrum(waveform, hop_length)?;
    Ok(spectrum.mapv(|c| c.norm()))
}

/// Magnitude and unit phasor `exp(i·angle(STFT))` of a stereo waveform
///
/// Bins with zero energy get phase `1 + 0i`.
pub fn analyze_with_phase(waveform: &Waveform, hop_length: usize) -> Result<(Magnitude, Phase)> {
    let spectrum = complex_spectrum(waveform, hop_length)?;
    let magnitude = spectrum.mapv(|c| c.norm());
    let phase = spectrum.mapv(unit_phasor);
    Ok((magnitude, phase))
}

/// Reconstruct a stereo waveform from magnitude and phase
///
/// Each channel is the inverse STFT of `magnitude ⊙ phase`, overlap-added and
/// normalized by the squared-window sum. The FFT size is inferred from the
/// bin count, and the output holds `hop_length * (frames - 1)` samples.
///
/// # Errors
///
/// - `ShapeMismatch` if magnitude and phase shapes differ
/// - `InvalidInput` for non-stereo input, fewer than 2 bins, no frames, or a
///   zero hop length
pub fn synthesize(magnitude: &Magnitude, phase: &Phase, hop_length: usize) -> Result<Waveform> {
    if magnitude.dim() != phase.dim() {
        return Err(SeparationError::ShapeMismatch(format!(
            "Magnitude shape {:?} does not match phase shape {:?}",
            magnitude.shape(),
            phase.shape()
        )));
    }

    let (channels, bins, frames) = magnitude.dim();
    if channels != STEREO {
        return Err(SeparationError::InvalidInput(format!(
            "Expected a 2-channel spectrogram, got {} channels",
            channels
        )));
    }
    if bins < 2 || frames == 0 {
        return Err(SeparationError::InvalidInput(format!(
            "Spectrogram too small to invert: {} bins x {} frames",
            bins, frames
        )));
    }
    if hop_length == 0 {
        return Err(SeparationError::InvalidInput(
            "Hop length must be > 0".to_string(),
        ));
    }

    let n_fft = 2 * (bins - 1);
    let padded_len = n_fft + hop_length * (frames - 1);
    let output_len = hop_length * (frames - 1);

    log::debug!(
        "Computing inverse STFT: {} bins x {} frames, n_fft={}, hop={} -> {} samples",
        bins,
        frames,
        n_fft,
        hop_length,
        output_len
    );

    let mut spectrum = Array3::<Complex32>::zeros(magnitude.raw_dim());
    Zip::from(&mut spectrum)
        .and(magnitude)
        .and(phase)
        .for_each(|out, &mag, &ph| *out = ph * mag);

    let window = hann_window(n_fft);
    let mut planner = FftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(n_fft);
    let mut scratch = vec![Complex32::default(); ifft.get_inplace_scratch_len()];
    let mut buffer = vec![Complex32::default(); n_fft];
    let scale = 1.0 / n_fft as f32;

    // Squared-window envelope is the same for both channels
    let mut window_sum = vec![0.0f32; padded_len];
    for t in 0..frames {
        let start = t * hop_length;
        for (i, &w) in window.iter().enumerate() {
            window_sum[start + i] += w * w;
        }
    }

    let mut output = Array2::<f32>::zeros((STEREO, output_len));

    for ch in 0..STEREO {
        let mut accum = vec![0.0f32; padded_len];

        for t in 0..frames {
            for k in 0..bins {
                buffer[k] = spectrum[[ch, k, t]];
            }
            // Negative frequencies are the conjugate mirror of the positive half
            for k in 1..bins - 1 {
                buffer[n_fft - k] = spectrum[[ch, k, t]].conj();
            }

            ifft.process_with_scratch(&mut buffer, &mut scratch);

            let start = t * hop_length;
            for (i, &w) in window.iter().enumerate() {
                accum[start + i] += buffer[i].re * scale * w;
            }
        }

        for (value, &ws) in accum.iter_mut().zip(window_sum.iter()) {
            if ws > f32::MIN_POSITIVE {
                *value /= ws;
            }
        }

        let offset = n_fft / 2;
        for (i, sample) in output.row_mut(ch).iter_mut().enumerate() {
            *sample = accum[offset + i];
        }
    }

    Ok(output)
}

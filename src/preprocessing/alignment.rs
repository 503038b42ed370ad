//! Cross-correlation alignment of two stereo recordings
//!
//! A mixture and its isolated-instrument stem usually come from different
//! renders and start at slightly different offsets. The delay is estimated
//! from the first seconds of both signals and the leading samples of the
//! later one are dropped, then both are cut to a common length.
//!
//! # Algorithm
//!
//! 1. Sum each signal's channels to mono over a short preview (2 s)
//! 2. Remove the preview mean
//! 3. Full cross-correlation, computed via FFT: `R = IFFT(FFT(a) · conj(FFT(b)))`
//! 4. `delay = argmax(R) - (len(a_preview) - 1)`
//! 5. Trim `delay` samples from `a` (positive) or `|delay|` from `b` (otherwise)
//! 6. Truncate both to the shorter length
//!
//! # Example
//!
//! ```no_run
//! use ndarray::Array2;
//! use stratum_sep::preprocessing::alignment::align;
//!
//! let mixture = Array2::<f32>::zeros((2, 44100 * 10));
//! let instrument = Array2::<f32>::zeros((2, 44100 * 10));
//! let (mixture, instrument) = align(&mixture, &instrument, 44100)?;
//! assert_eq!(mixture.ncols(), instrument.ncols());
//! # Ok::<(), stratum_sep::SeparationError>(())
//! ```

use ndarray::s;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::channel_mixer::{to_mono, ChannelMixMode};
use crate::error::{Result, SeparationError};
use crate::Waveform;

/// Length of the correlation preview in seconds
pub const PREVIEW_SECONDS: u32 = 2;

/// Energy below which a centered preview is treated as silent
const EPSILON: f64 = 1e-12;

fn validate(waveform: &Waveform, name: &str) -> Result<()> {
    if waveform.nrows() != 2 {
        return Err(SeparationError::InvalidInput(format!(
            "Expected 2-channel {} waveform, got {} channels",
            name,
            waveform.nrows()
        )));
    }
    if waveform.ncols() == 0 {
        return Err(SeparationError::InvalidInput(format!(
            "Empty {} waveform",
            name
        )));
    }
    Ok(())
}

fn centered_preview(waveform: &Waveform, preview_len: usize) -> Vec<f64> {
    let len = preview_len.min(waveform.ncols());
    let mono = to_mono(waveform.slice(s![.., ..len]), ChannelMixMode::Sum);
    let mean = mono.iter().map(|&x| x as f64).sum::<f64>() / mono.len().max(1) as f64;
    mono.iter().map(|&x| x as f64 - mean).collect()
}

/// Index of the maximum of `numpy.correlate(a, v, "full")`
///
/// Entry `i` of the full correlation is `sum_n a[n + k] * v[n]` with
/// `k = i - (len(v) - 1)`. The first index wins on ties.
fn full_correlation_argmax(a: &[f64], v: &[f64]) -> usize {
    let full_len = a.len() + v.len() - 1;
    let n = full_len.next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut fa: Vec<Complex<f64>> = a.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fa.resize(n, Complex::new(0.0, 0.0));
    let mut fv: Vec<Complex<f64>> = v.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fv.resize(n, Complex::new(0.0, 0.0));

    fft.process(&mut fa);
    fft.process(&mut fv);

    let mut cross: Vec<Complex<f64>> = fa
        .iter()
        .zip(fv.iter())
        .map(|(x, y)| x * y.conj())
        .collect();
    ifft.process(&mut cross);

    // Circular lag k lives at index k (k >= 0) or n + k (k < 0)
    let lag_offset = v.len() as isize - 1;
    let mut best_index = 0;
    let mut best_value = f64::NEG_INFINITY;
    for i in 0..full_len {
        let k = i as isize - lag_offset;
        let value = cross[k.rem_euclid(n as isize) as usize].re;
        if value > best_value {
            best_value = value;
            best_index = i;
        }
    }

    best_index
}

/// Estimate the delay of `a` relative to `b` in samples
///
/// Positive values mean `a` starts later (carries extra leading samples).
/// A preview with no energy after mean removal gives a delay of 0.
///
/// # Errors
///
/// `InvalidInput` for non-stereo or empty waveforms, or `sample_rate == 0`
pub fn estimate_delay(a: &Waveform, b: &Waveform, sample_rate: u32) -> Result<isize> {
    validate(a, "first")?;
    validate(b, "second")?;
    if sample_rate == 0 {
        return Err(SeparationError::InvalidInput(
            "Invalid sample rate: 0".to_string(),
        ));
    }

    let preview_len = PREVIEW_SECONDS as usize * sample_rate as usize;
    let a_mono = centered_preview(a, preview_len);
    let b_mono = centered_preview(b, preview_len);

    let a_energy: f64 = a_mono.iter().map(|x| x * x).sum();
    let b_energy: f64 = b_mono.iter().map(|x| x * x).sum();
    if a_energy < EPSILON || b_energy < EPSILON {
        log::warn!(
            "Alignment preview is silent (energy a={:.3e}, b={:.3e}), assuming zero delay",
            a_energy,
            b_energy
        );
        return Ok(0);
    }

    let peak = full_correlation_argmax(&a_mono, &b_mono);
    let delay = peak as isize - (a_mono.len() as isize - 1);

    log::debug!(
        "Estimated delay: {} samples (preview {} / {} samples)",
        delay,
        a_mono.len(),
        b_mono.len()
    );

    Ok(delay)
}

/// Align two stereo waveforms by cross-correlating their openings
///
/// # Returns
///
/// Owned, trimmed copies of `a` and `b` with identical length
///
/// # Errors
///
/// Same as [`estimate_delay`]
pub fn align(a: &Waveform, b: &Waveform, sample_rate: u32) -> Result<(Waveform, Waveform)> {
    let delay = estimate_delay(a, b, sample_rate)?;

    let (a_start, b_start) = if delay > 0 {
        ((delay as usize).min(a.ncols()), 0)
    } else {
        (0, delay.unsigned_abs().min(b.ncols()))
    };

    let a_view = a.slice(s![.., a_start..]);
    let b_view = b.slice(s![.., b_start..]);
    let len = a_view.ncols().min(b_view.ncols());

    Ok((
        a_view.slice(s![.., ..len]).to_owned(),
        b_view.slice(s![.., ..len]).to_owned(),
    ))
}

//! Audio decoding using Symphonia
//!
//! Decoding sits behind the [`AudioDecoder`] trait so callers can plug in
//! their own PCM source. [`SymphoniaDecoder`] handles every container and
//! codec enabled in Symphonia's default feature set and resamples with a
//! short sinc kernel when the file rate differs from the requested one.

use std::fs::File;
use std::path::Path;

use ndarray::Array2;
use rubato::{
    calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, SeparationError};
use crate::Waveform;

/// Source of decoded PCM audio
pub trait AudioDecoder: Send + Sync {
    /// Decode `path` to a `[2, samples]` float waveform at `sample_rate`
    ///
    /// # Returns
    ///
    /// The waveform and the rate it is actually sampled at
    ///
    /// # Errors
    ///
    /// `DecodingError` if the file cannot be read, decoded or resampled
    fn decode(&self, path: &Path, sample_rate: u32) -> Result<(Waveform, u32)>;
}

/// Symphonia-backed decoder with rubato resampling
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

fn decoding_error(path: &Path, what: impl std::fmt::Display) -> SeparationError {
    SeparationError::DecodingError(format!("{}: {}", path.display(), what))
}

/// Decode a file to interleaved f32 samples
///
/// # Returns
///
/// Tuple of (interleaved samples, channel count, sample rate)
pub fn decode_interleaved(path: &Path) -> Result<(Vec<f32>, usize, u32)> {
    log::debug!("Decoding audio file: {}", path.display());

    let file = File::open(path).map_err(|e| decoding_error(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decoding_error(path, e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decoding_error(path, "no supported audio track"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| decoding_error(path, "unknown sample rate"))?;
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decoding_error(path, e))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decoding_error(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels = spec.channels.count();
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                // Corrupted packets are skipped, the rest of the stream is still usable
                log::warn!("Skipping undecodable packet in {}: {}", path.display(), msg);
                continue;
            }
            Err(e) => return Err(decoding_error(path, e)),
        }
    }

    if channels == 0 || samples.is_empty() {
        return Err(decoding_error(path, "no audio samples decoded"));
    }

    log::debug!(
        "Decoded {} frames, {} channels at {} Hz",
        samples.len() / channels,
        channels,
        sample_rate
    );

    Ok((samples, channels, sample_rate))
}

/// Arrange interleaved samples as a `[2, frames]` stereo waveform
///
/// Mono is duplicated to both channels; more than two channels is rejected.
pub fn to_stereo(interleaved: &[f32], channels: usize) -> Result<Waveform> {
    let source_channel = |ch: usize| match channels {
        1 => 0,
        _ => ch,
    };
    if channels == 0 || channels > 2 {
        return Err(SeparationError::DecodingError(format!(
            "Expected mono or stereo audio, got {} channels",
            channels
        )));
    }

    let frames = interleaved.len() / channels;
    Ok(Array2::from_shape_fn((2, frames), |(ch, i)| {
        interleaved[i * channels + source_channel(ch)]
    }))
}

/// Resample every channel of a waveform from `from_rate` to `to_rate`
///
/// Uses a short sinc kernel with linear interpolation, trading a little
/// stopband attenuation for speed. `SincFixedIn` starts its read position
/// half a kernel back, so the first output frame is already aligned with the
/// first input frame and no leading frames are dropped.
pub fn resample(waveform: &Waveform, from_rate: u32, to_rate: u32) -> Result<Waveform> {
    if from_rate == 0 || to_rate == 0 {
        return Err(SeparationError::InvalidInput(format!(
            "Invalid resampling rates: {} -> {}",
            from_rate, to_rate
        )));
    }
    if from_rate == to_rate || waveform.ncols() == 0 {
        return Ok(waveform.clone());
    }

    let (channels, frames) = waveform.dim();
    let ratio = to_rate as f64 / from_rate as f64;

    let sinc_len = 64;
    let window = WindowFunction::Blackman2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, frames, channels)
        .map_err(|e| SeparationError::DecodingError(format!("Failed to create resampler: {}", e)))?;

    let input: Vec<Vec<f32>> = waveform.outer_iter().map(|row| row.to_vec()).collect();
    let mut output = resampler
        .process(&input, None)
        .map_err(|e| SeparationError::DecodingError(format!("Resampling failed: {}", e)))?;

    // Flush the filter tail so the last input samples make it out
    let tail = resampler
        .process_partial::<Vec<f32>>(None, None)
        .map_err(|e| SeparationError::DecodingError(format!("Resampling failed: {}", e)))?;
    for (channel, rest) in output.iter_mut().zip(tail) {
        channel.extend(rest);
    }

    let expected = (frames as f64 * ratio).ceil() as usize;
    let available = output.iter().map(Vec::len).min().unwrap_or(0);
    let len = expected.min(available);

    log::debug!(
        "Resampled {} frames {} Hz -> {} frames {} Hz",
        frames,
        from_rate,
        len,
        to_rate
    );

    Ok(Array2::from_shape_fn((channels, len), |(ch, i)| output[ch][i]))
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path, sample_rate: u32) -> Result<(Waveform, u32)> {
        let (interleaved, channels, source_rate) = decode_interleaved(path)?;
        let stereo = to_stereo(&interleaved, channels).map_err(|e| decoding_error(path, e))?;
        let waveform = resample(&stereo, source_rate, sample_rate)?;
        Ok((waveform, sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_stereo_duplicates_mono() {
        let stereo = to_stereo(&[0.1, 0.2, 0.3], 1).unwrap();
        assert_eq!(stereo.dim(), (2, 3));
        assert_eq!(stereo.row(0), stereo.row(1));
    }

    #[test]
    fn test_to_stereo_deinterleaves() {
        let stereo = to_stereo(&[1.0, -1.0, 2.0, -2.0], 2).unwrap();
        assert_eq!(stereo.row(0).to_vec(), vec![1.0, 2.0]);
        assert_eq!(stereo.row(1).to_vec(), vec![-1.0, -2.0]);
    }

    #[test]
    fn test_to_stereo_rejects_surround() {
        assert!(to_stereo(&[0.0; 12], 6).is_err());
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let waveform = Array2::from_shape_fn((2, 100), |(c, i)| (c + i) as f32);
        assert_eq!(resample(&waveform, 44100, 44100).unwrap(), waveform);
    }

    #[test]
    fn test_resample_length_and_alignment() {
        let from = 48000;
        let to = 24000;
        let frames = 4800;
        // 200 Hz tone is far below the new Nyquist
        let waveform = Array2::from_shape_fn((2, frames), |(_, i)| {
            (2.0 * std::f32::consts::PI * 200.0 * i as f32 / from as f32).sin() * 0.5
        });

        let resampled = resample(&waveform, from, to).unwrap();
        assert_eq!(resampled.nrows(), 2);
        assert_eq!(resampled.ncols(), frames / 2);

        // Mid-signal samples should follow the original tone at the new rate
        for i in 500..1500 {
            let expected =
                (2.0 * std::f32::consts::PI * 200.0 * i as f32 / to as f32).sin() * 0.5;
            assert!(
                (resampled[[0, i]] - expected).abs() < 0.05,
                "sample {} = {:.4}, expected {:.4}",
                i,
                resampled[[0, i]],
                expected
            );
        }
    }

    #[test]
    fn test_resample_has_no_lag() {
        let from = 48000;
        let to = 24000;
        let tone = |i: usize, rate: u32| {
            (2.0 * std::f32::consts::PI * 200.0 * i as f32 / rate as f32).sin() * 0.5
        };
        let waveform = Array2::from_shape_fn((2, 4800), |(_, i)| tone(i, from));
        let resampled = resample(&waveform, from, to).unwrap();

        // Best matching shift of the output against the ideal tone
        let error_at = |lag: isize| -> f32 {
            (500..1500)
                .map(|i| {
                    let expected = tone((i as isize + lag) as usize, to);
                    (resampled[[0, i]] - expected).powi(2)
                })
                .sum()
        };
        let best = (-20..=20)
            .min_by(|&a, &b| error_at(a).total_cmp(&error_at(b)))
            .unwrap();
        assert!(best.abs() <= 1, "resampled output is shifted by {} samples", best);
    }

    #[test]
    fn test_missing_file_is_decoding_error() {
        let result = SymphoniaDecoder.decode(Path::new("/nonexistent/track.wav"), 44100);
        assert!(matches!(result, Err(SeparationError::DecodingError(_))));
    }
}

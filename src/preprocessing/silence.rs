//! Leading/trailing silence trimming
//!
//! Frames are scored by RMS power of the channel-averaged signal relative to
//! the loudest frame. Everything before the first and after the last frame
//! within `top_db` of that peak is cut away; interior quiet passages stay.

use std::ops::Range;

use ndarray::s;
use serde::{Deserialize, Serialize};

use super::channel_mixer::{to_mono, ChannelMixMode};
use crate::error::{Result, SeparationError};
use crate::spectral::window::{centered_frame_count, reflect_pad};
use crate::Waveform;

/// Floor applied to frame power before converting to dB
const AMIN: f32 = 1e-10;

/// Silence trimming configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilenceTrimmer {
    /// Frames more than this many dB below the loudest frame are silent (default: 60.0)
    pub top_db: f32,

    /// Analysis frame length in samples (default: 2048)
    pub frame_length: usize,

    /// Hop between analysis frames in samples (default: 512)
    pub hop_length: usize,
}

impl Default for SilenceTrimmer {
    fn default() -> Self {
        Self {
            top_db: 60.0,
            frame_length: 2048,
            hop_length: 512,
        }
    }
}

impl SilenceTrimmer {
    /// Per-frame flag: `true` where the frame is within `top_db` of the peak
    pub fn non_silent_frames(&self, mono: &[f32]) -> Vec<bool> {
        let padded = reflect_pad(mono, self.frame_length / 2);
        let frames = centered_frame_count(mono.len(), self.hop_length);

        let power: Vec<f32> = (0..frames)
            .map(|t| {
                let start = t * self.hop_length;
                let end = (start + self.frame_length).min(padded.len());
                let frame = &padded[start..end];
                if frame.is_empty() {
                    return 0.0;
                }
                frame.iter().map(|&x| x * x).sum::<f32>() / self.frame_length as f32
            })
            .collect();

        let reference = power.iter().copied().fold(0.0f32, f32::max).max(AMIN);
        let reference_db = 10.0 * reference.log10();

        power
            .iter()
            .map(|&p| 10.0 * p.max(AMIN).log10() - reference_db > -self.top_db)
            .collect()
    }

    /// Sample range of `mono` that survives trimming
    pub fn keep_range(&self, mono: &[f32]) -> Range<usize> {
        let flags = self.non_silent_frames(mono);
        let first = flags.iter().position(|&f| f);
        let last = flags.iter().rposition(|&f| f);

        match (first, last) {
            (Some(first), Some(last)) => {
                let start = (first * self.hop_length).min(mono.len());
                let end = ((last + 1) * self.hop_length).min(mono.len());
                start..end.max(start)
            }
            _ => 0..0,
        }
    }
}

/// Trim leading and trailing silence from a multi-channel waveform
///
/// # Returns
///
/// The trimmed copy and the kept sample range in the original signal
///
/// # Errors
///
/// `InvalidInput` if the trimmer has a zero frame or hop length
pub fn trim_silence(
    waveform: &Waveform,
    trimmer: &SilenceTrimmer,
) -> Result<(Waveform, Range<usize>)> {
    if trimmer.frame_length == 0 || trimmer.hop_length == 0 {
        return Err(SeparationError::InvalidInput(format!(
            "Silence trimmer needs non-zero frame/hop length, got {}/{}",
            trimmer.frame_length, trimmer.hop_length
        )));
    }

    if waveform.ncols() == 0 {
        return Ok((waveform.clone(), 0..0));
    }

    let mono = to_mono(waveform.view(), ChannelMixMode::Average);
    let range = trimmer.keep_range(&mono);

    log::debug!(
        "Trimming silence: keeping samples {}..{} of {}",
        range.start,
        range.end,
        mono.len()
    );

    let trimmed = waveform.slice(s![.., range.start..range.end]).to_owned();
    Ok((trimmed, range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn padded_tone(silence: usize, tone: usize) -> Waveform {
        Array2::from_shape_fn((2, 2 * silence + tone), |(_, i)| {
            if i >= silence && i < silence + tone {
                (i as f32 * 0.05).sin() * 0.5
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_trims_leading_and_trailing_silence() {
        let waveform = padded_tone(8192, 8192);
        let (trimmed, range) = trim_silence(&waveform, &SilenceTrimmer::default()).unwrap();

        // Frame-level resolution: the cut lands within one frame of the tone edges
        assert!(range.start <= 8192 && range.start + 2048 >= 8192);
        assert!(range.end >= 16384 && range.end <= 16384 + 2048);
        assert_eq!(trimmed.ncols(), range.end - range.start);
        assert_eq!(trimmed.nrows(), 2);
    }

    #[test]
    fn test_loud_signal_untouched() {
        let waveform = Array2::from_shape_fn((2, 10000), |(_, i)| (i as f32 * 0.1).sin());
        let (trimmed, range) = trim_silence(&waveform, &SilenceTrimmer::default()).unwrap();
        assert_eq!(range, 0..10000);
        assert_eq!(trimmed, waveform);
    }

    #[test]
    fn test_all_zero_signal_kept() {
        // Every frame sits at the floor, so none is below the peak by top_db
        let waveform = Array2::<f32>::zeros((2, 4096));
        let (trimmed, range) = trim_silence(&waveform, &SilenceTrimmer::default()).unwrap();
        assert_eq!(range, 0..4096);
        assert_eq!(trimmed.ncols(), 4096);
    }

    #[test]
    fn test_invalid_trimmer() {
        let waveform = Array2::<f32>::zeros((2, 16));
        let trimmer = SilenceTrimmer {
            hop_length: 0,
            ..Default::default()
        };
        assert!(trim_silence(&waveform, &trimmer).is_err());
    }
}

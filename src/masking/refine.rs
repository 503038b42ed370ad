//! Mask refinement over low-energy regions
//!
//! A separation network predicts poorly where the reference spectrogram
//! carries almost no energy. Long quiet runs are detected from the per-frame
//! mean magnitude, their interior is forced to 1 (pass the mixture through)
//! and their edges are blended with linear ramps so the mask has no hard
//! steps.
//!
//! # Example
//!
//! ```no_run
//! use ndarray::Array3;
//! use stratum_sep::config::MaskRefineConfig;
//! use stratum_sep::masking::refine::refine;
//!
//! let mask = Array3::<f32>::from_elem((2, 1024, 500), 0.3);
//! let reference = Array3::<f32>::zeros((2, 1024, 500));
//! let refined = refine(&mask, &reference, &MaskRefineConfig::default())?;
//! assert_eq!(refined.dim(), mask.dim());
//! # Ok::<(), stratum_sep::SeparationError>(())
//! ```

use std::ops::Range;

use ndarray::{s, Array3, Axis};

use crate::config::MaskRefineConfig;
use crate::error::{Result, SeparationError};
use crate::spectral::Magnitude;

/// Mean reference magnitude per time frame, over channels and bins
fn frame_scores(reference: &Magnitude) -> Result<Vec<f32>> {
    let (channels, bins, _) = reference.dim();
    let count = channels * bins;
    if count == 0 {
        return Err(SeparationError::InvalidInput(format!(
            "Reference magnitude has no channels or bins: {:?}",
            reference.shape()
        )));
    }

    let sums = reference.sum_axis(Axis(0)).sum_axis(Axis(0));
    Ok(sums.iter().map(|&s| s / count as f32).collect())
}

/// Find runs of low-energy frames longer than `min_range`
///
/// # Arguments
///
/// * `reference` - Magnitude `[channels, bins, frames]` used for scoring
/// * `threshold` - Frames scoring strictly below this are low-energy
/// * `min_range` - Runs of `min_range` frames or fewer are discarded
///
/// # Returns
///
/// Half-open frame ranges `[s, e)` in ascending order
pub fn find_low_energy_runs(
    reference: &Magnitude,
    threshold: f32,
    min_range: usize,
) -> Result<Vec<Range<usize>>> {
    let scores = frame_scores(reference)?;

    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for (t, &score) in scores.iter().enumerate() {
        match (score < threshold, start) {
            (true, None) => start = Some(t),
            (false, Some(s)) => {
                runs.push(s..t);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(s..scores.len());
    }

    runs.retain(|r| r.len() > min_range);
    Ok(runs)
}

/// Value of sample `i` of an `n`-point linear ramp from `from` to `to`
fn ramp(from: f32, to: f32, n: usize, i: usize) -> f32 {
    if n <= 1 {
        return from;
    }
    from + (to - from) * i as f32 / (n - 1) as f32
}

/// Add a ramp starting at frame `start` (may be negative) and clip to [0, 1]
fn blend_ramp(mask: &mut Array3<f32>, start: isize, width: usize, from: f32, to: f32) {
    let frames = mask.len_of(Axis(2)) as isize;
    for i in 0..width {
        let t = start + i as isize;
        if t < 0 || t >= frames {
            continue;
        }
        let value = ramp(from, to, width, i);
        mask.slice_mut(s![.., .., t as usize])
            .mapv_inplace(|m| (m + value).clamp(0.0, 1.0));
    }
}

/// Refine `mask` in place against `reference`
///
/// # Errors
///
/// - `ShapeMismatch` if `mask` and `reference` differ in any dimension
/// - `InvalidInput` if `reference` has no channels or bins
pub fn refine_in_place(
    mask: &mut Array3<f32>,
    reference: &Magnitude,
    config: &MaskRefineConfig,
) -> Result<()> {
    if mask.dim() != reference.dim() {
        return Err(SeparationError::ShapeMismatch(format!(
            "Mask shape {:?} does not match reference shape {:?}",
            mask.shape(),
            reference.shape()
        )));
    }
    let frames = mask.len_of(Axis(2));

    let runs = find_low_energy_runs(reference, config.threshold, config.min_range)?;
    log::debug!(
        "Refining mask over {} low-energy runs (threshold={}, min_range={})",
        runs.len(),
        config.threshold,
        config.min_range
    );

    let fade = config.fade_width;
    let mut previous_end: Option<usize> = None;
    for run in runs {
        let e = run.end;
        let s = match previous_end {
            Some(old_e) if run.start - old_e < fade => old_e.saturating_sub(2 * fade),
            _ => {
                if run.start != 0 {
                    blend_ramp(mask, run.start as isize, fade, 0.0, 1.0);
                }
                run.start
            }
        };

        if e != frames {
            blend_ramp(mask, e as isize - fade as isize, fade, 1.0, 0.0);
        }

        let interior_start = (s + fade).min(frames);
        let interior_end = e.saturating_sub(fade);
        if interior_start < interior_end {
            mask.slice_mut(s![.., .., interior_start..interior_end])
                .fill(1.0);
        }

        previous_end = Some(e);
    }

    Ok(())
}

/// Refine a copy of `mask` against `reference`
///
/// See [`refine_in_place`] for errors.
pub fn refine(
    mask: &Array3<f32>,
    reference: &Magnitude,
    config: &MaskRefineConfig,
) -> Result<Array3<f32>> {
    let mut refined = mask.clone();
    refine_in_place(&mut refined, reference, config)?;
    Ok(refined)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference that is loud everywhere except `quiet` frame ranges
    fn reference_with_quiet(frames: usize, quiet: &[Range<usize>]) -> Magnitude {
        Array3::from_shape_fn((2, 4, frames), |(_, _, t)| {
            if quiet.iter().any(|r| r.contains(&t)) {
                0.0
            } else {
                1.0
            }
        })
    }

    fn frame(mask: &Array3<f32>, t: usize) -> f32 {
        mask[[0, 0, t]]
    }

    #[test]
    fn test_finds_runs_with_exclusive_end() {
        let reference = reference_with_quiet(200, &[10..110, 150..160]);
        let runs = find_low_energy_runs(&reference, 0.4, 64).unwrap();
        assert_eq!(runs, vec![10..110]);

        let runs = find_low_energy_runs(&reference, 0.4, 5).unwrap();
        assert_eq!(runs, vec![10..110, 150..160]);
    }

    #[test]
    fn test_run_length_must_exceed_min_range() {
        let reference = reference_with_quiet(100, &[20..84]);
        assert!(find_low_energy_runs(&reference, 0.4, 64).unwrap().is_empty());

        let reference = reference_with_quiet(100, &[20..85]);
        assert_eq!(find_low_energy_runs(&reference, 0.4, 64).unwrap(), vec![20..85]);
    }

    #[test]
    fn test_fades_and_interior() {
        let mask = Array3::<f32>::zeros((2, 4, 200));
        let reference = reference_with_quiet(200, &[10..110]);
        let refined = refine(&mask, &reference, &MaskRefineConfig::default()).unwrap();

        // Fade-in over [10, 42)
        assert!(frame(&refined, 10).abs() < 1e-6);
        assert!((frame(&refined, 26) - 16.0 / 31.0).abs() < 1e-5);
        assert!((frame(&refined, 41) - 1.0).abs() < 1e-6);

        // Interior forced to 1
        for t in 42..78 {
            assert_eq!(frame(&refined, t), 1.0, "frame {}", t);
        }

        // Fade-out over [78, 110)
        assert!((frame(&refined, 78) - 1.0).abs() < 1e-6);
        assert!((frame(&refined, 94) - 15.0 / 31.0).abs() < 1e-5);
        assert!(frame(&refined, 109).abs() < 1e-6);

        // Outside the run nothing changes
        for t in (0..10).chain(110..200) {
            assert_eq!(frame(&refined, t), 0.0, "frame {}", t);
        }

        // Every channel and bin gets the same treatment
        assert_eq!(refined[[1, 3, 26]], frame(&refined, 26));
    }

    #[test]
    fn test_fade_is_additive_and_clipped() {
        let mask = Array3::<f32>::from_elem((2, 4, 200), 0.75);
        let reference = reference_with_quiet(200, &[10..110]);
        let refined = refine(&mask, &reference, &MaskRefineConfig::default()).unwrap();

        assert!((frame(&refined, 10) - 0.75).abs() < 1e-6);
        assert!((frame(&refined, 15) - (0.75 + 5.0 / 31.0)).abs() < 1e-5);
        assert_eq!(frame(&refined, 30), 1.0);
        assert!(refined.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_run_at_start_has_no_fade_in() {
        let mask = Array3::<f32>::zeros((2, 4, 150));
        let reference = reference_with_quiet(150, &[0..100]);
        let refined = refine(&mask, &reference, &MaskRefineConfig::default()).unwrap();

        for t in 0..32 {
            assert_eq!(frame(&refined, t), 0.0, "frame {}", t);
        }
        for t in 32..68 {
            assert_eq!(frame(&refined, t), 1.0, "frame {}", t);
        }
        assert!((frame(&refined, 68) - 1.0).abs() < 1e-6);
        assert!(frame(&refined, 99).abs() < 1e-6);
    }

    #[test]
    fn test_run_at_end_has_no_fade_out() {
        let mask = Array3::<f32>::zeros((2, 4, 150));
        let reference = reference_with_quiet(150, &[50..150]);
        let refined = refine(&mask, &reference, &MaskRefineConfig::default()).unwrap();

        for t in 82..118 {
            assert_eq!(frame(&refined, t), 1.0, "frame {}", t);
        }
        // No fade-out: the last fade_width frames keep the original value
        for t in 118..150 {
            assert_eq!(frame(&refined, t), 0.0, "frame {}", t);
        }
    }

    #[test]
    fn test_nearby_runs_merge() {
        let mask = Array3::<f32>::zeros((2, 4, 400));
        // Second run starts 10 frames after the first ends, inside fade_width
        let reference = reference_with_quiet(400, &[10..110, 120..220]);
        let refined = refine(&mask, &reference, &MaskRefineConfig::default()).unwrap();

        // Merged start is 110 - 64 = 46, so the interior resumes at 78
        for t in 78..188 {
            assert_eq!(frame(&refined, t), 1.0, "frame {}", t);
        }
        // The gap between the runs is not faded back down
        assert_eq!(frame(&refined, 115), 1.0);
        assert!(frame(&refined, 219).abs() < 1e-6);
    }

    #[test]
    fn test_merged_start_clamps_at_zero() {
        let config = MaskRefineConfig {
            min_range: 4,
            threshold: 0.4,
            fade_width: 8,
        };
        let mask = Array3::<f32>::zeros((2, 4, 60));
        let reference = reference_with_quiet(60, &[2..8, 10..40]);
        let refined = refine(&mask, &reference, &config).unwrap();

        // Second run merges back to max(8 - 16, 0) = 0, interior from 8 to 32
        for t in 8..32 {
            assert_eq!(frame(&refined, t), 1.0, "frame {}", t);
        }
    }

    #[test]
    fn test_no_runs_leaves_mask_unchanged() {
        let mask = Array3::from_shape_fn((2, 4, 120), |(c, f, t)| ((c + f + t) % 10) as f32 / 10.0);
        let reference = Array3::<f32>::ones((2, 4, 120));
        let refined = refine(&mask, &reference, &MaskRefineConfig::default()).unwrap();
        assert_eq!(refined, mask);
    }

    #[test]
    fn test_in_place_matches_copy() {
        let reference = reference_with_quiet(200, &[30..150]);
        let original = Array3::<f32>::from_elem((2, 4, 200), 0.2);
        let copy = refine(&original, &reference, &MaskRefineConfig::default()).unwrap();

        let mut buffer = original.clone();
        refine_in_place(&mut buffer, &reference, &MaskRefineConfig::default()).unwrap();
        assert_eq!(buffer, copy);
        assert_ne!(buffer, original);
    }

    #[test]
    fn test_frame_count_mismatch() {
        let mask = Array3::<f32>::zeros((2, 4, 100));
        let reference = Array3::<f32>::zeros((2, 4, 101));
        let result = refine(&mask, &reference, &MaskRefineConfig::default());
        assert!(matches!(result, Err(SeparationError::ShapeMismatch(_))));
    }

    #[test]
    fn test_bin_and_channel_mismatch() {
        let reference = reference_with_quiet(100, &[10..90]);

        let fewer_bins = Array3::<f32>::zeros((2, 3, 100));
        let result = refine(&fewer_bins, &reference, &MaskRefineConfig::default());
        assert!(matches!(result, Err(SeparationError::ShapeMismatch(_))));

        let mut one_channel = Array3::<f32>::zeros((1, 4, 100));
        let result = refine_in_place(&mut one_channel, &reference, &MaskRefineConfig::default());
        assert!(matches!(result, Err(SeparationError::ShapeMismatch(_))));
        assert!(one_channel.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_ramp_endpoints() {
        assert_eq!(ramp(0.0, 1.0, 32, 0), 0.0);
        assert_eq!(ramp(0.0, 1.0, 32, 31), 1.0);
        assert_eq!(ramp(1.0, 0.0, 1, 0), 1.0);
    }
}

//! Channel mixing utilities (multi-channel to mono)

use ndarray::{ArrayView2, Axis};

/// Channel mixing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMixMode {
    /// Plain sum of all channels: L + R
    Sum,
    /// Channel average: (L + R) / 2
    Average,
}

/// Collapse a `[channels, samples]` waveform view to one channel
///
/// An empty channel axis yields silence of the same length.
pub fn to_mono(waveform: ArrayView2<'_, f32>, mode: ChannelMixMode) -> Vec<f32> {
    let channels = waveform.nrows();
    if channels == 0 {
        return vec![0.0; waveform.ncols()];
    }

    let summed = waveform.sum_axis(Axis(0));
    match mode {
        ChannelMixMode::Sum => summed.to_vec(),
        ChannelMixMode::Average => {
            let scale = 1.0 / channels as f32;
            summed.iter().map(|&s| s * scale).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sum_and_average() {
        let stereo = array![[0.5f32, -1.0, 0.25], [0.5, 0.0, 0.75]];

        let sum = to_mono(stereo.view(), ChannelMixMode::Sum);
        assert_eq!(sum, vec![1.0, -1.0, 1.0]);

        let avg = to_mono(stereo.view(), ChannelMixMode::Average);
        assert_eq!(avg, vec![0.5, -0.5, 0.5]);
    }

    #[test]
    fn test_preview_slice() {
        let stereo = array![[1.0f32, 2.0, 3.0, 4.0], [1.0, 1.0, 1.0, 1.0]];
        let head = stereo.slice(ndarray::s![.., ..2]);
        assert_eq!(to_mono(head, ChannelMixMode::Sum), vec![2.0, 3.0]);
    }
}

//! Window functions and centered-frame padding

/// Periodic Hann window of the given size
///
/// `w[i] = 0.5 - 0.5 * cos(2πi / size)`, the DFT-even form used for STFT
/// analysis so that overlapping windows tile cleanly.
pub fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / size as f32).cos())
        .collect()
}

/// Map a (possibly out-of-range) index onto `0..len` by mirror reflection
///
/// Reflection excludes the edge sample, so `-1 -> 1` and `len -> len - 2`.
/// Indices further out keep bouncing between both edges.
pub fn reflect_index(index: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut i = index.rem_euclid(period);
    if i >= len as isize {
        i = period - i;
    }
    i as usize
}

/// Pad a signal with `pad` reflected samples on both sides
pub fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    let len = samples.len();
    if len == 0 {
        return vec![0.0; 2 * pad];
    }
    (0..len + 2 * pad)
        .map(|i| samples[reflect_index(i as isize - pad as isize, len)])
        .collect()
}

/// Number of centered frames for a signal of `len` samples
///
/// With `frame_length / 2` samples of padding on each side this is
/// `1 + len / hop`, independent of the frame length.
pub fn centered_frame_count(len: usize, hop: usize) -> usize {
    1 + len / hop
}

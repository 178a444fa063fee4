//! Centered framing: frame `i` is centered on sample `i * hop`, with zero
//! padding of `frame_size / 2` on both ends of the signal.

/// Periodic Hann window.
pub fn hann(n: usize) -> Vec<f32> {
    let c = std::f32::consts::PI * 2.0 / (n as f32);
    (0..n).map(|i| 0.5 - 0.5 * (c * (i as f32)).cos()).collect()
}

pub fn frame_count(len: usize, hop: usize) -> usize {
    1 + len / hop
}

pub fn frame_time(index: usize, hop: usize, sr: u32) -> f32 {
    (index * hop) as f32 / sr as f32
}

pub fn frame_times(n_frames: usize, hop: usize, sr: u32) -> Vec<f32> {
    (0..n_frames).map(|i| frame_time(i, hop, sr)).collect()
}

/// Copy the centered frame `index` into `out` (length = frame size), zero-padding outside the signal.
pub fn fill_frame(samples: &[f32], index: usize, hop: usize, out: &mut [f32]) {
    let half = out.len() / 2;
    let start = (index * hop) as isize - half as isize;
    for (j, slot) in out.iter_mut().enumerate() {
        let pos = start + j as isize;
        *slot = if pos >= 0 && (pos as usize) < samples.len() {
            samples[pos as usize]
        } else {
            0.0
        };
    }
}

/// Per-frame root-mean-square amplitude (no window).
pub fn rms_series(samples: &[f32], frame_size: usize, hop: usize) -> Vec<f32> {
    let n = frame_count(samples.len(), hop);
    let mut buf = vec![0f32; frame_size];
    (0..n)
        .map(|i| {
            fill_frame(samples, i, hop, &mut buf);
            let energy: f64 = buf.iter().map(|&s| (s as f64) * (s as f64)).sum();
            (energy / frame_size as f64).sqrt() as f32
        })
        .collect()
}

/// Fraction of sign changes per frame. Values with magnitude below 1e-10 count as zero,
/// and zero counts as positive.
pub fn zcr_series(samples: &[f32], frame_size: usize, hop: usize) -> Vec<f32> {
    let n = frame_count(samples.len(), hop);
    let mut buf = vec![0f32; frame_size];
    (0..n)
        .map(|i| {
            fill_frame(samples, i, hop, &mut buf);
            let negative = |s: f32| s.abs() > 1e-10 && s < 0.0;
            let crossings = buf.windows(2).filter(|w| negative(w[0]) != negative(w[1])).count();
            crossings as f32 / frame_size as f32
        })
        .collect()
}

/// Index of the first element `>= value` in an ascending slice.
pub fn search_sorted(sorted: &[f32], value: f32) -> usize {
    sorted.partition_point(|&t| t < value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_matches_centered_layout() {
        assert_eq!(frame_count(441_000, 512), 862);
        assert_eq!(frame_count(100, 512), 1);
    }

    #[test]
    fn fill_frame_pads_first_frame() {
        let samples: Vec<f32> = (1..=8).map(|v| v as f32).collect();
        let mut out = vec![0f32; 4];
        fill_frame(&samples, 0, 2, &mut out);
        assert_eq!(out, vec![0.0, 0.0, 1.0, 2.0]);
        fill_frame(&samples, 4, 2, &mut out);
        assert_eq!(out, vec![7.0, 8.0, 0.0, 0.0]);
    }

    #[test]
    fn rms_of_constant_interior_frame() {
        let samples = vec![0.5f32; 4096];
        let rms = rms_series(&samples, 1024, 256);
        assert!((rms[8] - 0.5).abs() < 1e-6);
        // first frame is half padding
        assert!((rms[0] - (0.125f32).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn zcr_counts_alternating_signs() {
        let samples: Vec<f32> = (0..2048).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let zcr = zcr_series(&samples, 256, 128);
        assert!(zcr[5] > 0.99);
        let silent = zcr_series(&vec![0.0; 2048], 256, 128);
        assert!(silent.iter().all(|&z| z == 0.0));
    }

    #[test]
    fn search_sorted_is_left_biased() {
        let t = [0.0, 0.5, 1.0, 1.5];
        assert_eq!(search_sorted(&t, 1.0), 2);
        assert_eq!(search_sorted(&t, 1.2), 3);
        assert_eq!(search_sorted(&t, 9.0), 4);
    }
}

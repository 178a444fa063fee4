use rustfft::{num_complex::Complex32, FftPlanner};

use super::frames::{fill_frame, frame_count, frame_times, hann};

/// Magnitude spectrogram over the centered frame grid, stored frame-major.
///
/// Computed once per extraction and shared by the spectral, tempo/key,
/// structure, harmonic and FX stages.
#[derive(Clone, Debug)]
pub struct Spectrogram {
    mags: Vec<f32>,
    n_bins: usize,
    n_frames: usize,
    frame_size: usize,
    hop: usize,
    sample_rate: u32,
}

impl Spectrogram {
    pub fn compute(samples: &[f32], sample_rate: u32, frame_size: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(frame_size);
        let window = hann(frame_size);
        let n_bins = frame_size / 2 + 1;
        let n_frames = frame_count(samples.len(), hop);

        let mut mags = Vec::with_capacity(n_bins * n_frames);
        let mut frame = vec![0f32; frame_size];
        let mut buf = vec![Complex32::new(0.0, 0.0); frame_size];
        for i in 0..n_frames {
            fill_frame(samples, i, hop, &mut frame);
            for (slot, (&s, &w)) in buf.iter_mut().zip(frame.iter().zip(&window)) {
                *slot = Complex32::new(s * w, 0.0);
            }
            fft.process(&mut buf);
            mags.extend(buf[..n_bins].iter().map(|c| c.norm()));
        }

        Self { mags, n_bins, n_frames, frame_size, hop, sample_rate }
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Magnitudes of frame `i`, bins `0..=frame_size/2`.
    pub fn frame(&self, i: usize) -> &[f32] {
        &self.mags[i * self.n_bins..(i + 1) * self.n_bins]
    }

    pub fn frames(&self) -> impl Iterator<Item = &[f32]> {
        self.mags.chunks_exact(self.n_bins)
    }

    pub fn bin_hz(&self, k: usize) -> f32 {
        k as f32 * self.sample_rate as f32 / self.frame_size as f32
    }

    pub fn times(&self) -> Vec<f32> {
        frame_times(self.n_frames, self.hop, self.sample_rate)
    }
}

//! Synthetic signals and WAV fixtures shared by the integration tests.
#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

/// Deterministic uniform noise in `[-amp, amp]`.
pub fn noise(n: usize, amp: f32, seed: u32) -> Vec<f32> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            ((state >> 16) as f32 / 65_535.0 * 2.0 - 1.0) * amp
        })
        .collect()
}

pub fn sine(freq: f32, amp: f32, sr: u32, secs: f32) -> Vec<f32> {
    (0..(sr as f32 * secs) as usize)
        .map(|i| amp * (2.0 * PI * freq * i as f32 / sr as f32).sin())
        .collect()
}

/// 10 ms noise bursts every `period` seconds starting at `period`, silence between.
pub fn click_train(sr: u32, secs: f32, period: f32) -> Vec<f32> {
    let mut x = vec![0f32; (sr as f32 * secs) as usize];
    let burst = noise((sr as f32 * 0.01) as usize, 0.8, 4242);
    let mut k = 1;
    while (k as f32 * period) < secs {
        let start = (k as f32 * period * sr as f32).round() as usize;
        for (s, b) in x.iter_mut().skip(start).zip(&burst) {
            *s = *b;
        }
        k += 1;
    }
    x
}

/// Voice-like harmonic tone whose fundamental glides from `f0_start` to `f0_end`.
pub fn voiced_glide(sr: u32, secs: f32, f0_start: f32, f0_end: f32, amp: f32) -> Vec<f32> {
    let n = (sr as f32 * secs) as usize;
    let rate = (f0_end - f0_start) / secs;
    (0..n)
        .map(|i| {
            let t = i as f32 / sr as f32;
            let phase = 2.0 * PI * (f0_start * t + 0.5 * rate * t * t);
            (1..=6).map(|h| (h as f32 * phase).sin() / h as f32).sum::<f32>() * amp
        })
        .collect()
}

pub fn silence(sr: u32, secs: f32) -> Vec<f32> {
    vec![0.0; (sr as f32 * secs) as usize]
}

pub fn concat(parts: &[Vec<f32>]) -> Vec<f32> {
    parts.iter().flatten().copied().collect()
}

/// Write a mono 32-bit float WAV into `dir`.
pub fn write_wav(dir: &Path, name: &str, samples: &[f32], sr: u32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sr,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
    path
}

use std::f64::consts::PI;

#[derive(Clone, Copy, Debug)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    fn new(b: [f64; 3], a: [f64; 3]) -> Self {
        Self {
            b0: b[0] / a[0],
            b1: b[1] / a[0],
            b2: b[2] / a[0],
            a1: a[1] / a[0],
            a2: a[2] / a[0],
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn lowpass(sr: f64, cutoff: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / sr;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::new(
            [(1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    fn highpass(sr: f64, cutoff: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / sr;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::new(
            [(1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    // transposed direct form II
    fn process(&mut self, x: f64) -> f64 {
        let y = x * self.b0 + self.z1;
        self.z1 = x * self.b1 + self.z2 - self.a1 * y;
        self.z2 = x * self.b2 - self.a2 * y;
        y
    }
}

/// Q factors of the second-order sections of an even-order Butterworth filter.
fn butterworth_qs(order: usize) -> Vec<f64> {
    let n = order as f64;
    (0..order / 2)
        .map(|k| 1.0 / (2.0 * ((2 * k + 1) as f64 * PI / (2.0 * n)).sin()))
        .collect()
}

/// Series of second-order sections, run once over a whole buffer.
#[derive(Clone, Debug)]
pub struct BiquadCascade {
    sections: Vec<Biquad>,
}

impl BiquadCascade {
    /// Butterworth band-pass built from a high-pass and a low-pass of `order` each
    /// (odd orders are rounded up).
    pub fn bandpass(sr: u32, low_hz: f32, high_hz: f32, order: usize) -> Self {
        let order = order.max(2).next_multiple_of(2);
        let sr = sr as f64;
        let qs = butterworth_qs(order);
        let mut sections = Vec::with_capacity(qs.len() * 2);
        sections.extend(qs.iter().map(|&q| Biquad::highpass(sr, low_hz as f64, q)));
        sections.extend(qs.iter().map(|&q| Biquad::lowpass(sr, high_hz as f64, q)));
        Self { sections }
    }

    pub fn apply(&mut self, samples: &[f32]) -> Vec<f32> {
        samples
            .iter()
            .map(|&s| {
                let y = self.sections.iter_mut().fold(s as f64, |acc, sec| sec.process(acc));
                y as f32
            })
            .collect()
    }
}

/// Linear-interpolation resampler. Input is expected to be band-limited below
/// the target Nyquist already.
pub fn resample_linear(samples: &[f32], from_sr: u32, to_sr: u32) -> Vec<f32> {
    if from_sr == to_sr || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_sr as f64 / to_sr as f64;
    let output_len = ((samples.len() as f64) / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }
    output
}

//! Signal loader: encoded audio -> mono f32 waveform at the native sample rate.

use std::io::Cursor;
use std::path::Path;

use hound::WavReader;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::error::{ExtractError, Result};

/// Decoded mono signal. Samples are finite and clamped to `[-1, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(mut samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ExtractError::Decode("sample rate is zero".into()));
        }
        if samples.is_empty() {
            return Err(ExtractError::EmptyAudio);
        }
        for s in samples.iter_mut() {
            *s = if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 };
        }
        Ok(Self { samples, sample_rate })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_sec(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode a file; the extension (if any) is passed to the format probe as a hint.
pub fn load_path(path: impl AsRef<Path>) -> Result<Waveform> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let ext = path.extension().and_then(|e| e.to_str());
    load_bytes(&bytes, ext)
}

/// Decode an in-memory file. RIFF/WAVE goes through `hound`, everything else
/// (and WAV layouts hound rejects) through symphonia's probe.
pub fn load_bytes(bytes: &[u8], ext_hint: Option<&str>) -> Result<Waveform> {
    let (samples, sr) = if is_riff_wave(bytes) {
        match decode_wav(bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                debug!(error = %err, "hound rejected WAV, falling back to symphonia");
                decode_any(bytes, ext_hint)?
            }
        }
    } else {
        decode_any(bytes, ext_hint)?
    };
    debug!(samples = samples.len(), sample_rate = sr, "decoded audio");
    Waveform::new(samples, sr)
}

fn is_riff_wave(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let ch = spec.channels as usize;
    if ch == 0 {
        return Err(ExtractError::Decode("WAV has zero channels".into()));
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<_, _>>()?,
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<_, _>>()?,
        (hound::SampleFormat::Int, bits @ (24 | 32)) => {
            let max = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<std::result::Result<_, _>>()?
        }
        (hound::SampleFormat::Float, 32) => {
            reader.samples::<f32>().collect::<std::result::Result<_, _>>()?
        }
        (format, bits) => {
            return Err(ExtractError::Decode(format!("unsupported WAV layout {format:?} {bits}-bit")));
        }
    };

    Ok((downmix(&interleaved, ch), spec.sample_rate))
}

fn decode_any(bytes: &[u8], ext_hint: Option<&str>) -> Result<(Vec<f32>, u32)> {
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = ext_hint {
        hint.with_extension(ext);
    }

    let probed = get_probe().format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| ExtractError::Decode("no default track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sr = codec_params.sample_rate.unwrap_or(0);

    let mut decoder = get_codecs().make(&codec_params, &DecoderOptions::default())?;
    let mut out = Vec::<f32>::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                sr = audio_buf.spec().rate;
                let chans = audio_buf.spec().channels.count();
                let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, *audio_buf.spec());
                sample_buf.copy_interleaved_ref(audio_buf);
                out.extend(downmix(sample_buf.samples(), chans));
            }
            // recoverable: skip the packet
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(error = e, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok((out, sr))
}

/// Average interleaved channels into one.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

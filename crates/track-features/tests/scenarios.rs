//! End-to-end behaviour on synthetic tracks, decoded from WAV files.

mod support;

use support::{click_train, concat, noise, silence, sine, write_wav};
use tempfile::tempdir;
use track_features::config::CapsConfig;
use track_features::energy::to_dbfs;
use track_features::{
    extract, extract_bytes, extract_path, Activity, ExtractConfig, ExtractError, SilenceSegment, Waveform,
};

#[test]
fn all_zero_track() {
    let dir = tempdir().unwrap();
    let path = write_wav(dir.path(), "zeros.wav", &silence(44_100, 10.0), 44_100);
    let record = extract_path(&path, &ExtractConfig::default()).unwrap();

    assert_eq!(record.duration_sec, 10.0);
    assert_eq!(record.peak_rms_linear, 0.0);
    assert_eq!(record.peak_rms_dbfs, to_dbfs(0.0));
    assert_eq!(
        record.silence_segments,
        vec![SilenceSegment { start: 0.0, end: 10.0, label: Activity::Silence }]
    );
    assert!(record.transients.is_empty());
    assert!(record.drop_timestamps.is_empty());
    assert!(record.vocal_segments.is_empty());
    assert_eq!(record.tempo_bpm, 0.0);
    assert_eq!(record.structure_segments.len(), 1);
    assert!(record.fx_events.is_empty());
}

#[test]
fn click_train_transients_line_up() {
    let sr = 44_100;
    let dir = tempdir().unwrap();
    let path = write_wav(dir.path(), "clicks.wav", &click_train(sr, 10.0, 0.5), sr);
    let record = extract_path(&path, &ExtractConfig::default()).unwrap();

    let expected: Vec<f32> = (1..20).map(|k| k as f32 * 0.5).collect();
    let near = |a: f32, b: f32| (a - b).abs() <= 0.05;
    for t in &record.transients {
        assert!(expected.iter().any(|&e| near(*t, e)), "stray transient at {t}");
    }
    for e in &expected {
        assert!(record.transients.iter().any(|&t| near(t, *e)), "missed click at {e}");
    }
    assert!(record.transients.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(record.drop_timestamps.len(), 5);
    assert!((record.tempo_bpm - 120.0).abs() < 6.0, "tempo = {}", record.tempo_bpm);
}

#[test]
fn steady_sine_is_one_section_and_tonal() {
    let sr = 22_050;
    let wave = Waveform::new(sine(440.0, 0.5, sr, 10.0), sr).unwrap();
    let record = extract(&wave, &ExtractConfig::default()).unwrap();

    assert_eq!(record.structure_segments.len(), 1);
    assert_eq!(record.structure_segments[0].start, 0.0);
    assert_eq!(record.structure_segments[0].end, 10.0);
    assert!(record.spectral.flatness < 0.01, "flatness = {}", record.spectral.flatness);
    assert_eq!(record.key.to_string(), "A minor");
}

#[test]
fn undecodable_input_is_fatal() {
    let garbage = b"definitely not an audio file, just some text".to_vec();
    let err = extract_bytes(&garbage, Some("mp3"), &ExtractConfig::default()).unwrap_err();
    assert!(matches!(err, ExtractError::Decode(_)), "got {err:?}");

    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.flac");
    std::fs::write(&path, &garbage).unwrap();
    assert!(matches!(extract_path(&path, &ExtractConfig::default()), Err(ExtractError::Decode(_))));

    let missing = dir.path().join("missing.wav");
    assert!(matches!(extract_path(&missing, &ExtractConfig::default()), Err(ExtractError::Io(_))));
}

#[test]
fn header_only_wav_is_empty_audio() {
    let dir = tempdir().unwrap();
    let path = write_wav(dir.path(), "empty.wav", &[], 44_100);
    assert!(matches!(extract_path(&path, &ExtractConfig::default()), Err(ExtractError::EmptyAudio)));
}

fn busy_track(sr: u32) -> Vec<f32> {
    let pad: Vec<f32> = sine(220.0, 0.1, sr, 8.0);
    let mut groove = click_train(sr, 8.0, 0.25);
    for (g, s) in groove.iter_mut().zip(sine(330.0, 0.2, sr, 8.0)) {
        *g = (*g + s).clamp(-1.0, 1.0);
    }
    let wash = noise((sr as f32 * 8.0) as usize, 0.6, 77);
    concat(&[pad, groove, wash, silence(sr, 6.0)])
}

#[test]
fn record_invariants_hold_on_a_busy_track() {
    let sr = 22_050;
    let cfg = ExtractConfig::default();
    let wave = Waveform::new(busy_track(sr), sr).unwrap();
    let record = extract(&wave, &cfg).unwrap();
    let caps = &cfg.caps;

    assert!(record.degraded.is_empty(), "degraded: {:?}", record.degraded);
    assert_eq!(record.peak_rms_dbfs, to_dbfs(record.peak_rms_linear));

    assert!(record.energy_profile.len() <= caps.energy_profile);
    assert!(record.energy_profile.windows(2).all(|w| w[0].t <= w[1].t));
    assert!(record.transients.len() <= caps.transients);
    assert!(record.transients.windows(2).all(|w| w[0] < w[1]));
    assert!(record.drop_timestamps.len() <= caps.drops);

    assert!(record.silence_segments.iter().all(|s| s.end - s.start >= cfg.silence.min_len));
    assert!(record.silence_segments.windows(2).all(|w| w[0].end <= w[1].start));
    assert!(record.silence_segments.iter().any(|s| s.label == Activity::Silence && s.end == record.duration_sec));

    let segs = &record.structure_segments;
    assert!(!segs.is_empty());
    assert_eq!(segs[0].start, 0.0);
    assert_eq!(segs[segs.len() - 1].end, record.duration_sec);
    assert!(segs.windows(2).all(|w| w[0].end == w[1].start));
    assert!(segs.iter().all(|s| s.end - s.start >= cfg.structure.min_seg));

    assert!(record.fx_events.len() <= caps.fx);
    assert!(record.fx_events.iter().all(|e| e.confidence >= cfg.fx.min_confidence));
    assert!(record.vocal_segments.iter().all(|v| v.end - v.start >= 0.3 - 1e-4));
    assert!(record.vocal_intensity.is_some());
}

#[test]
fn extraction_is_deterministic() {
    let sr = 22_050;
    let wave = Waveform::new(busy_track(sr), sr).unwrap();
    let cfg = ExtractConfig::default();
    let a = extract(&wave, &cfg).unwrap();
    let b = extract(&wave, &cfg).unwrap();
    assert_eq!(a, b);
    assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
}

#[test]
fn tight_caps_bound_every_list() {
    let sr = 22_050;
    let wave = Waveform::new(busy_track(sr), sr).unwrap();
    let caps = CapsConfig { energy_profile: 16, transients: 4, drops: 2, silence: 1, vocal: 1, structure: 1, fx: 0 };
    let cfg = ExtractConfig { caps: caps.clone(), ..ExtractConfig::default() };
    let record = extract(&wave, &cfg).unwrap();

    assert_eq!(record.energy_profile.len(), 16);
    assert!(record.transients.len() <= 4);
    assert!(record.drop_timestamps.len() <= 2);
    assert!(record.silence_segments.len() <= 1);
    assert!(record.vocal_segments.len() <= 1);
    assert_eq!(record.structure_segments.len(), 1);
    assert_eq!(record.structure_segments[0].start, 0.0);
    assert_eq!(record.structure_segments[0].end, record.duration_sec);
    assert!(record.fx_events.is_empty());
    // first and last profile points survive decimation
    assert_eq!(record.energy_profile[0].t, 0.0);
}

#[test]
fn capped_structure_still_covers_the_track() {
    let sr = 22_050;
    let wave = Waveform::new(busy_track(sr), sr).unwrap();
    let full = extract(&wave, &ExtractConfig::default()).unwrap();

    for cap in 1..=full.structure_segments.len() {
        let mut cfg = ExtractConfig::default();
        cfg.caps.structure = cap;
        let segs = extract(&wave, &cfg).unwrap().structure_segments;
        assert_eq!(segs.len(), cap.min(full.structure_segments.len()));
        assert_eq!(segs[0].start, 0.0);
        assert_eq!(segs[segs.len() - 1].end, full.duration_sec);
        assert!(segs.windows(2).all(|w| w[0].end == w[1].start), "cap {cap}: {segs:?}");
        assert!(segs.iter().all(|s| s.end - s.start >= cfg.structure.min_seg));
    }
}

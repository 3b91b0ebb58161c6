use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs, path::Path};

#[derive(Deserialize)]
struct PeakSet {
    indices: Vec<usize>,
}

#[derive(Deserialize)]
struct PeaksOutput {
    sampling_rate: f64,
    peaks: PeakSet,
    times: Vec<f64>,
}

#[derive(Deserialize)]
struct Summary {
    bpm: f64,
    diagnosis: Option<String>,
    valid_intervals: usize,
    rejected_intervals: usize,
}

#[derive(Deserialize)]
struct Episode {
    diagnosis: String,
}

#[derive(Deserialize)]
struct RateOutput {
    peak_count: usize,
    summary: Summary,
    episodes: Vec<Episode>,
}

#[derive(Deserialize)]
struct Beat {
    peak: usize,
    samples: Vec<f64>,
}

/// Gaussian QRS-like bumps every `rr_s` seconds, written as `time,ecg` CSV.
fn write_recording(path: &Path, fs: f64, duration_s: f64, rr_s: f64) -> Result<usize, Box<dyn Error>> {
    let len = (fs * duration_s) as usize;
    let step = (rr_s * fs).round() as usize;
    let centers: Vec<usize> = (1..).map(|k| k * step).take_while(|c| c + 50 < len).collect();
    let mut text = String::from("time,ecg\n");
    for i in 0..len {
        let value: f64 = centers
            .iter()
            .map(|&c| {
                let d = (i as f64 - c as f64) / 6.0;
                (-0.5 * d * d).exp()
            })
            .sum();
        text.push_str(&format!("{},{}\n", i as f64 / fs, value));
    }
    fs::write(path, text)?;
    Ok(centers.len())
}

#[test]
fn find_peaks_recovers_every_beat() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let csv = dir.path().join("normal.csv");
    let beats = write_recording(&csv, 250.0, 10.0, 0.8)?;

    let mut cmd = cargo_bin_cmd!("ecgmon");
    cmd.args(["find-peaks", "--input", csv.to_str().expect("utf8 path")]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: PeaksOutput = serde_json::from_slice(&output)?;

    assert!((actual.sampling_rate - 250.0).abs() < 1e-6);
    assert_eq!(actual.peaks.indices.len(), beats);
    for (k, idx) in actual.peaks.indices.iter().enumerate() {
        let expected = (k + 1) * 200;
        assert!(idx.abs_diff(expected) <= 1, "{} vs {}", idx, expected);
    }
    assert_eq!(actual.times.len(), beats);
    Ok(())
}

#[test]
fn rate_reports_normal_rhythm() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let csv = dir.path().join("normal.csv");
    let beats = write_recording(&csv, 250.0, 10.0, 0.8)?;

    let mut cmd = cargo_bin_cmd!("ecgmon");
    cmd.args(["rate", "--input", csv.to_str().expect("utf8 path")]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: RateOutput = serde_json::from_slice(&output)?;

    assert_eq!(actual.peak_count, beats);
    assert!((actual.summary.bpm - 75.0).abs() < 1.0);
    assert_eq!(actual.summary.diagnosis.as_deref(), Some("Normal"));
    assert_eq!(actual.summary.valid_intervals, beats - 1);
    assert_eq!(actual.summary.rejected_intervals, 0);
    assert!(actual.episodes.is_empty());
    Ok(())
}

#[test]
fn rate_flags_bradycardia_episodes() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let csv = dir.path().join("slow.csv");
    write_recording(&csv, 250.0, 12.0, 1.25)?;

    let mut cmd = cargo_bin_cmd!("ecgmon");
    cmd.args(["rate", "--input", csv.to_str().expect("utf8 path")]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: RateOutput = serde_json::from_slice(&output)?;

    assert_eq!(actual.summary.diagnosis.as_deref(), Some("Bradycardia"));
    assert!(!actual.episodes.is_empty());
    assert!(actual.episodes.iter().all(|e| e.diagnosis == "Bradycardia"));
    Ok(())
}

#[test]
fn filter_preserves_length() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let txt = dir.path().join("samples.txt");
    let samples: Vec<String> = (0..500).map(|i| format!("{}", (i as f64 * 0.05).sin())).collect();
    fs::write(&txt, samples.join("\n"))?;

    let mut cmd = cargo_bin_cmd!("ecgmon");
    cmd.args([
        "filter",
        "--input",
        txt.to_str().expect("utf8 path"),
        "--fs",
        "250",
        "--cutoff-hz",
        "20",
        "--order",
        "2",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output)?;
    let values: Vec<f64> = text.lines().map(|l| l.parse()).collect::<Result<_, _>>()?;
    assert_eq!(values.len(), 500);
    Ok(())
}

#[test]
fn filter_rejects_cutoff_above_nyquist() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let txt = dir.path().join("samples.txt");
    fs::write(&txt, "0.0\n1.0\n0.0\n")?;

    let mut cmd = cargo_bin_cmd!("ecgmon");
    cmd.args([
        "filter",
        "--input",
        txt.to_str().expect("utf8 path"),
        "--fs",
        "100",
        "--cutoff-hz",
        "60",
    ]);
    cmd.assert().failure();
    Ok(())
}

#[test]
fn segment_emits_normalised_windows() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let csv = dir.path().join("normal.csv");
    write_recording(&csv, 250.0, 10.0, 0.8)?;

    let mut cmd = cargo_bin_cmd!("ecgmon");
    cmd.args([
        "segment",
        "--input",
        csv.to_str().expect("utf8 path"),
        "--half-window",
        "50",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let beats: Vec<Beat> = serde_json::from_slice(&output)?;

    assert!(!beats.is_empty());
    for beat in &beats {
        assert_eq!(beat.samples.len(), 100);
        assert!(beat.peak >= 50);
        let mean = beat.samples.iter().sum::<f64>() / 100.0;
        assert!(mean.abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn unsupported_input_fails_cleanly() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("trace.edf");
    fs::write(&path, "not really edf")?;

    let mut cmd = cargo_bin_cmd!("ecgmon");
    cmd.args(["rate", "--input", path.to_str().expect("utf8 path")]);
    cmd.assert().failure();
    Ok(())
}

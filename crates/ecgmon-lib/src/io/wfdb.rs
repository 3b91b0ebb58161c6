use crate::error::{MonitorError, Result};
use crate::signal::{Waveform, DEFAULT_SAMPLING_RATE_HZ};
use log::warn;
use std::panic;
use std::path::{Path, PathBuf};

/// `.dat` and `.atr` siblings resolve to the record's header.
pub fn header_path(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("hea") => path.to_path_buf(),
        _ => path.with_extension("hea"),
    }
}

/// Load one lead of a WFDB record in physical units on an `i / fs` time axis.
pub fn load_wfdb_waveform(path: &Path, lead: usize) -> Result<Waveform> {
    let header_path = header_path(path);
    if !header_path.is_file() {
        return Err(MonitorError::load(path, "WFDB header not found"));
    }
    // the parser panics on malformed records instead of returning an error
    let parsed = panic::catch_unwind(|| wfdb_rust::parse_wfdb(header_path.as_path()));
    let (header, signals) = match parsed {
        Ok(record) => record,
        Err(_) => {
            warn!("WFDB parser rejected {}", header_path.display());
            return Err(MonitorError::load(path, "malformed WFDB record"));
        }
    };
    if lead >= signals.len() || lead >= header.signal_specs.len() {
        return Err(MonitorError::load(
            path,
            format!(
                "record contains {} signals, but lead {} was requested",
                signals.len(),
                lead
            ),
        ));
    }
    let spec = &header.signal_specs[lead];
    let gain = spec.adc_gain.map(|g| g as f64).filter(|g| *g != 0.0).unwrap_or(1.0);
    let baseline = spec.baseline.or(spec.adc_zero).unwrap_or(0) as f64;
    let fs = header
        .record
        .sampling_frequency
        .map(|f| f as f64)
        .filter(|f| f.is_finite() && *f > 0.0)
        .unwrap_or(DEFAULT_SAMPLING_RATE_HZ);
    let amplitude = signals[lead]
        .iter()
        .map(|&sample| (sample as f64 - baseline) / gain)
        .collect();
    Waveform::from_uniform(amplitude, fs)
}

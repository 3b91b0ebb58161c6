//! Loader adapters: turn a file on disk into a validated [`Waveform`].

pub mod csv;
pub mod text;
pub mod wfdb;

use crate::error::{MonitorError, Result};
use crate::signal::{Waveform, DEFAULT_SAMPLING_RATE_HZ};
use log::info;
use std::path::Path;

/// Knobs for formats that do not carry their own time axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoaderOptions {
    /// Used by plain-text input.
    pub sampling_rate_hz: f64,
    /// WFDB signal index.
    pub lead: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            sampling_rate_hz: DEFAULT_SAMPLING_RATE_HZ,
            lead: 0,
        }
    }
}

/// Pick a loader from the file extension.
pub fn load_waveform(path: &Path, opts: &LoaderOptions) -> Result<Waveform> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let waveform = match ext.as_deref() {
        Some("csv") => csv::read_csv_waveform(path)?,
        Some("hea") | Some("dat") | Some("atr") => wfdb::load_wfdb_waveform(path, opts.lead)?,
        Some("txt") | None => text::read_text_waveform(path, opts.sampling_rate_hz)?,
        Some(other) => {
            return Err(MonitorError::load(
                path,
                format!("unsupported file extension .{}", other),
            ))
        }
    };
    info!(
        "loaded {} samples ({:.2} s) from {}",
        waveform.len(),
        waveform.duration(),
        path.display()
    );
    Ok(waveform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("trace.csv");
        fs::write(&csv_path, "time,ecg\n0.0,1.0\n0.004,2.0\n0.008,1.5\n").unwrap();
        let wf = load_waveform(&csv_path, &LoaderOptions::default()).unwrap();
        assert_eq!(wf.len(), 3);
        assert!((wf.sampling_rate().unwrap() - 250.0).abs() < 1e-6);

        let txt_path = dir.path().join("trace.txt");
        fs::write(&txt_path, "1.0\n2.0\n").unwrap();
        let opts = LoaderOptions {
            sampling_rate_hz: 100.0,
            lead: 0,
        };
        let wf = load_waveform(&txt_path, &opts).unwrap();
        assert!((wf.time()[1] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn unknown_extension_is_a_load_error() {
        let err = load_waveform(Path::new("trace.edf"), &LoaderOptions::default()).unwrap_err();
        assert!(matches!(err, MonitorError::Load { .. }));
    }
}

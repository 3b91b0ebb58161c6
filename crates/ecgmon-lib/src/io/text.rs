use crate::error::{MonitorError, Result};
use crate::signal::Waveform;
use std::path::Path;

/// Parse newline-delimited amplitudes, ignoring blank and `#` comment lines.
pub fn parse_amplitudes(text: &str) -> std::result::Result<Vec<f64>, String> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .map_err(|_| format!("line {} is not a number: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        return Err("no numeric samples found".into());
    }
    Ok(out)
}

/// Read a plain amplitude series and lay it on a uniform `i / fs` time axis.
pub fn read_text_waveform(path: &Path, fs: f64) -> Result<Waveform> {
    let text = std::fs::read_to_string(path).map_err(|e| MonitorError::load(path, e))?;
    let amplitude = parse_amplitudes(&text).map_err(|reason| MonitorError::load(path, reason))?;
    Waveform::from_uniform(amplitude, fs)
}

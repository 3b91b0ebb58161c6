use crate::config::MonitorConfig;
use crate::detectors::ecg::detect_peaks_with_config;
use crate::error::{MonitorError, Result};
use crate::filter::{bandpass_filter, filter};
use crate::metrics::rate::{batch_rate, RateSummary};
use crate::signal::{PeakSet, Waveform};
use log::{error, info};
use serde::Serialize;

/// A waveform after the filter, detector and batch rate stages.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedSignal {
    pub filtered: Vec<f64>,
    pub peaks: PeakSet,
    pub sampling_rate: f64,
    pub summary: RateSummary,
}

impl ProcessedSignal {
    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }
}

/// Filtered amplitude only: band-pass when a lower edge is configured.
pub fn filter_waveform(waveform: &Waveform, config: &MonitorConfig, fs: f64) -> Result<Vec<f64>> {
    let settings = &config.filter;
    match settings.highpass_hz {
        Some(low) => bandpass_filter(
            waveform.amplitude(),
            fs,
            low,
            settings.cutoff_hz,
            settings.order,
        ),
        None => filter(waveform.amplitude(), fs, settings.cutoff_hz, settings.order),
    }
}

/// Run filter, peak detection and batch rate over one waveform.
pub fn process_waveform(waveform: &Waveform, config: &MonitorConfig) -> Result<ProcessedSignal> {
    let fs = waveform.sampling_rate_or(config.default_sampling_rate_hz);
    let filtered = filter_waveform(waveform, config, fs)?;
    if filtered.len() != waveform.len() {
        let err = MonitorError::Invariant(format!(
            "filter returned {} samples for a {}-sample waveform",
            filtered.len(),
            waveform.len()
        ));
        error!("{}", err);
        return Err(err);
    }

    let detected = detect_peaks_with_config(&filtered, fs, &config.detector);
    let peaks = PeakSet::new(detected.indices().to_vec(), filtered.len()).map_err(|e| {
        error!("peak detection produced an invalid set: {}", e);
        e
    })?;
    let summary = batch_rate(waveform.time(), &peaks, &config.rate);
    info!(
        "processed {} samples at {:.1} Hz: {} peaks, {:.1} bpm",
        waveform.len(),
        fs,
        peaks.len(),
        summary.bpm
    );

    Ok(ProcessedSignal {
        filtered,
        peaks,
        sampling_rate: fs,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::ecg::tests::bumps;
    use crate::metrics::rate::Diagnosis;

    #[test]
    fn processes_a_regular_rhythm() {
        let fs = 250.0;
        // one beat every 0.8 s -> 75 bpm
        let centers: Vec<usize> = (1..12).map(|k| k * 200).collect();
        let amplitude = bumps(2500, &centers, 6.0);
        let wf = Waveform::from_uniform(amplitude, fs).unwrap();
        let processed = process_waveform(&wf, &MonitorConfig::default()).unwrap();

        assert_eq!(processed.len(), 2500);
        assert_eq!(processed.peaks.len(), centers.len());
        assert!((processed.summary.bpm - 75.0).abs() < 1.0);
        assert_eq!(processed.summary.diagnosis, Some(Diagnosis::Normal));
    }

    #[test]
    fn nyquist_violation_is_a_filter_error() {
        let wf = Waveform::from_uniform(vec![0.0; 100], 20.0).unwrap();
        let err = process_waveform(&wf, &MonitorConfig::default()).unwrap_err();
        assert!(matches!(err, MonitorError::FilterConfig(_)));
    }

    #[test]
    fn single_sample_uses_default_rate() {
        let wf = Waveform::new(vec![0.0], vec![1.0]).unwrap();
        let processed = process_waveform(&wf, &MonitorConfig::default()).unwrap();
        assert_eq!(processed.sampling_rate, 250.0);
        assert!(processed.peaks.is_empty());
        assert_eq!(processed.summary.bpm, 0.0);
    }
}

use crate::config::ClassifierSettings;
use crate::detectors::ecg::mean_and_sd;
use crate::signal::PeakSet;
use serde::Serialize;

/// External beat classifier consulted with one z-normalised beat window.
///
/// The label it returns is informational only; it never feeds the rate
/// estimator or the alarm.
pub trait BeatClassifier: Send + Sync {
    fn classify(&self, beat: &[f64]) -> Result<String, String>;
}

/// One segmented beat, centred on its R-peak.
#[derive(Debug, Clone, Serialize)]
pub struct BeatWindow {
    pub peak: usize,
    pub samples: Vec<f64>,
}

/// `signal[peak - half .. peak + half]`, z-normalised, if the window fits.
pub fn extract_beat(signal: &[f64], peak: usize, half_window: usize, epsilon: f64) -> Option<Vec<f64>> {
    if half_window == 0 || peak < half_window || peak + half_window >= signal.len() {
        return None;
    }
    let window = &signal[peak - half_window..peak + half_window];
    let (mean, sd) = mean_and_sd(window);
    Some(window.iter().map(|x| (x - mean) / (sd + epsilon)).collect())
}

/// Segment every peak whose window lies fully inside the signal.
pub fn extract_beats(signal: &[f64], peaks: &PeakSet, cfg: &ClassifierSettings) -> Vec<BeatWindow> {
    peaks
        .indices()
        .iter()
        .filter_map(|&peak| {
            extract_beat(signal, peak, cfg.half_window, cfg.epsilon)
                .map(|samples| BeatWindow { peak, samples })
        })
        .collect()
}

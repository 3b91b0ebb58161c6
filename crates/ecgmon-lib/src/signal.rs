use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Sampling rate assumed when the time axis is too short to derive one.
pub const DEFAULT_SAMPLING_RATE_HZ: f64 = 250.0;

/// Time axis plus amplitude samples of one recording.
///
/// Both sequences have the same length, at least one sample, finite values,
/// and a strictly increasing time axis. A waveform is never mutated after
/// construction; filtering produces a separate amplitude vector.
#[derive(Debug, Clone, Serialize)]
pub struct Waveform {
    time: Vec<f64>,
    amplitude: Vec<f64>,
}

impl Waveform {
    pub fn new(time: Vec<f64>, amplitude: Vec<f64>) -> Result<Self> {
        if amplitude.is_empty() {
            return Err(MonitorError::Input("waveform has no samples".into()));
        }
        if time.len() != amplitude.len() {
            return Err(MonitorError::Input(format!(
                "time axis has {} samples but amplitude has {}",
                time.len(),
                amplitude.len()
            )));
        }
        if let Some(idx) = time.iter().position(|t| !t.is_finite()) {
            return Err(MonitorError::Input(format!(
                "time value at sample {} is not finite",
                idx
            )));
        }
        if let Some(idx) = amplitude.iter().position(|v| !v.is_finite()) {
            return Err(MonitorError::Input(format!(
                "amplitude at sample {} is not finite",
                idx
            )));
        }
        if let Some(idx) = time.windows(2).position(|w| w[1] <= w[0]) {
            return Err(MonitorError::Input(format!(
                "time axis is not strictly increasing at sample {}",
                idx + 1
            )));
        }
        Ok(Self { time, amplitude })
    }

    /// Build a waveform from uniformly sampled amplitudes starting at t = 0.
    pub fn from_uniform(amplitude: Vec<f64>, fs: f64) -> Result<Self> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(MonitorError::Input(format!(
                "sampling rate must be positive, got {}",
                fs
            )));
        }
        let time = (0..amplitude.len()).map(|i| i as f64 / fs).collect();
        Self::new(time, amplitude)
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn amplitude(&self) -> &[f64] {
        &self.amplitude
    }

    pub fn len(&self) -> usize {
        self.amplitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitude.is_empty()
    }

    pub fn duration(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// `1 / (time[1] - time[0])`, or `None` for a single-sample waveform.
    pub fn sampling_rate(&self) -> Option<f64> {
        if self.time.len() < 2 {
            return None;
        }
        Some(1.0 / (self.time[1] - self.time[0]))
    }

    pub fn sampling_rate_or(&self, fallback: f64) -> f64 {
        self.sampling_rate()
            .filter(|fs| fs.is_finite() && *fs > 0.0)
            .unwrap_or(fallback)
    }

    /// Timestamp of a cursor position, clamped to the last sample.
    pub fn time_at(&self, index: usize) -> f64 {
        let idx = index.min(self.time.len().saturating_sub(1));
        self.time[idx]
    }

    /// Sample range whose timestamps fall inside `[start, end]`.
    pub fn index_range(&self, start: f64, end: f64) -> Range<usize> {
        let lo = self.time.partition_point(|&t| t < start);
        let hi = self.time.partition_point(|&t| t <= end);
        lo..hi.max(lo)
    }
}

/// Strictly increasing R-peak sample indices into one waveform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakSet {
    indices: Vec<usize>,
}

impl PeakSet {
    /// Validate `indices` against a waveform of `len` samples.
    pub fn new(indices: Vec<usize>, len: usize) -> Result<Self> {
        if let Some(w) = indices.windows(2).find(|w| w[1] <= w[0]) {
            return Err(MonitorError::Invariant(format!(
                "peak indices not strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }
        if let Some(&last) = indices.last() {
            if last >= len {
                return Err(MonitorError::Invariant(format!(
                    "peak index {} outside waveform of {} samples",
                    last, len
                )));
            }
        }
        Ok(Self { indices })
    }

    pub(crate) fn from_sorted(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of peaks at or before `cursor`.
    pub fn passed(&self, cursor: usize) -> usize {
        self.indices.partition_point(|&p| p <= cursor)
    }

    /// Peaks whose index falls inside `range`.
    pub fn within(&self, range: &Range<usize>) -> &[usize] {
        let lo = self.indices.partition_point(|&p| p < range.start);
        let hi = self.indices.partition_point(|&p| p < range.end);
        &self.indices[lo..hi.max(lo)]
    }
}

/// One instantaneous heart-rate reading, stamped with the later peak's time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub time: f64,
    pub bpm: f64,
}

/// Elapsed time between consecutive peaks, unfiltered.
pub fn rr_intervals(time: &[f64], peaks: &PeakSet) -> Vec<f64> {
    peaks
        .indices()
        .windows(2)
        .filter_map(|w| Some(time.get(w[1])? - time.get(w[0])?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_waveforms() {
        assert!(matches!(
            Waveform::new(vec![], vec![]),
            Err(MonitorError::Input(_))
        ));
        assert!(matches!(
            Waveform::new(vec![0.0, 1.0], vec![1.0]),
            Err(MonitorError::Input(_))
        ));
        assert!(matches!(
            Waveform::new(vec![0.0, 0.5, 0.5], vec![1.0, 2.0, 3.0]),
            Err(MonitorError::Input(_))
        ));
        assert!(matches!(
            Waveform::new(vec![0.0, 1.0], vec![f64::NAN, 2.0]),
            Err(MonitorError::Input(_))
        ));
    }

    #[test]
    fn derives_sampling_rate_from_time_axis() {
        let wf = Waveform::from_uniform(vec![0.0; 10], 360.0).unwrap();
        assert!((wf.sampling_rate().unwrap() - 360.0).abs() < 1e-9);
        let single = Waveform::new(vec![2.0], vec![1.0]).unwrap();
        assert_eq!(single.sampling_rate(), None);
        assert_eq!(single.sampling_rate_or(DEFAULT_SAMPLING_RATE_HZ), 250.0);
    }

    #[test]
    fn peak_set_validates_against_waveform() {
        assert!(PeakSet::new(vec![1, 5, 9], 10).is_ok());
        assert!(matches!(
            PeakSet::new(vec![1, 10], 10),
            Err(MonitorError::Invariant(_))
        ));
        assert!(matches!(
            PeakSet::new(vec![4, 4], 10),
            Err(MonitorError::Invariant(_))
        ));
    }

    #[test]
    fn peak_queries_by_cursor_and_range() {
        let peaks = PeakSet::new(vec![10, 20, 30], 40).unwrap();
        assert_eq!(peaks.passed(9), 0);
        assert_eq!(peaks.passed(20), 2);
        assert_eq!(peaks.within(&(15..31)), &[20, 30]);
        assert!(peaks.within(&(31..40)).is_empty());
    }

    #[test]
    fn index_range_covers_inclusive_window() {
        let wf = Waveform::from_uniform(vec![0.0; 11], 10.0).unwrap();
        assert_eq!(wf.index_range(0.2, 0.5), 2..6);
        assert_eq!(wf.index_range(5.0, 6.0), 11..11);
    }
}

use crate::config::RateSettings;
use crate::metrics::hrv::{hrv_time, HRVTime};
use crate::signal::{rr_intervals, HeartRateSample, PeakSet};
use log::debug;
use serde::{Deserialize, Serialize};

/// Rate-threshold classification; the only diagnosis the monitor emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Diagnosis {
    Bradycardia,
    Normal,
    Tachycardia,
}

impl Diagnosis {
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Diagnosis::Normal)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Diagnosis::Bradycardia => "Bradycardia",
            Diagnosis::Normal => "Normal",
            Diagnosis::Tachycardia => "Tachycardia",
        }
    }
}

pub fn bpm_from_rr(rr_s: f64) -> f64 {
    60.0 / rr_s
}

/// Aggregate rate over a whole recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSummary {
    /// `60 / mean(valid RR)`, or 0 when no interval is valid.
    pub bpm: f64,
    pub diagnosis: Option<Diagnosis>,
    pub valid_intervals: usize,
    pub rejected_intervals: usize,
    pub hrv: HRVTime,
}

/// Batch mode: every consecutive peak pair, invalid intervals discarded.
pub fn batch_rate(time: &[f64], peaks: &PeakSet, settings: &RateSettings) -> RateSummary {
    let all = rr_intervals(time, peaks);
    let valid: Vec<f64> = all
        .iter()
        .copied()
        .filter(|rr| settings.is_valid_rr(*rr))
        .collect();
    let hrv = hrv_time(&valid);
    let bpm = if valid.is_empty() {
        0.0
    } else {
        bpm_from_rr(hrv.avnn)
    };
    RateSummary {
        bpm,
        diagnosis: (!valid.is_empty()).then(|| settings.classify(bpm)),
        valid_intervals: valid.len(),
        rejected_intervals: all.len() - valid.len(),
        hrv,
    }
}

/// An abnormal instantaneous rate found in a recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RhythmEvent {
    pub diagnosis: Diagnosis,
    /// Time of the earlier peak of the interval.
    pub time: f64,
    pub bpm: f64,
}

/// Per-interval bradycardia/tachycardia episodes over valid intervals.
pub fn rhythm_events(time: &[f64], peaks: &PeakSet, settings: &RateSettings) -> Vec<RhythmEvent> {
    peaks
        .indices()
        .windows(2)
        .filter_map(|w| {
            let start = *time.get(w[0])?;
            let rr = time.get(w[1])? - start;
            if !settings.is_valid_rr(rr) {
                return None;
            }
            let bpm = bpm_from_rr(rr);
            let diagnosis = settings.classify(bpm);
            diagnosis.is_abnormal().then_some(RhythmEvent {
                diagnosis,
                time: start,
                bpm,
            })
        })
        .collect()
}

/// Incremental mode used during playback.
///
/// Only the two most recently passed peaks matter. An invalid interval keeps
/// the previously reported rate so transient noise never blanks the display.
#[derive(Debug, Clone, Default)]
pub struct IncrementalRate {
    passed: usize,
    current: Option<f64>,
}

impl IncrementalRate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<f64> {
        self.current
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn diagnosis(&self, settings: &RateSettings) -> Option<Diagnosis> {
        self.current.map(|bpm| settings.classify(bpm))
    }

    /// Advance to `cursor`; returns the new reading if a fresh valid interval was passed.
    pub fn observe(
        &mut self,
        cursor: usize,
        time: &[f64],
        peaks: &PeakSet,
        settings: &RateSettings,
    ) -> Option<HeartRateSample> {
        let passed = peaks.passed(cursor);
        if passed == self.passed {
            return None;
        }
        self.passed = passed;
        if passed < 2 {
            return None;
        }
        let latest = peaks.indices()[passed - 1];
        let previous = peaks.indices()[passed - 2];
        let at = *time.get(latest)?;
        let rr = at - time.get(previous)?;
        self.accept(rr, at, settings)
    }

    /// Feed one interval directly, applying the same hold-last-value rule.
    pub fn accept(&mut self, rr: f64, at: f64, settings: &RateSettings) -> Option<HeartRateSample> {
        if !settings.is_valid_rr(rr) {
            debug!("holding rate: RR {:.3}s at {:.2}s outside band", rr, at);
            return None;
        }
        let bpm = bpm_from_rr(rr);
        self.current = Some(bpm);
        debug!("rate {:.1} bpm at {:.2}s", bpm, at);
        Some(HeartRateSample { time: at, bpm })
    }

    /// Forget passed peaks (playback restarted) but keep the last reading.
    pub fn rewind(&mut self) {
        self.passed = 0;
    }
}

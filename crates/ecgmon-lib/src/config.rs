use crate::error::{MonitorError, Result};
use crate::metrics::rate::Diagnosis;
use crate::signal::DEFAULT_SAMPLING_RATE_HZ;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Settings for the whole processing and monitoring pipeline.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Used when the time axis has fewer than two samples.
    pub default_sampling_rate_hz: f64,
    pub filter: FilterSettings,
    pub detector: DetectorSettings,
    pub rate: RateSettings,
    pub playback: PlaybackSettings,
    pub alarm: AlarmSettings,
    pub classifier: ClassifierSettings,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            default_sampling_rate_hz: DEFAULT_SAMPLING_RATE_HZ,
            filter: FilterSettings::default(),
            detector: DetectorSettings::default(),
            rate: RateSettings::default(),
            playback: PlaybackSettings::default(),
            alarm: AlarmSettings::default(),
            classifier: ClassifierSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Low-pass cutoff (Hz).
    pub cutoff_hz: f64,
    pub order: usize,
    /// Optional lower edge; when set the filter becomes a band-pass.
    pub highpass_hz: Option<f64>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            cutoff_hz: 15.0,
            order: 4,
            highpass_hz: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Peaks must exceed `mean + threshold_sd * stddev`.
    pub threshold_sd: f64,
    /// Minimum spacing between accepted peaks (seconds).
    pub refractory_s: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            threshold_sd: 2.0,
            refractory_s: 0.2,
        }
    }
}

/// Physiological RR band plus the rate classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateSettings {
    /// Exclusive lower bound on a usable RR interval (seconds).
    pub min_rr_s: f64,
    /// Exclusive upper bound on a usable RR interval (seconds).
    pub max_rr_s: f64,
    pub bradycardia_bpm: f64,
    pub tachycardia_bpm: f64,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            min_rr_s: 0.3,
            max_rr_s: 1.5,
            bradycardia_bpm: 60.0,
            tachycardia_bpm: 100.0,
        }
    }
}

impl RateSettings {
    pub fn is_valid_rr(&self, rr: f64) -> bool {
        rr > self.min_rr_s && rr < self.max_rr_s
    }

    pub fn classify(&self, bpm: f64) -> Diagnosis {
        if bpm < self.bradycardia_bpm {
            Diagnosis::Bradycardia
        } else if bpm > self.tachycardia_bpm {
            Diagnosis::Tachycardia
        } else {
            Diagnosis::Normal
        }
    }
}

/// How the view window follows the playback cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollPolicy {
    /// Cursor sits on the right edge; the view lags by a full window.
    #[default]
    Lagging,
    /// View jumps so the cursor lands in the middle.
    Centered,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub tick_ms: u64,
    /// Signal seconds played per wall-clock second.
    pub speed: f64,
    pub window_s: f64,
    pub scroll: ScrollPolicy,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            speed: 1.0,
            window_s: 5.0,
            scroll: ScrollPolicy::Lagging,
        }
    }
}

impl PlaybackSettings {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Cursor advance per tick so played time tracks wall-clock time.
    pub fn samples_per_tick(&self, fs: f64) -> f64 {
        fs * self.tick_ms as f64 * self.speed / 1000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmSettings {
    pub cooldown_s: f64,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self { cooldown_s: 4.0 }
    }
}

impl AlarmSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::try_from_secs_f64(self.cooldown_s).unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Samples kept on each side of a peak when segmenting a beat.
    pub half_window: usize,
    /// Added to the standard deviation during z-normalisation.
    pub epsilon: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            half_window: 125,
            epsilon: 1e-6,
        }
    }
}

impl MonitorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: MonitorConfig =
            toml::from_str(text).map_err(|e| MonitorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| MonitorError::load(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(MonitorError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        };
        positive("default_sampling_rate_hz", self.default_sampling_rate_hz)?;
        positive("filter.cutoff_hz", self.filter.cutoff_hz)?;
        if let Some(low) = self.filter.highpass_hz {
            positive("filter.highpass_hz", low)?;
        }
        if self.filter.order == 0 {
            return Err(MonitorError::Config("filter.order must be at least 1".into()));
        }
        positive("detector.refractory_s", self.detector.refractory_s)?;
        if !self.detector.threshold_sd.is_finite() {
            return Err(MonitorError::Config(
                "detector.threshold_sd must be finite".into(),
            ));
        }
        positive("rate.min_rr_s", self.rate.min_rr_s)?;
        if !(self.rate.max_rr_s > self.rate.min_rr_s) {
            return Err(MonitorError::Config(format!(
                "rate band ({}, {}) is empty",
                self.rate.min_rr_s, self.rate.max_rr_s
            )));
        }
        if !(self.rate.bradycardia_bpm <= self.rate.tachycardia_bpm) {
            return Err(MonitorError::Config(
                "rate.bradycardia_bpm must not exceed rate.tachycardia_bpm".into(),
            ));
        }
        if self.playback.tick_ms == 0 {
            return Err(MonitorError::Config("playback.tick_ms must be positive".into()));
        }
        positive("playback.speed", self.playback.speed)?;
        positive("playback.window_s", self.playback.window_s)?;
        if !(self.alarm.cooldown_s.is_finite() && self.alarm.cooldown_s >= 0.0) {
            return Err(MonitorError::Config(format!(
                "alarm.cooldown_s must be non-negative, got {}",
                self.alarm.cooldown_s
            )));
        }
        positive("classifier.epsilon", self.classifier.epsilon)?;
        Ok(())
    }
}

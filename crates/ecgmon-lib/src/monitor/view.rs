use crate::config::{MonitorConfig, ScrollPolicy};
use crate::metrics::rate::{Diagnosis, RateSummary};
use crate::monitor::alarm::{AlarmState, AlarmStatus};
use crate::monitor::playback::PlaybackState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Visible time slice `[start, start + duration]` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewWindow {
    pub start: f64,
    pub duration: f64,
}

impl ViewWindow {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Auto-scroll once the cursor leaves the window. `start` never decreases.
    pub fn follow(&mut self, cursor_time: f64, policy: ScrollPolicy) -> bool {
        if cursor_time <= self.end() {
            return false;
        }
        let start = match policy {
            ScrollPolicy::Lagging => cursor_time - self.duration,
            ScrollPolicy::Centered => cursor_time - self.duration / 2.0,
        };
        if start > self.start {
            self.start = start;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Empty,
    /// Filtered and ready to play.
    Ready,
    /// Raw waveform kept, but filtering or detection failed.
    ProcessingFailed,
}

/// Everything a consumer may read about the monitor, committed once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub status: SessionStatus,
    pub failure: Option<String>,
    pub playback: PlaybackState,
    pub tick: u64,
    pub cursor: usize,
    pub cursor_time: f64,
    pub sample_count: usize,
    pub sampling_rate: f64,
    pub window: ViewWindow,
    pub rate_bpm: Option<f64>,
    pub diagnosis: Option<Diagnosis>,
    pub alarm: AlarmStatus,
    pub aggregate: Option<RateSummary>,
    pub peak_count: usize,
    /// Latest label from the optional beat classifier; informational only.
    pub rhythm_label: Option<String>,
}

impl MonitorSnapshot {
    /// Snapshot of a monitor with nothing loaded.
    pub fn empty(config: &MonitorConfig) -> Self {
        Self {
            status: SessionStatus::Empty,
            failure: None,
            playback: PlaybackState::Idle,
            tick: 0,
            cursor: 0,
            cursor_time: 0.0,
            sample_count: 0,
            sampling_rate: config.default_sampling_rate_hz,
            window: ViewWindow::new(0.0, config.playback.window_s),
            rate_bpm: None,
            diagnosis: None,
            alarm: AlarmState::new(config.alarm.cooldown()).status(),
            aggregate: None,
            peak_count: 0,
            rhythm_label: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status != SessionStatus::Empty
    }

    pub fn is_running(&self) -> bool {
        self.playback == PlaybackState::Running
    }
}

/// Per-tick render notification: the committed snapshot plus the window slice.
#[derive(Debug, Clone)]
pub struct ViewFrame {
    pub snapshot: Arc<MonitorSnapshot>,
    /// Sample index of `time[0]` in the full waveform.
    pub first_index: usize,
    pub time: Vec<f64>,
    pub amplitude: Vec<f64>,
    /// Absolute peak indices inside the window.
    pub peaks: Vec<usize>,
}

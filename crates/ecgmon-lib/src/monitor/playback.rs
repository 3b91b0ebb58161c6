use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Running,
}

/// Read cursor advanced by a fixed, possibly fractional, step per tick.
///
/// The fractional position accumulates exactly; the published cursor is its
/// floor, clamped to `len`. Stopping always rewinds to zero.
#[derive(Debug, Clone)]
pub struct Playback {
    len: usize,
    samples_per_tick: f64,
    position: f64,
    state: PlaybackState,
    ticks: u64,
}

impl Playback {
    pub fn new(len: usize, samples_per_tick: f64) -> Self {
        Self {
            len,
            samples_per_tick,
            position: 0.0,
            state: PlaybackState::Idle,
            ticks: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlaybackState::Running
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn samples_per_tick(&self) -> f64 {
        self.samples_per_tick
    }

    /// Ticks since the current run started.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn cursor(&self) -> usize {
        (self.position.floor() as usize).min(self.len)
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor() >= self.len
    }

    /// Idle -> Running. Returns false when already running or nothing to play.
    pub fn start(&mut self) -> bool {
        if self.is_running() || self.len == 0 || !(self.samples_per_tick > 0.0) {
            return false;
        }
        self.state = PlaybackState::Running;
        true
    }

    /// One tick's worth of cursor movement; returns the new cursor.
    pub fn advance(&mut self) -> usize {
        if self.is_running() {
            self.position = (self.position + self.samples_per_tick).min(self.len as f64);
            self.ticks += 1;
        }
        self.cursor()
    }

    /// Running -> Idle with the cursor back at zero. No-op while idle.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = PlaybackState::Idle;
        self.position = 0.0;
        self.ticks = 0;
        true
    }
}

use crate::config::MonitorConfig;
use crate::detectors::beats::{extract_beat, BeatClassifier};
use crate::error::MonitorError;
use crate::metrics::rate::{Diagnosis, IncrementalRate};
use crate::monitor::alarm::{AlarmAction, AlarmState, AlarmStatus};
use crate::monitor::alert::AlertSink;
use crate::monitor::labeler::BeatLabeler;
use crate::monitor::playback::{Playback, PlaybackState};
use crate::monitor::view::{MonitorSnapshot, SessionStatus, ViewFrame, ViewWindow};
use crate::pipeline::{process_waveform, ProcessedSignal};
use crate::signal::{HeartRateSample, Waveform};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

/// One loaded waveform and every artifact derived from it.
///
/// Owned by a single writer. Dropping the session discards all derived state
/// at once; a new load always builds a new session.
pub struct Session {
    waveform: Waveform,
    processed: Option<ProcessedSignal>,
    failure: Option<MonitorError>,
    config: MonitorConfig,
    playback: Playback,
    window: ViewWindow,
    rate: IncrementalRate,
    history: Vec<HeartRateSample>,
    alarm: AlarmState,
    /// A reading was taken during the current run.
    fresh_rate: bool,
    rhythm_label: Option<String>,
    alerts: Arc<dyn AlertSink>,
    labeler: Option<BeatLabeler>,
}

impl Session {
    /// Process `waveform`. A filter failure still yields a session holding the
    /// raw trace, reported as [`SessionStatus::ProcessingFailed`].
    pub fn new(
        waveform: Waveform,
        config: MonitorConfig,
        alerts: Arc<dyn AlertSink>,
        classifier: Option<Arc<dyn BeatClassifier>>,
    ) -> Self {
        let (processed, failure) = match process_waveform(&waveform, &config) {
            Ok(processed) => (Some(processed), None),
            Err(err) => {
                warn!("processing failed, keeping raw waveform: {}", err);
                (None, Some(err))
            }
        };
        let fs = processed
            .as_ref()
            .map(|p| p.sampling_rate)
            .unwrap_or_else(|| waveform.sampling_rate_or(config.default_sampling_rate_hz));
        let playback = Playback::new(waveform.len(), config.playback.samples_per_tick(fs));
        let window = ViewWindow::new(waveform.time_at(0), config.playback.window_s);
        let alarm = AlarmState::new(config.alarm.cooldown());
        Self {
            waveform,
            processed,
            failure,
            config,
            playback,
            window,
            rate: IncrementalRate::new(),
            history: Vec::new(),
            alarm,
            fresh_rate: false,
            rhythm_label: None,
            alerts,
            labeler: classifier.map(BeatLabeler::spawn),
        }
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    pub fn processed(&self) -> Option<&ProcessedSignal> {
        self.processed.as_ref()
    }

    pub fn failure(&self) -> Option<&MonitorError> {
        self.failure.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        if self.processed.is_some() {
            SessionStatus::Ready
        } else {
            SessionStatus::ProcessingFailed
        }
    }

    pub fn is_running(&self) -> bool {
        self.playback.is_running()
    }

    pub fn cursor(&self) -> usize {
        self.playback.cursor()
    }

    pub fn window(&self) -> ViewWindow {
        self.window
    }

    /// Heart-rate readings accepted during playback, oldest first.
    pub fn history(&self) -> &[HeartRateSample] {
        &self.history
    }

    pub fn alarm_status(&self) -> AlarmStatus {
        self.alarm.status()
    }

    /// Begin playback. No-op without a processed signal or while running.
    pub fn start(&mut self) -> bool {
        if self.processed.is_none() {
            debug!("play ignored: no processed signal");
            return false;
        }
        if !self.playback.start() {
            return false;
        }
        self.fresh_rate = false;
        info!(
            "playback started: {} samples, {:.2} samples/tick",
            self.playback.len(),
            self.playback.samples_per_tick()
        );
        true
    }

    /// Back to idle with the cursor at zero; the view window is left alone.
    pub fn stop(&mut self) -> bool {
        if !self.playback.stop() {
            return false;
        }
        self.rate.rewind();
        let action = self.alarm.silence();
        self.dispatch(action);
        info!("playback stopped");
        true
    }

    /// Stop and reset the alarm before the session is discarded.
    pub fn close(&mut self) {
        self.stop();
        let action = self.alarm.reset();
        self.dispatch(action);
    }

    /// One scheduler step. Returns false when idle.
    ///
    /// Reaching the end leaves the cursor at `len`; [`finish_if_at_end`]
    /// rewinds it once that position has been published.
    ///
    /// [`finish_if_at_end`]: Self::finish_if_at_end
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.playback.is_running() {
            return false;
        }
        let Some(processed) = self.processed.as_ref() else {
            return false;
        };

        let cursor = self.playback.advance();
        let cursor_time = self.waveform.time_at(cursor);
        self.window.follow(cursor_time, self.config.playback.scroll);

        let before = self.rate.passed();
        if let Some(sample) =
            self.rate
                .observe(cursor, self.waveform.time(), &processed.peaks, &self.config.rate)
        {
            self.history.push(sample);
            self.fresh_rate = true;
        }
        let after = self.rate.passed();
        if let Some(labeler) = self.labeler.as_ref() {
            if let Some(label) = labeler.latest() {
                self.rhythm_label = Some(label);
            }
            if after > before {
                let settings = &self.config.classifier;
                for &peak in &processed.peaks.indices()[before..after] {
                    if let Some(beat) =
                        extract_beat(&processed.filtered, peak, settings.half_window, settings.epsilon)
                    {
                        labeler.submit(peak, beat);
                    }
                }
            }
        }

        let diagnosis = self.alarm_diagnosis();
        let action = self.alarm.evaluate(diagnosis, now);
        self.dispatch(action);
        true
    }

    /// Stop once the cursor has reached the end. Returns true if it stopped.
    pub fn finish_if_at_end(&mut self) -> bool {
        if !self.playback.is_running() || !self.playback.is_at_end() {
            return false;
        }
        info!("playback reached the end of the recording");
        self.stop()
    }

    pub fn toggle_alarm_enabled(&mut self) -> AlarmStatus {
        let action = self.alarm.toggle_enabled();
        self.dispatch(action);
        self.alarm.status()
    }

    pub fn toggle_alarm_pause(&mut self, now: Instant) -> AlarmStatus {
        let diagnosis = self.alarm_diagnosis();
        let action = self.alarm.toggle_pause(diagnosis, now);
        self.dispatch(action);
        self.alarm.status()
    }

    /// Rate held over from a previous run does not drive the alarm.
    fn alarm_diagnosis(&self) -> Option<Diagnosis> {
        if self.fresh_rate {
            self.rate.diagnosis(&self.config.rate)
        } else {
            None
        }
    }

    fn dispatch(&self, action: AlarmAction) {
        match action {
            AlarmAction::None => {}
            AlarmAction::Fire => {
                if let Some(bpm) = self.rate.current() {
                    self.alerts.raise(self.config.rate.classify(bpm), bpm);
                }
            }
            AlarmAction::Silence => self.alerts.silence(),
        }
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let cursor = self.playback.cursor();
        MonitorSnapshot {
            status: self.status(),
            failure: self.failure.as_ref().map(|e| e.to_string()),
            playback: self.playback.state(),
            tick: self.playback.ticks(),
            cursor,
            cursor_time: self.waveform.time_at(cursor),
            sample_count: self.waveform.len(),
            sampling_rate: self
                .processed
                .as_ref()
                .map(|p| p.sampling_rate)
                .unwrap_or_else(|| self.waveform.sampling_rate_or(self.config.default_sampling_rate_hz)),
            window: self.window,
            rate_bpm: self.rate.current(),
            diagnosis: self.rate.diagnosis(&self.config.rate),
            alarm: self.alarm.status(),
            aggregate: self.processed.as_ref().map(|p| p.summary),
            peak_count: self.processed.as_ref().map_or(0, |p| p.peaks.len()),
            rhythm_label: self.rhythm_label.clone(),
        }
    }

    /// Slice of the (filtered, if available) trace inside the view window.
    pub fn frame(&self, snapshot: Arc<MonitorSnapshot>) -> ViewFrame {
        let range = self.waveform.index_range(self.window.start, self.window.end());
        let (amplitude, peaks) = match self.processed.as_ref() {
            Some(p) => (&p.filtered[range.clone()], p.peaks.within(&range).to_vec()),
            None => (&self.waveform.amplitude()[range.clone()], Vec::new()),
        };
        ViewFrame {
            snapshot,
            first_index: range.start,
            time: self.waveform.time()[range.clone()].to_vec(),
            amplitude: amplitude.to_vec(),
            peaks,
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }
}

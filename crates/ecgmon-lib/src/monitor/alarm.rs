use crate::metrics::rate::Diagnosis;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Side effect requested by an alarm transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmAction {
    None,
    Fire,
    Silence,
}

/// Published view of the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmStatus {
    pub enabled: bool,
    pub paused: bool,
    /// The alert is currently sounding.
    pub active: bool,
}

/// Two orthogonal switches plus a cooldown timer.
///
/// Transitions are pure with respect to the outside world: they mutate the
/// record and return the [`AlarmAction`] the caller must carry out.
#[derive(Debug, Clone)]
pub struct AlarmState {
    enabled: bool,
    paused: bool,
    active: bool,
    last_fired_at: Option<Instant>,
    cooldown: Duration,
}

impl AlarmState {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            enabled: true,
            paused: false,
            active: false,
            last_fired_at: None,
            cooldown,
        }
    }

    pub fn status(&self) -> AlarmStatus {
        AlarmStatus {
            enabled: self.enabled,
            paused: self.paused,
            active: self.active,
        }
    }

    pub fn last_fired_at(&self) -> Option<Instant> {
        self.last_fired_at
    }

    fn cooled_down(&self, now: Instant) -> bool {
        match self.last_fired_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) > self.cooldown,
        }
    }

    /// The firing precondition as a single predicate.
    pub fn should_fire(&self, diagnosis: Option<Diagnosis>, now: Instant) -> bool {
        self.enabled
            && !self.paused
            && diagnosis.map_or(false, |d| d.is_abnormal())
            && self.cooled_down(now)
    }

    /// Re-evaluate against the latest classification.
    pub fn evaluate(&mut self, diagnosis: Option<Diagnosis>, now: Instant) -> AlarmAction {
        match diagnosis {
            None => AlarmAction::None,
            Some(Diagnosis::Normal) => {
                self.paused = false;
                self.silence()
            }
            Some(_) if self.should_fire(diagnosis, now) => {
                self.last_fired_at = Some(now);
                self.active = true;
                AlarmAction::Fire
            }
            Some(_) => AlarmAction::None,
        }
    }

    /// Turning off silences; turning on re-arms a stale pause.
    pub fn toggle_enabled(&mut self) -> AlarmAction {
        self.enabled = !self.enabled;
        if self.enabled {
            self.paused = false;
            AlarmAction::None
        } else {
            self.active = false;
            AlarmAction::Silence
        }
    }

    /// Pausing silences; unpausing re-evaluates immediately.
    pub fn toggle_pause(&mut self, diagnosis: Option<Diagnosis>, now: Instant) -> AlarmAction {
        self.paused = !self.paused;
        if self.paused {
            self.active = false;
            AlarmAction::Silence
        } else {
            self.evaluate(diagnosis, now)
        }
    }

    /// Stop the sound, leaving both switches alone.
    pub fn silence(&mut self) -> AlarmAction {
        if std::mem::replace(&mut self.active, false) {
            AlarmAction::Silence
        } else {
            AlarmAction::None
        }
    }

    /// Back to the initial record; silences anything still sounding.
    pub fn reset(&mut self) -> AlarmAction {
        let action = self.silence();
        *self = Self::new(self.cooldown);
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateSettings;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn forced_rate_sequence_fires_once_then_silences() {
        let rate = RateSettings::default();
        let mut alarm = AlarmState::new(secs(4));
        let t0 = Instant::now();
        let actions: Vec<AlarmAction> = [72.0, 45.0, 45.0, 72.0]
            .iter()
            .enumerate()
            .map(|(i, bpm)| alarm.evaluate(Some(rate.classify(*bpm)), t0 + secs(i as u64)))
            .collect();
        assert_eq!(
            actions,
            vec![
                AlarmAction::None,
                AlarmAction::Fire,
                AlarmAction::None,
                AlarmAction::Silence
            ]
        );
        assert!(!alarm.status().active);
    }

    #[test]
    fn refires_only_after_cooldown() {
        let mut alarm = AlarmState::new(secs(4));
        let t0 = Instant::now();
        let brady = Some(Diagnosis::Bradycardia);
        assert_eq!(alarm.evaluate(brady, t0), AlarmAction::Fire);
        assert_eq!(alarm.evaluate(brady, t0 + secs(4)), AlarmAction::None);
        assert_eq!(alarm.evaluate(brady, t0 + secs(5)), AlarmAction::Fire);
        assert_eq!(alarm.last_fired_at(), Some(t0 + secs(5)));
    }

    #[test]
    fn unpause_while_abnormal_fires_immediately() {
        let mut alarm = AlarmState::new(secs(4));
        let t0 = Instant::now();
        let tachy = Some(Diagnosis::Tachycardia);
        assert_eq!(alarm.evaluate(tachy, t0), AlarmAction::Fire);
        assert_eq!(alarm.toggle_pause(tachy, t0 + secs(1)), AlarmAction::Silence);
        assert!(alarm.status().paused);
        // paused: no firing even after the cooldown
        assert_eq!(alarm.evaluate(tachy, t0 + secs(6)), AlarmAction::None);
        assert_eq!(alarm.toggle_pause(tachy, t0 + secs(6)), AlarmAction::Fire);
        assert!(alarm.status().active);
    }

    #[test]
    fn unpause_inside_cooldown_waits() {
        let mut alarm = AlarmState::new(secs(4));
        let t0 = Instant::now();
        let brady = Some(Diagnosis::Bradycardia);
        alarm.evaluate(brady, t0);
        alarm.toggle_pause(brady, t0 + secs(1));
        assert_eq!(alarm.toggle_pause(brady, t0 + secs(2)), AlarmAction::None);
        assert_eq!(alarm.evaluate(brady, t0 + secs(5)), AlarmAction::Fire);
    }

    #[test]
    fn normal_rate_clears_stale_pause() {
        let mut alarm = AlarmState::new(secs(4));
        let t0 = Instant::now();
        alarm.toggle_pause(Some(Diagnosis::Bradycardia), t0);
        assert!(alarm.status().paused);
        assert_eq!(alarm.evaluate(Some(Diagnosis::Normal), t0), AlarmAction::None);
        assert!(!alarm.status().paused);
        assert_eq!(
            alarm.evaluate(Some(Diagnosis::Bradycardia), t0 + secs(1)),
            AlarmAction::Fire
        );
    }

    #[test]
    fn disabling_silences_and_enabling_unpauses() {
        let mut alarm = AlarmState::new(secs(4));
        let t0 = Instant::now();
        let brady = Some(Diagnosis::Bradycardia);
        alarm.evaluate(brady, t0);
        alarm.toggle_pause(brady, t0);
        assert_eq!(alarm.toggle_enabled(), AlarmAction::Silence);
        assert_eq!(alarm.evaluate(brady, t0 + secs(10)), AlarmAction::None);
        assert_eq!(alarm.toggle_enabled(), AlarmAction::None);
        let status = alarm.status();
        assert!(status.enabled && !status.paused && !status.active);
    }

    #[test]
    fn missing_rate_is_not_a_transition() {
        let mut alarm = AlarmState::new(secs(4));
        assert_eq!(alarm.evaluate(None, Instant::now()), AlarmAction::None);
        assert_eq!(alarm.silence(), AlarmAction::None);
    }

    #[test]
    fn reset_restores_initial_record() {
        let mut alarm = AlarmState::new(secs(4));
        let t0 = Instant::now();
        alarm.evaluate(Some(Diagnosis::Tachycardia), t0);
        alarm.toggle_enabled();
        alarm.toggle_enabled();
        alarm.evaluate(Some(Diagnosis::Tachycardia), t0 + secs(5));
        assert_eq!(alarm.reset(), AlarmAction::Silence);
        assert_eq!(alarm.last_fired_at(), None);
        assert_eq!(
            alarm.status(),
            AlarmStatus {
                enabled: true,
                paused: false,
                active: false
            }
        );
        assert_eq!(alarm.evaluate(Some(Diagnosis::Tachycardia), t0), AlarmAction::Fire);
    }
}

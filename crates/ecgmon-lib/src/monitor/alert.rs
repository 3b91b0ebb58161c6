use crate::metrics::rate::Diagnosis;
use log::{info, warn};

/// Audible/visual alert collaborator driven by the alarm state machine.
pub trait AlertSink: Send + Sync {
    fn raise(&self, diagnosis: Diagnosis, bpm: f64);
    fn silence(&self);
}

/// Default sink: alarm transitions go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlert;

impl AlertSink for LogAlert {
    fn raise(&self, diagnosis: Diagnosis, bpm: f64) {
        warn!("ALARM {} at {:.0} bpm", diagnosis.label(), bpm);
    }

    fn silence(&self) {
        info!("alarm silenced");
    }
}

use crate::detectors::beats::BeatClassifier;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, warn};
use std::sync::Arc;

/// Beats queued for classification before new ones are dropped.
const BEAT_QUEUE: usize = 16;

struct PendingBeat {
    peak: usize,
    samples: Vec<f64>,
}

/// Runs a [`BeatClassifier`] on its own thread.
///
/// The scheduler submits beats with [`submit`](Self::submit) and collects
/// labels with [`latest`](Self::latest); neither call blocks. Dropping the
/// labeler closes the queue and the thread exits after its current beat.
pub struct BeatLabeler {
    beats: Sender<PendingBeat>,
    labels: Receiver<String>,
}

impl BeatLabeler {
    pub fn spawn(classifier: Arc<dyn BeatClassifier>) -> Self {
        let (beat_tx, beat_rx) = bounded::<PendingBeat>(BEAT_QUEUE);
        let (label_tx, label_rx) = bounded(BEAT_QUEUE);
        std::thread::spawn(move || {
            for beat in beat_rx {
                match classifier.classify(&beat.samples) {
                    Ok(label) => {
                        if label_tx.try_send(label).is_err() {
                            debug!("label for sample {} dropped", beat.peak);
                        }
                    }
                    Err(err) => warn!("beat classifier failed at sample {}: {}", beat.peak, err),
                }
            }
            debug!("beat labeler exiting");
        });
        Self {
            beats: beat_tx,
            labels: label_rx,
        }
    }

    /// Queue one beat. Returns false when the queue is full and the beat was dropped.
    pub fn submit(&self, peak: usize, samples: Vec<f64>) -> bool {
        match self.beats.try_send(PendingBeat { peak, samples }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("classifier busy, beat at sample {} dropped", peak);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Most recent label produced since the last call, if any.
    pub fn latest(&self) -> Option<String> {
        self.labels.try_iter().last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::FixedLabel;
    use std::time::{Duration, Instant};

    fn wait_for_label(labeler: &BeatLabeler) -> Option<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(label) = labeler.latest() {
                return Some(label);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn labels_arrive_off_thread() {
        let labeler = BeatLabeler::spawn(Arc::new(FixedLabel("N".into())));
        assert!(labeler.latest().is_none());
        assert!(labeler.submit(100, vec![0.0, 1.0, 0.0]));
        assert_eq!(wait_for_label(&labeler).as_deref(), Some("N"));
        assert!(labeler.latest().is_none());
    }

    #[test]
    fn classifier_errors_produce_no_label() {
        let labeler = BeatLabeler::spawn(Arc::new(FixedLabel("N".into())));
        // an empty window is rejected by the test classifier
        assert!(labeler.submit(100, Vec::new()));
        assert!(labeler.submit(200, vec![1.0]));
        assert_eq!(wait_for_label(&labeler).as_deref(), Some("N"));
    }
}

use crate::config::MonitorConfig;
use crate::detectors::beats::BeatClassifier;
use crate::error::{MonitorError, Result};
use crate::io::{load_waveform, LoaderOptions};
use crate::monitor::alarm::AlarmStatus;
use crate::monitor::alert::{AlertSink, LogAlert};
use crate::monitor::playback::PlaybackState;
use crate::monitor::session::Session;
use crate::monitor::view::{MonitorSnapshot, ViewFrame};
use crate::signal::{HeartRateSample, Waveform};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

type SnapshotCell = Arc<RwLock<Arc<MonitorSnapshot>>>;

enum Command {
    Load {
        waveform: Box<Waveform>,
        reply: Sender<Arc<MonitorSnapshot>>,
    },
    Clear {
        reply: Sender<bool>,
    },
    Play {
        reply: Sender<bool>,
    },
    Stop {
        reply: Sender<bool>,
    },
    TogglePlayback {
        reply: Sender<PlaybackState>,
    },
    ToggleAlarm {
        reply: Sender<Result<AlarmStatus>>,
    },
    TogglePause {
        reply: Sender<Result<AlarmStatus>>,
    },
    History {
        reply: Sender<Vec<HeartRateSample>>,
    },
    Shutdown,
}

/// Configures and spawns a [`Monitor`].
pub struct MonitorBuilder {
    config: MonitorConfig,
    alerts: Arc<dyn AlertSink>,
    classifier: Option<Arc<dyn BeatClassifier>>,
    loader: LoaderOptions,
    frame_capacity: usize,
}

impl MonitorBuilder {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            alerts: Arc::new(LogAlert),
            classifier: None,
            loader: LoaderOptions::default(),
            frame_capacity: 32,
        }
    }

    pub fn alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn BeatClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn loader_options(mut self, loader: LoaderOptions) -> Self {
        self.loader = loader;
        self
    }

    /// Frames beyond this many unread are dropped.
    pub fn frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = capacity.max(1);
        self
    }

    pub fn spawn(self) -> Result<Monitor> {
        self.config.validate()?;
        let (command_tx, command_rx) = bounded(32);
        let (frame_tx, frame_rx) = bounded(self.frame_capacity);
        let snapshot: SnapshotCell =
            Arc::new(RwLock::new(Arc::new(MonitorSnapshot::empty(&self.config))));
        let worker = SchedulerWorker {
            commands: command_rx,
            frames: frame_tx,
            snapshot: snapshot.clone(),
            period: self.config.playback.tick_period(),
            config: self.config,
            alerts: self.alerts,
            classifier: self.classifier,
            session: None,
            next_tick: None,
        };
        let handle = std::thread::spawn(move || worker.run());
        Ok(Monitor {
            commands: command_tx,
            frames: frame_rx,
            snapshot,
            loader: self.loader,
            worker: Some(handle),
        })
    }
}

/// Handle to the playback scheduler thread.
///
/// Every control goes through the worker, which is the only writer of the
/// session. Readers get the last committed [`MonitorSnapshot`] or the
/// per-tick [`ViewFrame`] stream.
pub struct Monitor {
    commands: Sender<Command>,
    frames: Receiver<ViewFrame>,
    snapshot: SnapshotCell,
    loader: LoaderOptions,
    worker: Option<JoinHandle<()>>,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        MonitorBuilder::new(config).spawn()
    }

    pub fn builder(config: MonitorConfig) -> MonitorBuilder {
        MonitorBuilder::new(config)
    }

    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands
            .send(command(reply_tx))
            .map_err(|_| MonitorError::Disconnected)?;
        reply_rx.recv().map_err(|_| MonitorError::Disconnected)
    }

    /// Read and validate `path`, then replace the session.
    ///
    /// A loader failure leaves the current session untouched.
    pub fn load(&self, path: &Path) -> Result<Arc<MonitorSnapshot>> {
        let waveform = load_waveform(path, &self.loader).map_err(|err| {
            warn!("load ignored: {}", err);
            err
        })?;
        self.load_waveform(waveform)
    }

    pub fn load_waveform(&self, waveform: Waveform) -> Result<Arc<MonitorSnapshot>> {
        self.request(|reply| Command::Load {
            waveform: Box::new(waveform),
            reply,
        })
    }

    /// Drop the session. Returns false when nothing was loaded.
    pub fn clear(&self) -> Result<bool> {
        self.request(|reply| Command::Clear { reply })
    }

    /// Returns false when there is nothing playable or playback already runs.
    pub fn play(&self) -> Result<bool> {
        self.request(|reply| Command::Play { reply })
    }

    /// Returns false when already idle.
    pub fn stop(&self) -> Result<bool> {
        self.request(|reply| Command::Stop { reply })
    }

    pub fn toggle_playback(&self) -> Result<PlaybackState> {
        self.request(|reply| Command::TogglePlayback { reply })
    }

    pub fn toggle_alarm_enabled(&self) -> Result<AlarmStatus> {
        self.request(|reply| Command::ToggleAlarm { reply })?
    }

    pub fn toggle_alarm_pause(&self) -> Result<AlarmStatus> {
        self.request(|reply| Command::TogglePause { reply })?
    }

    pub fn history(&self) -> Result<Vec<HeartRateSample>> {
        self.request(|reply| Command::History { reply })
    }

    /// Last committed snapshot; never observes a half-applied tick.
    pub fn snapshot(&self) -> Arc<MonitorSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn frames(&self) -> &Receiver<ViewFrame> {
        &self.frames
    }

    /// Stop playback and join the worker.
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.join();
    }
}

struct SchedulerWorker {
    commands: Receiver<Command>,
    frames: Sender<ViewFrame>,
    snapshot: SnapshotCell,
    period: Duration,
    config: MonitorConfig,
    alerts: Arc<dyn AlertSink>,
    classifier: Option<Arc<dyn BeatClassifier>>,
    session: Option<Session>,
    /// Deadline of the next tick while running.
    next_tick: Option<Instant>,
}

impl SchedulerWorker {
    fn run(mut self) {
        loop {
            let command = match self.next_tick {
                Some(deadline) => match self.commands.recv_deadline(deadline) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                },
            };
            match command {
                Some(Command::Shutdown) => break,
                Some(command) => self.handle(command),
                None => self.tick(),
            }
        }
        self.close_session();
        debug!("scheduler worker exiting");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Load { waveform, reply } => {
                self.close_session();
                let session = Session::new(
                    *waveform,
                    self.config.clone(),
                    self.alerts.clone(),
                    self.classifier.clone(),
                );
                info!(
                    "session loaded: {} samples, status {:?}",
                    session.waveform().len(),
                    session.status()
                );
                self.session = Some(session);
                let _ = reply.send(self.publish());
            }
            Command::Clear { reply } => {
                let had_session = self.session.is_some();
                self.close_session();
                self.publish();
                let _ = reply.send(had_session);
            }
            Command::Play { reply } => {
                let started = self.start();
                let _ = reply.send(started);
            }
            Command::Stop { reply } => {
                let stopped = self.stop();
                let _ = reply.send(stopped);
            }
            Command::TogglePlayback { reply } => {
                let running = self.session.as_ref().is_some_and(|s| s.is_running());
                if running {
                    self.stop();
                } else {
                    self.start();
                }
                let state = self
                    .session
                    .as_ref()
                    .map_or(PlaybackState::Idle, |s| s.playback_state());
                let _ = reply.send(state);
            }
            Command::ToggleAlarm { reply } => {
                let status = match self.session.as_mut() {
                    Some(session) => Ok(session.toggle_alarm_enabled()),
                    None => Err(MonitorError::NoSignal),
                };
                self.publish();
                let _ = reply.send(status);
            }
            Command::TogglePause { reply } => {
                let status = match self.session.as_mut() {
                    Some(session) => Ok(session.toggle_alarm_pause(Instant::now())),
                    None => Err(MonitorError::NoSignal),
                };
                self.publish();
                let _ = reply.send(status);
            }
            Command::History { reply } => {
                let history = self
                    .session
                    .as_ref()
                    .map(|s| s.history().to_vec())
                    .unwrap_or_default();
                let _ = reply.send(history);
            }
            Command::Shutdown => {}
        }
    }

    fn start(&mut self) -> bool {
        let started = self.session.as_mut().is_some_and(|s| s.start());
        if started {
            self.next_tick = Some(Instant::now() + self.period);
            self.publish();
        }
        started
    }

    fn stop(&mut self) -> bool {
        let stopped = self.session.as_mut().is_some_and(|s| s.stop());
        if stopped {
            self.next_tick = None;
            self.publish();
        }
        stopped
    }

    fn tick(&mut self) {
        let started = Instant::now();
        let Some(session) = self.session.as_mut() else {
            self.next_tick = None;
            return;
        };
        session.tick(started);
        self.publish();
        // the end position is published once before the cursor rewinds
        let finished = self
            .session
            .as_mut()
            .is_some_and(|session| session.finish_if_at_end());
        if finished {
            self.publish();
        }
        let running = self.session.as_ref().is_some_and(|s| s.is_running());
        // an overrun tick shortens the next wait instead of skipping it
        self.next_tick = running.then(|| started + self.period);
    }

    /// Commit the current state, then offer a frame to the viewer.
    fn publish(&self) -> Arc<MonitorSnapshot> {
        let snapshot = Arc::new(match self.session.as_ref() {
            Some(session) => session.snapshot(),
            None => MonitorSnapshot::empty(&self.config),
        });
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        if let Some(session) = self.session.as_ref() {
            // a slow viewer loses frames; the scheduler never waits for it
            let _ = self.frames.try_send(session.frame(snapshot.clone()));
        }
        snapshot
    }

    fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        self.next_tick = None;
    }
}

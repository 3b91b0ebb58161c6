//! Real-time playback of a processed recording with rate tracking and alarm.

pub mod alarm;
pub mod alert;
pub mod labeler;
pub mod playback;
pub mod scheduler;
pub mod session;
pub mod view;

pub use alarm::{AlarmAction, AlarmState, AlarmStatus};
pub use alert::{AlertSink, LogAlert};
pub use labeler::BeatLabeler;
pub use playback::{Playback, PlaybackState};
pub use scheduler::{Monitor, MonitorBuilder};
pub use session::Session;
pub use view::{MonitorSnapshot, SessionStatus, ViewFrame, ViewWindow};

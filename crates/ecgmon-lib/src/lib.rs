pub mod config;
pub mod detectors;
pub mod error;
pub mod filter;
pub mod io;
pub mod metrics;
pub mod monitor;
pub mod pipeline;
pub mod signal;

pub use config::MonitorConfig;
pub use detectors::*;
pub use error::{MonitorError, Result};
pub use metrics::*;
pub use signal::*;
pub use monitor::{Monitor, MonitorBuilder, MonitorSnapshot, ViewFrame};
pub use pipeline::{process_waveform, ProcessedSignal};

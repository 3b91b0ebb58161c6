use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ecgmon_lib::{
    detectors::beats::extract_beats,
    io::{load_waveform, text as text_io, LoaderOptions},
    metrics::rate::{rhythm_events, Diagnosis, RateSummary, RhythmEvent},
    monitor::{AlertSink, Monitor, SessionStatus},
    pipeline::{filter_waveform, process_waveform},
    signal::{PeakSet, Waveform},
    MonitorConfig, MonitorSnapshot,
};
use env_logger::Env;
use log::info;
use serde::Serialize;
use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

#[derive(Parser)]
#[command(
    name = "ecgmon",
    version,
    about = "ECG monitor: filter, beat detection, heart rate and alarm playback"
)]
struct Cli {
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Input and processing options shared by every command.
#[derive(Args)]
struct SignalArgs {
    /// CSV (time,amplitude), WFDB (.hea/.dat) or plain text; stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,
    /// Sampling rate for plain-text input
    #[arg(long, default_value_t = 250.0)]
    fs: f64,
    /// WFDB signal index
    #[arg(long, default_value_t = 0)]
    lead: usize,
    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    cutoff_hz: Option<f64>,
    #[arg(long)]
    order: Option<usize>,
    /// Lower band edge; turns the low-pass into a band-pass
    #[arg(long)]
    highpass_hz: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the zero-phase filtered amplitude, one sample per line
    Filter {
        #[command(flatten)]
        signal: SignalArgs,
    },
    /// Detect R-peaks and print them as JSON
    FindPeaks {
        #[command(flatten)]
        signal: SignalArgs,
    },
    /// Aggregate heart rate, HRV summary and bradycardia/tachycardia episodes
    Rate {
        #[command(flatten)]
        signal: SignalArgs,
    },
    /// Z-normalised beat windows around each detected peak
    Segment {
        #[command(flatten)]
        signal: SignalArgs,
        #[arg(long)]
        half_window: Option<usize>,
    },
    /// Headless real-time playback printing one JSON snapshot per tick
    Play {
        #[command(flatten)]
        signal: SignalArgs,
        /// Signal seconds per wall-clock second
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long)]
        tick_ms: Option<u64>,
        /// Print every N-th tick
        #[arg(long, default_value_t = 1)]
        every: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();
    match cli.command {
        Commands::Filter { signal } => cmd_filter(&signal)?,
        Commands::FindPeaks { signal } => cmd_find_peaks(&signal)?,
        Commands::Rate { signal } => cmd_rate(&signal)?,
        Commands::Segment {
            signal,
            half_window,
        } => cmd_segment(&signal, half_window)?,
        Commands::Play {
            signal,
            speed,
            tick_ms,
            every,
        } => cmd_play(&signal, speed, tick_ms, every)?,
    }
    Ok(())
}

fn load_config(args: &SignalArgs) -> Result<MonitorConfig> {
    let mut config = match args.config.as_deref() {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(cutoff) = args.cutoff_hz {
        config.filter.cutoff_hz = cutoff;
    }
    if let Some(order) = args.order {
        config.filter.order = order;
    }
    if args.highpass_hz.is_some() {
        config.filter.highpass_hz = args.highpass_hz;
    }
    config.validate()?;
    Ok(config)
}

fn read_waveform(args: &SignalArgs) -> Result<Waveform> {
    match args.input.as_deref() {
        Some(path) => {
            let opts = LoaderOptions {
                sampling_rate_hz: args.fs,
                lead: args.lead,
            };
            Ok(load_waveform(path, &opts)?)
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read samples from stdin")?;
            let samples = text_io::parse_amplitudes(&buf).map_err(anyhow::Error::msg)?;
            Ok(Waveform::from_uniform(samples, args.fs)?)
        }
    }
}

fn input_label(args: &SignalArgs) -> String {
    args.input
        .as_deref()
        .map(Path::display)
        .map(|d| d.to_string())
        .unwrap_or_else(|| "stdin".into())
}

fn cmd_filter(args: &SignalArgs) -> Result<()> {
    let config = load_config(args)?;
    let waveform = read_waveform(args)?;
    let fs = waveform.sampling_rate_or(config.default_sampling_rate_hz);
    let filtered = filter_waveform(&waveform, &config, fs)
        .with_context(|| format!("filtering {}", input_label(args)))?;
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    for value in filtered {
        writeln!(out, "{}", value)?;
    }
    out.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct PeaksOutput {
    sampling_rate: f64,
    peaks: PeakSet,
    times: Vec<f64>,
}

fn cmd_find_peaks(args: &SignalArgs) -> Result<()> {
    let config = load_config(args)?;
    let waveform = read_waveform(args)?;
    let processed = process_waveform(&waveform, &config)
        .with_context(|| format!("processing {}", input_label(args)))?;
    let times = processed
        .peaks
        .indices()
        .iter()
        .map(|&i| waveform.time_at(i))
        .collect();
    let output = PeaksOutput {
        sampling_rate: processed.sampling_rate,
        peaks: processed.peaks,
        times,
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

#[derive(Serialize)]
struct RateOutput {
    sampling_rate: f64,
    peak_count: usize,
    summary: RateSummary,
    episodes: Vec<RhythmEvent>,
}

fn cmd_rate(args: &SignalArgs) -> Result<()> {
    let config = load_config(args)?;
    let waveform = read_waveform(args)?;
    let processed = process_waveform(&waveform, &config)
        .with_context(|| format!("processing {}", input_label(args)))?;
    let episodes = rhythm_events(waveform.time(), &processed.peaks, &config.rate);
    let output = RateOutput {
        sampling_rate: processed.sampling_rate,
        peak_count: processed.peaks.len(),
        summary: processed.summary,
        episodes,
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn cmd_segment(args: &SignalArgs, half_window: Option<usize>) -> Result<()> {
    let mut config = load_config(args)?;
    if let Some(half) = half_window {
        config.classifier.half_window = half;
    }
    let waveform = read_waveform(args)?;
    let processed = process_waveform(&waveform, &config)
        .with_context(|| format!("processing {}", input_label(args)))?;
    let beats = extract_beats(&processed.filtered, &processed.peaks, &config.classifier);
    info!(
        "{} of {} beats fit a {}-sample half window",
        beats.len(),
        processed.peaks.len(),
        config.classifier.half_window
    );
    println!("{}", serde_json::to_string(&beats)?);
    Ok(())
}

/// Alarm transitions as JSON lines on stdout, interleaved with snapshots.
struct StdoutAlert;

#[derive(Serialize)]
#[serde(tag = "alarm", rename_all = "lowercase")]
enum AlarmLine {
    Raise { diagnosis: Diagnosis, bpm: f64 },
    Silence,
}

impl StdoutAlert {
    fn emit(&self, line: &AlarmLine) {
        if let Ok(text) = serde_json::to_string(line) {
            println!("{}", text);
        }
    }
}

impl AlertSink for StdoutAlert {
    fn raise(&self, diagnosis: Diagnosis, bpm: f64) {
        self.emit(&AlarmLine::Raise { diagnosis, bpm });
    }

    fn silence(&self) {
        self.emit(&AlarmLine::Silence);
    }
}

fn print_snapshot(snapshot: &MonitorSnapshot) -> Result<()> {
    println!("{}", serde_json::to_string(snapshot)?);
    Ok(())
}

fn cmd_play(args: &SignalArgs, speed: Option<f64>, tick_ms: Option<u64>, every: u64) -> Result<()> {
    let mut config = load_config(args)?;
    if let Some(speed) = speed {
        config.playback.speed = speed;
    }
    if let Some(tick_ms) = tick_ms {
        config.playback.tick_ms = tick_ms;
    }
    config.validate()?;
    let every = every.max(1);
    let period = config.playback.tick_period();
    let waveform = read_waveform(args)?;

    let monitor = Monitor::builder(config)
        .alerts(Arc::new(StdoutAlert))
        .frame_capacity(256)
        .spawn()?;
    let loaded = monitor.load_waveform(waveform)?;
    if loaded.status == SessionStatus::ProcessingFailed {
        bail!(
            "processing {} failed: {}",
            input_label(args),
            loaded.failure.as_deref().unwrap_or("unknown error")
        );
    }
    // drain the frame published by the load itself
    while monitor.frames().try_recv().is_ok() {}
    if !monitor.play()? {
        bail!("nothing to play in {}", input_label(args));
    }

    let wait = period * 4 + Duration::from_millis(500);
    loop {
        match monitor.frames().recv_timeout(wait) {
            Ok(frame) => {
                let snapshot = &frame.snapshot;
                if !snapshot.is_running() {
                    print_snapshot(snapshot)?;
                    break;
                }
                if snapshot.tick % every == 0 {
                    print_snapshot(snapshot)?;
                }
            }
            Err(_) => {
                let snapshot = monitor.snapshot();
                if !snapshot.is_running() {
                    print_snapshot(&snapshot)?;
                    break;
                }
            }
        }
    }
    let history = monitor.history()?;
    info!("playback finished with {} rate readings", history.len());
    monitor.shutdown();
    Ok(())
}

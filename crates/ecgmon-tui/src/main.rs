use std::{
    io::{self, Stdout, Write},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ecgmon_lib::{
    metrics::rate::Diagnosis,
    monitor::{AlertSink, Monitor, PlaybackState, SessionStatus},
    MonitorConfig, MonitorSnapshot, ViewFrame,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::CrosstermBackend,
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap},
    Frame, Terminal,
};

fn main() -> Result<()> {
    let config = match std::env::var_os("ECGMON_CONFIG") {
        Some(path) => MonitorConfig::load(&PathBuf::from(path))?,
        None => MonitorConfig::default(),
    };
    let initial_path = std::env::args().nth(1).unwrap_or_default();

    let bell = Arc::new(BellAlert::default());
    let monitor = Monitor::builder(config)
        .alerts(bell.clone())
        .frame_capacity(8)
        .spawn()?;
    let mut app = App::new(monitor, &initial_path);

    let mut terminal = setup_terminal()?;
    let redraw = Duration::from_millis(30);
    let result = (|| -> Result<()> {
        while !app.should_quit {
            app.drain_frames();
            terminal.draw(|f| draw(f, &app))?;
            if bell.take_pending() {
                ring_bell(&mut terminal)?;
            }
            if event::poll(redraw)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        app.on_key(key);
                    }
                }
            }
        }
        Ok(())
    })();

    restore_terminal()?;
    app.monitor.shutdown();
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("initializing terminal")
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

/// Records alarm raises from the worker; the UI loop rings the bell between draws.
#[derive(Default)]
struct BellAlert {
    pending: AtomicBool,
}

impl BellAlert {
    fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

impl AlertSink for BellAlert {
    fn raise(&self, _diagnosis: Diagnosis, _bpm: f64) {
        self.pending.store(true, Ordering::Release);
    }

    fn silence(&self) {
        self.pending.store(false, Ordering::Release);
    }
}

fn ring_bell(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let out = terminal.backend_mut();
    out.write_all(b"\x07")?;
    out.flush()?;
    Ok(())
}

#[derive(Default)]
struct TextField {
    value: String,
    cursor: usize,
}

impl TextField {
    fn new(default: &str) -> Self {
        Self {
            value: default.to_string(),
            cursor: default.len(),
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                self.value.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                true
            }
            KeyCode::Backspace => {
                if let Some(c) = self.value[..self.cursor].chars().next_back() {
                    self.cursor -= c.len_utf8();
                    self.value.remove(self.cursor);
                }
                true
            }
            KeyCode::Delete => {
                if self.cursor < self.value.len() {
                    self.value.remove(self.cursor);
                }
                true
            }
            KeyCode::Left => {
                if let Some(c) = self.value[..self.cursor].chars().next_back() {
                    self.cursor -= c.len_utf8();
                }
                true
            }
            KeyCode::Right => {
                if let Some(c) = self.value[self.cursor..].chars().next() {
                    self.cursor += c.len_utf8();
                }
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = self.value.len();
                true
            }
            _ => false,
        }
    }
}

struct App {
    monitor: Monitor,
    path: TextField,
    editing: bool,
    frame: Option<ViewFrame>,
    status: String,
    should_quit: bool,
}

impl App {
    fn new(monitor: Monitor, initial_path: &str) -> Self {
        Self {
            monitor,
            path: TextField::new(initial_path),
            editing: initial_path.is_empty(),
            frame: None,
            status: "Tab edits the path. Enter load | Space play/stop | a alarm | p pause | c clear | q quit"
                .into(),
            should_quit: false,
        }
    }

    /// Keep only the newest frame; older ones are stale by definition.
    fn drain_frames(&mut self) {
        while let Ok(frame) = self.monitor.frames().try_recv() {
            self.frame = Some(frame);
        }
    }

    fn snapshot(&self) -> Arc<MonitorSnapshot> {
        self.monitor.snapshot()
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.editing {
            match key.code {
                KeyCode::Enter => {
                    self.editing = false;
                    self.load();
                }
                KeyCode::Esc | KeyCode::Tab => self.editing = false,
                _ => {
                    self.path.handle_key(&key);
                }
            }
            return;
        }
        let outcome = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                return;
            }
            KeyCode::Tab => {
                self.editing = true;
                return;
            }
            KeyCode::Enter => {
                self.load();
                return;
            }
            KeyCode::Char(' ') => self.monitor.toggle_playback().map(|state| match state {
                PlaybackState::Running => "Playing".to_string(),
                PlaybackState::Idle => "Stopped".to_string(),
            }),
            KeyCode::Char('a') => self.monitor.toggle_alarm_enabled().map(|s| {
                if s.enabled {
                    "Alarm enabled".to_string()
                } else {
                    "Alarm disabled".to_string()
                }
            }),
            KeyCode::Char('p') => self.monitor.toggle_alarm_pause().map(|s| {
                if s.paused {
                    "Alarm paused".to_string()
                } else {
                    "Alarm resumed".to_string()
                }
            }),
            KeyCode::Char('c') => self.monitor.clear().map(|cleared| {
                self.frame = None;
                if cleared {
                    "Cleared".to_string()
                } else {
                    "Nothing to clear".to_string()
                }
            }),
            _ => return,
        };
        self.status = match outcome {
            Ok(message) => message,
            Err(err) => format!("Error: {}", err),
        };
    }

    fn load(&mut self) {
        let path = PathBuf::from(self.path.value.trim());
        if path.as_os_str().is_empty() {
            self.status = "Enter a recording path first".into();
            return;
        }
        self.status = match self.monitor.load(&path) {
            Ok(snapshot) => match snapshot.status {
                SessionStatus::ProcessingFailed => format!(
                    "Processing failed: {}",
                    snapshot.failure.as_deref().unwrap_or("unknown error")
                ),
                _ => format!(
                    "Loaded {} samples @ {:.1} Hz, {} beats",
                    snapshot.sample_count, snapshot.sampling_rate, snapshot.peak_count
                ),
            },
            Err(err) => format!("Error: {}", err),
        };
    }
}

fn draw(f: &mut Frame, app: &App) {
    let snapshot = app.snapshot();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
            Constraint::Length(3),
        ])
        .split(f.size());
    render_path(f, layout[0], app);
    draw_chart(f, layout[1], app.frame.as_ref(), &snapshot);
    draw_readout(f, layout[2], &snapshot);
    draw_status(f, layout[3], app);
}

fn render_path(f: &mut Frame, area: Rect, app: &App) {
    let style = if app.editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let paragraph = Paragraph::new(app.path.value.as_str())
        .style(style)
        .block(Block::default().borders(Borders::ALL).title("Recording (csv / hea / txt)"));
    f.render_widget(paragraph, area);
    if app.editing {
        let prefix = &app.path.value[..app.path.cursor];
        let cursor_x = area.x + 1 + prefix.chars().count() as u16;
        f.set_cursor(cursor_x.min(area.right().saturating_sub(2)), area.y + 1);
    }
}

fn draw_chart(f: &mut Frame, area: Rect, frame: Option<&ViewFrame>, snapshot: &MonitorSnapshot) {
    let block = Block::default().borders(Borders::ALL).title("ECG");
    let Some(frame) = frame.filter(|fr| !fr.time.is_empty() && snapshot.is_loaded()) else {
        let body = Paragraph::new("Load a recording to start monitoring.")
            .wrap(Wrap { trim: true })
            .block(block);
        f.render_widget(body, area);
        return;
    };

    let trace: Vec<(f64, f64)> = frame
        .time
        .iter()
        .copied()
        .zip(frame.amplitude.iter().copied())
        .collect();
    let peaks: Vec<(f64, f64)> = frame
        .peaks
        .iter()
        .filter_map(|&idx| {
            let offset = idx.checked_sub(frame.first_index)?;
            Some((*frame.time.get(offset)?, *frame.amplitude.get(offset)?))
        })
        .collect();
    let (lo, hi) = frame
        .amplitude
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let pad = ((hi - lo) * 0.1).max(1e-3);
    let (y_lo, y_hi) = (lo - pad, hi + pad);
    let committed = &frame.snapshot;
    let cursor = [(committed.cursor_time, y_lo), (committed.cursor_time, y_hi)];
    let window = committed.window;

    let mut datasets = vec![Dataset::default()
        .name("filtered")
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(&trace)];
    if !peaks.is_empty() {
        datasets.push(
            Dataset::default()
                .name("R")
                .marker(Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Red))
                .data(&peaks),
        );
    }
    if committed.is_running() {
        datasets.push(
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow))
                .data(&cursor),
        );
    }

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([window.start, window.end()])
                .labels(vec![
                    Span::raw(format!("{:.1}s", window.start)),
                    Span::raw(format!("{:.1}s", window.end())),
                ]),
        )
        .y_axis(Axis::default().bounds([y_lo, y_hi]));
    f.render_widget(chart, area);
}

fn draw_readout(f: &mut Frame, area: Rect, snapshot: &MonitorSnapshot) {
    let rate = snapshot
        .rate_bpm
        .map(|bpm| format!("{:.0} bpm", bpm))
        .unwrap_or_else(|| "-- bpm".into());
    let (diagnosis, colour) = match snapshot.diagnosis {
        Some(Diagnosis::Normal) => ("Normal", Color::Green),
        Some(d) => (d.label(), Color::Red),
        None => ("--", Color::Gray),
    };
    let alarm = &snapshot.alarm;
    let alarm_text = if !alarm.enabled {
        "alarm off"
    } else if alarm.paused {
        "alarm paused"
    } else if alarm.active {
        "ALARM"
    } else {
        "alarm armed"
    };
    let alarm_style = if alarm.active {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let mut lines = vec![Line::from(vec![
        Span::styled(rate, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(diagnosis, Style::default().fg(colour)),
        Span::raw("  "),
        Span::styled(alarm_text, alarm_style),
    ])];
    let mut detail = format!(
        "{:?} | t = {:.2}s | sample {}/{}",
        snapshot.playback, snapshot.cursor_time, snapshot.cursor, snapshot.sample_count
    );
    if let Some(summary) = &snapshot.aggregate {
        detail.push_str(&format!(" | mean {:.0} bpm", summary.bpm));
    }
    if let Some(label) = &snapshot.rhythm_label {
        detail.push_str(&format!(" | beat {}", label));
    }
    lines.push(Line::from(detail));
    let readout = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Monitor"));
    f.render_widget(readout, area);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let status = Paragraph::new(app.status.as_str())
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
    f.render_widget(status, area);
}

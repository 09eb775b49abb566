//! Terminal display built on ratatui and crossterm
//!
//! ratatui redraws whole frames, so the display keeps the last version of
//! every widget it was given and redraws all of them in `present`, once per
//! batch of renders; the backend only writes the cells that changed. Input is read on a
//! dedicated OS thread because crossterm's reader blocks.

use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::app::display::{
    banner_area, gauge_area, DisplaySurface, GaugeWidget, InputEvent, InputEvents, KeyInput,
    Widget,
};
use crate::constants::display;
use crate::errors::{DisplayError, DisplayResult};

type CrosstermTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Full-screen terminal display
#[derive(Default)]
pub struct TerminalDisplay {
    terminal: Option<CrosstermTerminal>,
    banner: Option<String>,
    gauges: Vec<Option<GaugeWidget>>,
    events: Option<InputEvents>,
    reader: Option<JoinHandle<()>>,
    stop_reader: Arc<AtomicBool>,
    /// Widgets stored since the last frame was drawn
    pending: bool,
}

impl TerminalDisplay {
    /// Create a display; nothing touches the terminal until `init`
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&mut self, widget: &Widget) {
        match widget {
            Widget::Banner { text } => self.banner = Some(text.clone()),
            Widget::Gauge(gauge) => {
                if self.gauges.len() <= gauge.slot {
                    self.gauges.resize(gauge.slot + 1, None);
                }
                self.gauges[gauge.slot] = Some(gauge.clone());
            }
        }
        self.pending = true;
    }

    fn draw(&mut self) -> DisplayResult<()> {
        let Self {
            terminal,
            banner,
            gauges,
            ..
        } = self;
        let terminal = terminal.as_mut().ok_or(DisplayError::NotInitialized)?;

        terminal.draw(|frame| {
            if let Some(text) = banner {
                draw_banner(frame, text);
            }
            for gauge in gauges.iter().flatten() {
                draw_gauge(frame, gauge);
            }
        })?;
        Ok(())
    }

    fn start_reader(&mut self) -> io::Result<()> {
        let (tx, events) = InputEvents::channel();
        self.stop_reader.store(false, Ordering::Release);
        let stop = Arc::clone(&self.stop_reader);

        let reader = std::thread::Builder::new()
            .name("lbdl-input".to_string())
            .spawn(move || read_input(tx, stop))?;

        self.reader = Some(reader);
        self.events = Some(events);
        Ok(())
    }

    fn setup_terminal() -> io::Result<CrosstermTerminal> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.hide_cursor()?;
        terminal.clear()?;
        Ok(terminal)
    }
}

impl DisplaySurface for TerminalDisplay {
    fn init(&mut self) -> DisplayResult<()> {
        if self.terminal.is_some() {
            return Ok(());
        }
        if !atty::is(atty::Stream::Stdout) {
            return Err(DisplayError::NotATerminal);
        }

        match Self::setup_terminal() {
            Ok(terminal) => self.terminal = Some(terminal),
            Err(e) => {
                let _ = restore_terminal(None);
                return Err(e.into());
            }
        }

        if let Err(e) = self.start_reader() {
            let _ = restore_terminal(self.terminal.take().as_mut());
            return Err(e.into());
        }

        debug!("Terminal display initialized");
        Ok(())
    }

    fn render_widget(&mut self, widget: &Widget) -> DisplayResult<()> {
        if self.terminal.is_none() {
            return Err(DisplayError::NotInitialized);
        }
        self.store(widget);
        Ok(())
    }

    fn present(&mut self) -> DisplayResult<()> {
        if !self.pending {
            return Ok(());
        }
        self.draw()?;
        self.pending = false;
        Ok(())
    }

    fn poll_events(&mut self) -> DisplayResult<InputEvents> {
        if self.terminal.is_none() {
            return Err(DisplayError::NotInitialized);
        }
        self.events.take().ok_or(DisplayError::EventsTaken)
    }

    fn close(&mut self) -> DisplayResult<()> {
        self.stop_reader.store(true, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("Input reader thread panicked");
            }
        }

        match self.terminal.take() {
            Some(mut terminal) => {
                restore_terminal(Some(&mut terminal))?;
                debug!("Terminal display restored");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        if self.terminal.is_some() {
            let _ = self.close();
        }
    }
}

/// Leave raw mode and the alternate screen, attempting every step
fn restore_terminal(terminal: Option<&mut CrosstermTerminal>) -> io::Result<()> {
    let raw = disable_raw_mode();
    let screen = io::stdout().execute(LeaveAlternateScreen).map(|_| ());
    let cursor = match terminal {
        Some(terminal) => terminal.show_cursor(),
        None => Ok(()),
    };
    raw.and(screen).and(cursor)
}

/// Clip a widget area to the frame; `None` when nothing of it is visible
fn visible_area(frame: &Frame, area: Rect) -> Option<Rect> {
    let area = area.intersection(frame.size());
    (area.area() > 0).then_some(area)
}

fn draw_banner(frame: &mut Frame, text: &str) {
    if let Some(area) = visible_area(frame, banner_area()) {
        let banner = Paragraph::new(text.to_string()).block(Block::default().borders(Borders::ALL));
        frame.render_widget(banner, area);
    }
}

fn draw_gauge(frame: &mut Frame, gauge: &GaugeWidget) {
    let Some(area) = visible_area(frame, gauge_area(gauge.slot)) else {
        return;
    };

    let bar_colour = if gauge.complete {
        Color::Green
    } else {
        Color::Yellow
    };

    let widget = Gauge::default()
        .block(
            Block::default()
                .title(format!(" {} ", gauge.title))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White)),
        )
        .gauge_style(Style::default().fg(bar_colour))
        .percent(u16::from(gauge.percent.min(100)))
        .label(gauge.label.clone());

    frame.render_widget(widget, area);
}

fn read_input(tx: mpsc::Sender<InputEvent>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Acquire) {
        match event::poll(display::INPUT_POLL_INTERVAL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!("Input polling failed: {}", e);
                break;
            }
        }

        let event = match event::read() {
            Ok(event) => event,
            Err(e) => {
                warn!("Reading input failed: {}", e);
                break;
            }
        };

        if let Some(input) = translate_event(event) {
            if tx.blocking_send(input).is_err() {
                break;
            }
        }
    }
    debug!("Input reader stopped");
}

/// Map a crossterm event to an input event; key releases are dropped
fn translate_event(event: Event) -> Option<InputEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Release => None,
        Event::Key(key) => {
            let code = match key.code {
                KeyCode::Char(c) => KeyInput::Char(c),
                KeyCode::Esc => KeyInput::Esc,
                KeyCode::Enter => KeyInput::Enter,
                _ => KeyInput::Other,
            };
            Some(InputEvent::Key {
                code,
                ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
            })
        }
        Event::Resize(width, height) => Some(InputEvent::Resize { width, height }),
        _ => Some(InputEvent::Other),
    }
}

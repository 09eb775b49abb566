//! Display surface capability
//!
//! The supervisor draws through a [`DisplaySurface`]: one banner plus one
//! gauge per registered transfer, each gauge pinned to the slot given by the
//! transfer's registration index. Input comes back as a lazy stream of
//! [`InputEvent`]s which the event loop classifies.
//!
//! [`TerminalDisplay`] is the ratatui/crossterm implementation used by the
//! binaries.

pub mod terminal;

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use ratatui::layout::Rect;
use tokio::sync::mpsc;

use crate::constants::display;
use crate::errors::DisplayResult;

pub use terminal::TerminalDisplay;

/// Capability the supervisor requires from a display surface
///
/// All methods are called from the event loop task only.
pub trait DisplaySurface {
    /// Acquire the rendering context
    fn init(&mut self) -> DisplayResult<()>;

    /// Draw or update one widget
    fn render_widget(&mut self, widget: &Widget) -> DisplayResult<()>;

    /// Put everything rendered since the last call on screen
    ///
    /// Surfaces that draw inside `render_widget` keep the default.
    fn present(&mut self) -> DisplayResult<()> {
        Ok(())
    }

    /// Hand out the input event stream; a second call fails
    fn poll_events(&mut self) -> DisplayResult<InputEvents>;

    /// Restore the terminal to its prior state. Calling it again has no effect.
    fn close(&mut self) -> DisplayResult<()>;
}

/// One visual element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Widget {
    /// Title banner at the top of the view
    Banner { text: String },
    /// Progress gauge of one transfer
    Gauge(GaugeWidget),
}

/// Progress gauge of one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaugeWidget {
    /// Vertical position, equal to the transfer's registration index
    pub slot: usize,
    /// Transfer name shown in the border
    pub title: String,
    /// Percent complete, 0 to 100
    pub percent: u8,
    /// Text drawn over the bar
    pub label: String,
    /// Bar drawn in the "done" colour
    pub complete: bool,
}

/// Area of the banner
pub fn banner_area() -> Rect {
    Rect::new(0, 0, display::WIDGET_WIDTH, display::BANNER_HEIGHT)
}

/// Area of the gauge in `slot`
pub fn gauge_area(slot: usize) -> Rect {
    let offset = u16::try_from(slot)
        .unwrap_or(u16::MAX)
        .saturating_mul(display::GAUGE_HEIGHT);
    Rect::new(
        0,
        display::BANNER_HEIGHT.saturating_add(offset),
        display::WIDGET_WIDTH,
        display::GAUGE_HEIGHT,
    )
}

/// Key part of an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Esc,
    Enter,
    Other,
}

/// Input produced by the display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Key press
    Key { code: KeyInput, ctrl: bool },
    /// Terminal resized
    Resize { width: u16, height: u16 },
    /// Anything else (mouse, focus, paste)
    Other,
}

impl InputEvent {
    /// Plain key press
    pub fn key(c: char) -> Self {
        InputEvent::Key {
            code: KeyInput::Char(c),
            ctrl: false,
        }
    }

    /// Key press with Ctrl held
    pub fn ctrl(c: char) -> Self {
        InputEvent::Key {
            code: KeyInput::Char(c),
            ctrl: true,
        }
    }

    /// Whether the event asks the program to quit (`q` or `Ctrl-C`)
    pub fn is_quit(&self) -> bool {
        matches!(
            self,
            InputEvent::Key {
                code: KeyInput::Char('q' | 'Q'),
                ctrl: false,
            } | InputEvent::Key {
                code: KeyInput::Char('c' | 'C'),
                ctrl: true,
            }
        )
    }
}

/// Lazy stream of input events, ending when the producer goes away
#[derive(Debug)]
pub struct InputEvents {
    rx: mpsc::Receiver<InputEvent>,
}

impl InputEvents {
    /// Create a stream and the sender feeding it
    pub fn channel() -> (mpsc::Sender<InputEvent>, InputEvents) {
        let (tx, rx) = mpsc::channel(display::INPUT_CHANNEL_CAPACITY);
        (tx, InputEvents { rx })
    }
}

impl Stream for InputEvents {
    type Item = InputEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

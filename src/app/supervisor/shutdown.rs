//! Single-slot shutdown rendezvous
//!
//! Any number of producers (signal watcher, completion watcher, the event
//! loop's own input handling) hold a [`ShutdownHandle`]. Exactly one
//! [`ShutdownListener`] exists; it yields the first accepted request and its
//! `teardown` consumes it, so teardown cannot run twice.
//!
//! State machine: `Running -> ShutdownRequested -> TornDown`. Only the
//! request that moves the state out of `Running` is forwarded; every other
//! request returns immediately without touching the channel.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::display::DisplaySurface;
use crate::app::engine::TransferEngine;
use crate::constants::supervisor;

/// OS termination signal that requested shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Hangup,
    Interrupt,
    Terminate,
    Quit,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalKind::Hangup => "SIGHUP",
            SignalKind::Interrupt => "SIGINT",
            SignalKind::Terminate => "SIGTERM",
            SignalKind::Quit => "SIGQUIT",
        };
        f.write_str(name)
    }
}

/// Why shutdown was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOrigin {
    /// OS termination signal
    Signal(SignalKind),
    /// Quit key pressed in the display
    UserQuit,
    /// Engine reported that every transfer has finished
    TransfersFinished { natural: bool },
}

impl fmt::Display for ShutdownOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownOrigin::Signal(kind) => write!(f, "received {}", kind),
            ShutdownOrigin::UserQuit => f.write_str("quit requested by user"),
            ShutdownOrigin::TransfersFinished { natural: true } => {
                f.write_str("all transfers complete")
            }
            ShutdownOrigin::TransfersFinished { natural: false } => {
                f.write_str("transfer engine stopped")
            }
        }
    }
}

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownState {
    Running = 0,
    ShutdownRequested = 1,
    TornDown = 2,
}

impl ShutdownState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownState::Running,
            1 => ShutdownState::ShutdownRequested,
            _ => ShutdownState::TornDown,
        }
    }
}

/// What teardown did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Request that triggered the teardown
    pub origin: ShutdownOrigin,
    /// Whether the display restored the terminal without error
    pub display_restored: bool,
}

/// Constructor for the handle/listener pair
pub struct ShutdownCoordinator;

impl ShutdownCoordinator {
    /// Create the request slot
    pub fn channel() -> (ShutdownHandle, ShutdownListener) {
        let (tx, rx) = mpsc::channel(supervisor::SHUTDOWN_SLOT_CAPACITY);
        let state = Arc::new(AtomicU8::new(ShutdownState::Running as u8));

        (
            ShutdownHandle {
                tx,
                state: Arc::clone(&state),
            },
            ShutdownListener { rx, state },
        )
    }
}

/// Producer side of the shutdown slot
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::Sender<ShutdownOrigin>,
    state: Arc<AtomicU8>,
}

impl ShutdownHandle {
    /// Ask for shutdown. Never blocks.
    ///
    /// Returns `true` only for the request that was accepted; duplicates are
    /// absorbed and return `false`.
    pub fn request(&self, origin: ShutdownOrigin) -> bool {
        let accepted = self
            .state
            .compare_exchange(
                ShutdownState::Running as u8,
                ShutdownState::ShutdownRequested as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if !accepted {
            debug!("Shutdown already requested, ignoring: {}", origin);
            return false;
        }

        // the state transition guarantees this is the only send, so the
        // slot is empty unless the listener is gone
        match self.tx.try_send(origin) {
            Ok(()) => {
                info!("Shutdown requested: {}", origin);
                true
            }
            Err(e) => {
                warn!("Shutdown listener unavailable: {}", e);
                false
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether a request has been accepted
    pub fn is_requested(&self) -> bool {
        self.state() != ShutdownState::Running
    }
}

/// Consumer side of the shutdown slot
#[derive(Debug)]
pub struct ShutdownListener {
    rx: mpsc::Receiver<ShutdownOrigin>,
    state: Arc<AtomicU8>,
}

impl ShutdownListener {
    /// Wait for the accepted request
    ///
    /// Pends forever if every handle is dropped without requesting.
    pub async fn recv(&mut self) -> ShutdownOrigin {
        match self.rx.recv().await {
            Some(origin) => origin,
            None => std::future::pending().await,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Close the engine, then restore the display
    pub fn teardown<E, D>(self, origin: ShutdownOrigin, engine: &E, display: &mut D) -> ShutdownReport
    where
        E: TransferEngine,
        D: DisplaySurface,
    {
        info!("Shutting down: {}", origin);

        engine.close();
        let display_restored = match display.close() {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to restore display: {}", e);
                false
            }
        };

        self.state
            .store(ShutdownState::TornDown as u8, Ordering::Release);

        ShutdownReport {
            origin,
            display_restored,
        }
    }
}

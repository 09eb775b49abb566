//! OS signal handling for shutdown
//!
//! Hang-up, interrupt, terminate and quit all have the same effect: one
//! shutdown request through the coordinator's slot.

use std::io;

use tokio::task::JoinHandle;
use tracing::info;

use crate::app::supervisor::shutdown::{ShutdownHandle, ShutdownOrigin, SignalKind};

/// Forwards the first termination signal to the shutdown coordinator
pub struct SignalHandler {
    shutdown: ShutdownHandle,
}

impl SignalHandler {
    /// Create a signal handler feeding the given shutdown slot
    pub fn new(shutdown: ShutdownHandle) -> Self {
        Self { shutdown }
    }

    /// Install the signal listeners and spawn the watcher task
    ///
    /// Listeners are registered before this returns, so a signal arriving
    /// right after startup is not lost. Must be called inside a tokio runtime.
    pub fn setup(&self) -> io::Result<JoinHandle<()>> {
        #[cfg(unix)]
        let mut signals = unix::TerminationSignals::install()?;

        let shutdown = self.shutdown.clone();

        Ok(tokio::spawn(async move {
            #[cfg(unix)]
            let kind = signals.recv().await;

            #[cfg(not(unix))]
            let kind = {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                    return;
                }
                SignalKind::Interrupt
            };

            info!("{} received, initiating shutdown", kind);
            shutdown.request(ShutdownOrigin::Signal(kind));
        }))
    }
}

#[cfg(unix)]
mod unix {
    use std::io;

    use tokio::signal::unix::{signal, Signal, SignalKind as UnixSignalKind};

    use crate::app::supervisor::shutdown::SignalKind;

    pub(super) struct TerminationSignals {
        hangup: Signal,
        interrupt: Signal,
        terminate: Signal,
        quit: Signal,
    }

    impl TerminationSignals {
        pub(super) fn install() -> io::Result<Self> {
            Ok(Self {
                hangup: signal(UnixSignalKind::hangup())?,
                interrupt: signal(UnixSignalKind::interrupt())?,
                terminate: signal(UnixSignalKind::terminate())?,
                quit: signal(UnixSignalKind::quit())?,
            })
        }

        pub(super) async fn recv(&mut self) -> SignalKind {
            tokio::select! {
                _ = self.hangup.recv() => SignalKind::Hangup,
                _ = self.interrupt.recv() => SignalKind::Interrupt,
                _ = self.terminate.recv() => SignalKind::Terminate,
                _ = self.quit.recv() => SignalKind::Quit,
            }
        }
    }
}

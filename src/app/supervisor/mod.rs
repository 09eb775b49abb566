//! Transfer supervision and the live progress view
//!
//! The supervisor owns the registry of transfers, polls the engine for byte
//! counts on a fixed period, renders one gauge per transfer, and coordinates
//! a single teardown no matter how many shutdown triggers fire.
//!
//! # Architecture
//!
//! - [`registry`] - Transfer records and their display state
//! - [`poller`] - Periodic progress polling and gauge rendering
//! - [`shutdown`] - Single-slot shutdown rendezvous and teardown
//! - [`signals`] - OS signal forwarding
//! - [`completion`] - Engine completion forwarding
//! - [`config`] - Supervisor configuration
//!
//! # Examples
//!
//! ```rust,no_run
//! use lbdl::app::{Supervisor, SupervisorConfig, SimulatedEngine, TerminalDisplay};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Arc::new(SimulatedEngine::new());
//! let mut supervisor = Supervisor::new(
//!     SupervisorConfig::default(),
//!     engine,
//!     TerminalDisplay::default(),
//! );
//!
//! supervisor.register_locator("sim://demo?size=1048576&rate=65536").await?;
//!
//! let report = supervisor.run().await?;
//! println!("Stopped: {}", report.shutdown.origin);
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod config;
pub mod poller;
pub mod registry;
pub mod shutdown;
pub mod signals;

#[cfg(test)]
pub mod tests;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::app::display::{DisplaySurface, InputEvent, Widget};
use crate::app::engine::TransferEngine;
use crate::app::sources::TransferSources;
use crate::errors::{EngineResult, SupervisorError, SupervisorResult};

pub use completion::CompletionWatcher;
pub use config::SupervisorConfig;
pub use poller::{ProgressPoller, TickSummary};
pub use registry::{
    percent_complete, progress_label, DisplayState, RecordId, TransferRecord, TransferRegistry,
};
pub use shutdown::{
    ShutdownCoordinator, ShutdownHandle, ShutdownListener, ShutdownOrigin, ShutdownReport,
    ShutdownState, SignalKind,
};
pub use signals::SignalHandler;

/// Summary of a finished supervision session
#[derive(Debug, Clone)]
pub struct SupervisorReport {
    /// What teardown did and why
    pub shutdown: ShutdownReport,
    /// Progress polls run
    pub ticks: u64,
    /// Transfers supervised
    pub transfers: usize,
    /// Transfers seen at 100%
    pub complete: usize,
    /// Wall time from start of `run` to the end of teardown
    pub elapsed: Duration,
}

/// Owns the registry, the display and the shutdown slot for one session
pub struct Supervisor<E: TransferEngine, D: DisplaySurface> {
    config: SupervisorConfig,
    engine: Arc<E>,
    display: D,
    registry: TransferRegistry<E::Handle>,
    poller: ProgressPoller,
    shutdown: ShutdownHandle,
    listener: ShutdownListener,
}

impl<E: TransferEngine, D: DisplaySurface> Supervisor<E, D> {
    /// Create a supervisor with an empty registry
    pub fn new(config: SupervisorConfig, engine: Arc<E>, display: D) -> Self {
        let (shutdown, listener) = ShutdownCoordinator::channel();

        Self {
            config,
            engine,
            display,
            registry: TransferRegistry::new(),
            poller: ProgressPoller::new(),
            shutdown,
            listener,
        }
    }

    /// Add a transfer from a descriptor file
    pub async fn register_descriptor(&mut self, path: &Path) -> EngineResult<RecordId> {
        let handle = self.engine.add_from_descriptor(path).await?;
        Ok(self.register_handle(handle))
    }

    /// Add a transfer from a locator
    pub async fn register_locator(&mut self, locator: &str) -> EngineResult<RecordId> {
        let handle = self.engine.add_from_locator(locator).await?;
        Ok(self.register_handle(handle))
    }

    /// Register every discovered source, descriptors first
    ///
    /// Sources the engine rejects are logged and skipped. Returns the number
    /// registered.
    pub async fn register_sources(&mut self, sources: &TransferSources) -> usize {
        let mut registered = 0;

        for path in &sources.descriptors {
            match self.register_descriptor(path).await {
                Ok(_) => registered += 1,
                Err(e) => warn!("Skipping descriptor {}: {}", path.display(), e),
            }
        }

        for locator in &sources.locators {
            match self.register_locator(locator).await {
                Ok(_) => registered += 1,
                Err(e) => warn!("Skipping locator {}: {}", locator, e),
            }
        }

        info!(
            "Registered {} of {} transfer sources",
            registered,
            sources.len()
        );
        registered
    }

    /// Registered transfers
    pub fn registry(&self) -> &TransferRegistry<E::Handle> {
        &self.registry
    }

    /// Handle for requesting shutdown from outside the event loop
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Run until shutdown, then tear down
    ///
    /// # Errors
    ///
    /// Fails before the loop starts when the configuration is invalid, no
    /// transfers are registered, the display cannot be initialized, or
    /// signal listeners cannot be installed. Once the loop runs, every path
    /// out of it ends in teardown and an `Ok` report.
    pub async fn run(mut self) -> SupervisorResult<SupervisorReport> {
        let started = Instant::now();

        self.config.validate()?;

        if self.registry.is_empty() {
            error!("No transfers registered, nothing to supervise");
            return Err(SupervisorError::NoTransfers);
        }

        self.display.init().map_err(SupervisorError::DisplayInit)?;
        self.render_banner();
        self.poller.render_all(&self.registry, &mut self.display);

        let mut input = match self.display.poll_events() {
            Ok(input) => input,
            Err(e) => return Err(self.abort_startup(SupervisorError::DisplayInit(e))),
        };

        let signal_task = if self.config.handle_signals {
            match SignalHandler::new(self.shutdown.clone()).setup() {
                Ok(task) => Some(task),
                Err(e) => return Err(self.abort_startup(SupervisorError::Signal(e))),
            }
        } else {
            None
        };

        let completion_task = self
            .config
            .exit_on_completion
            .then(|| CompletionWatcher::start(Arc::clone(&self.engine), self.shutdown.clone()));

        info!(
            "Supervising {} transfers, polling every {:?}",
            self.registry.count(),
            self.config.tick_interval
        );

        let period = self.config.tick_interval;
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut input_open = true;

        let origin = loop {
            tokio::select! {
                biased;

                origin = self.listener.recv() => break origin,

                event = input.next(), if input_open => match event {
                    Some(event) => self.handle_input(event),
                    None => {
                        debug!("Input stream ended");
                        input_open = false;
                    }
                },

                _ = ticker.tick() => {
                    let summary = self.poller.tick(
                        &mut self.registry,
                        self.engine.as_ref(),
                        &mut self.display,
                    );
                    trace!(
                        "Tick {}: {} updated, {} skipped, {} complete",
                        self.poller.ticks(),
                        summary.updated,
                        summary.skipped,
                        summary.complete
                    );
                }
            }
        };

        // a reader blocked on a full channel must see the stream gone before
        // the display joins it
        drop(input);

        let shutdown = self
            .listener
            .teardown(origin, self.engine.as_ref(), &mut self.display);

        stop_watcher(signal_task);
        stop_watcher(completion_task);

        let report = SupervisorReport {
            shutdown,
            ticks: self.poller.ticks(),
            transfers: self.registry.count(),
            complete: self.registry.complete_count(),
            elapsed: started.elapsed(),
        };

        info!(
            "Session ended after {:?}: {} of {} transfers complete",
            report.elapsed, report.complete, report.transfers
        );

        Ok(report)
    }

    fn register_handle(&mut self, handle: E::Handle) -> RecordId {
        let title = self.engine.name(&handle);
        debug!("Registering {} in slot {}", title, self.registry.count());
        self.registry.register(handle, title)
    }

    fn handle_input(&mut self, event: InputEvent) {
        if event.is_quit() {
            self.shutdown.request(ShutdownOrigin::UserQuit);
            return;
        }

        match event {
            InputEvent::Resize { width, height } => {
                debug!("Display resized to {}x{}", width, height);
                self.render_banner();
                self.poller.render_all(&self.registry, &mut self.display);
            }
            other => trace!("Ignoring input {:?}", other),
        }
    }

    fn render_banner(&mut self) {
        let banner = Widget::Banner {
            text: self.config.banner.clone(),
        };
        if let Err(e) = self.display.render_widget(&banner) {
            warn!("Failed to render banner: {}", e);
        }
    }

    /// Restore the display after a startup failure past `init`
    fn abort_startup(&mut self, err: SupervisorError) -> SupervisorError {
        error!("Startup failed: {}", err);
        if let Err(e) = self.display.close() {
            warn!("Failed to restore display: {}", e);
        }
        err
    }
}

fn stop_watcher<T>(task: Option<JoinHandle<T>>) {
    if let Some(task) = task {
        task.abort();
    }
}

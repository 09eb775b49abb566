//! Simulated transfer engine
//!
//! Accepts `sim://<name>?size=<bytes>&rate=<bytes per second>` locators and
//! reports progress as a linear function of the time since registration.
//! Nothing is downloaded and nothing is written to disk.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use crate::app::engine::{file_name_from_url, TransferDescriptor, TransferEngine};
use crate::constants::simulation;
use crate::errors::{EngineError, EngineResult};

/// One synthetic transfer
#[derive(Debug)]
pub struct SimulatedTransfer {
    id: usize,
    name: String,
    size: u64,
    rate: u64,
    started: Instant,
}

impl SimulatedTransfer {
    /// Engine-assigned identifier
    pub fn id(&self) -> usize {
        self.id
    }

    /// Total size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Simulated throughput in bytes per second
    pub fn rate(&self) -> u64 {
        self.rate
    }

    fn completed_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        let transferred = (elapsed * self.rate as f64) as u64;
        transferred.min(self.size)
    }

    fn finishes_at(&self) -> Instant {
        Duration::try_from_secs_f64(self.size as f64 / self.rate as f64)
            .ok()
            .and_then(|duration| self.started.checked_add(duration))
            .unwrap_or_else(|| Instant::now() + simulation::FAR_FUTURE)
    }
}

/// Transfer engine producing synthetic progress
pub struct SimulatedEngine {
    transfers: Mutex<Vec<Arc<SimulatedTransfer>>>,
    next_id: AtomicUsize,
    closed: watch::Sender<bool>,
}

impl SimulatedEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            transfers: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            closed,
        }
    }

    /// Build a locator understood by this engine
    pub fn locator(name: &str, size: u64, rate: u64) -> String {
        format!(
            "{}://{}?size={}&rate={}",
            simulation::SCHEME,
            name,
            size,
            rate
        )
    }

    /// Number of registered transfers
    pub fn transfer_count(&self) -> usize {
        self.lock_transfers().len()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn lock_transfers(&self) -> std::sync::MutexGuard<'_, Vec<Arc<SimulatedTransfer>>> {
        self.transfers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn latest_finish(&self) -> Option<Instant> {
        self.lock_transfers()
            .iter()
            .map(|transfer| transfer.finishes_at())
            .max()
    }

    fn add(&self, locator: &str, name: Option<String>) -> EngineResult<Arc<SimulatedTransfer>> {
        if self.is_closed() {
            return Err(EngineError::Closed);
        }

        let spec = parse_sim_locator(locator)?;
        let transfer = Arc::new(SimulatedTransfer {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: name.unwrap_or(spec.name),
            size: spec.size,
            rate: spec.rate,
            started: Instant::now(),
        });

        debug!(
            "Simulating {} ({} bytes at {} B/s)",
            transfer.name, transfer.size, transfer.rate
        );
        self.lock_transfers().push(Arc::clone(&transfer));
        Ok(transfer)
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferEngine for SimulatedEngine {
    type Handle = Arc<SimulatedTransfer>;

    async fn add_from_descriptor(&self, path: &Path) -> EngineResult<Self::Handle> {
        let descriptor = TransferDescriptor::load(path).await?;
        self.add(&descriptor.url, descriptor.name)
    }

    async fn add_from_locator(&self, locator: &str) -> EngineResult<Self::Handle> {
        self.add(locator, None)
    }

    fn bytes_completed(&self, handle: &Self::Handle) -> EngineResult<u64> {
        Ok(handle.completed_at(Instant::now()))
    }

    fn bytes_missing(&self, handle: &Self::Handle) -> EngineResult<u64> {
        Ok(handle.size - handle.completed_at(Instant::now()))
    }

    fn name(&self, handle: &Self::Handle) -> String {
        handle.name.clone()
    }

    async fn wait_all_complete(&self) -> bool {
        let mut closed_rx = self.closed.subscribe();
        loop {
            let closed = *closed_rx.borrow_and_update();
            if closed {
                return false;
            }
            let deadline = match self.latest_finish() {
                Some(deadline) if deadline > Instant::now() => deadline,
                _ => return true,
            };
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = closed_rx.changed() => {}
            }
        }
    }

    fn close(&self) {
        let newly_closed = self.closed.send_if_modified(|closed| !std::mem::replace(closed, true));
        if newly_closed {
            info!("Simulated engine closed");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct SimSpec {
    name: String,
    size: u64,
    rate: u64,
}

fn parse_sim_locator(locator: &str) -> EngineResult<SimSpec> {
    let invalid = |reason: String| EngineError::InvalidLocator {
        locator: locator.to_string(),
        reason,
    };

    let url = Url::parse(locator.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != simulation::SCHEME {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    let name = url
        .host_str()
        .filter(|host| !host.is_empty())
        .map(|host| host.to_string())
        .or_else(|| file_name_from_url(&url))
        .ok_or_else(|| invalid("missing transfer name".to_string()))?;

    let mut size = simulation::DEFAULT_SIZE;
    let mut rate = simulation::DEFAULT_RATE;
    for (key, value) in url.query_pairs() {
        let parsed = value
            .parse::<u64>()
            .map_err(|e| invalid(format!("{}: {}", key, e)))?;
        match &*key {
            "size" => size = parsed,
            "rate" => rate = parsed,
            other => return Err(invalid(format!("unknown parameter '{}'", other))),
        }
    }

    if rate == 0 {
        return Err(invalid("rate must be positive".to_string()));
    }

    Ok(SimSpec { name, size, rate })
}

//! Periodic progress polling
//!
//! Runs synchronously inside the event loop's timer branch, so polls never
//! overlap each other or a render triggered by input.

use tracing::{debug, info, warn};

use crate::app::display::{DisplaySurface, Widget};
use crate::app::engine::TransferEngine;
use crate::app::supervisor::registry::{TransferRecord, TransferRegistry};
use crate::errors::EngineResult;

/// Outcome of one poll over the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Records whose state was recomputed and rendered
    pub updated: usize,
    /// Records skipped because the engine could not report byte counts
    pub skipped: usize,
    /// Records marked complete after this tick
    pub complete: usize,
}

/// Reads byte counts from the engine and pushes gauges to the display
#[derive(Debug, Default)]
pub struct ProgressPoller {
    ticks: u64,
}

impl ProgressPoller {
    /// Create a poller
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Poll every record once
    pub fn tick<E, D>(
        &mut self,
        registry: &mut TransferRegistry<E::Handle>,
        engine: &E,
        display: &mut D,
    ) -> TickSummary
    where
        E: TransferEngine,
        D: DisplaySurface,
    {
        self.ticks += 1;
        let mut summary = TickSummary::default();

        registry.for_each_mut(|record| {
            let (completed, missing) = match query_progress(engine, record.handle()) {
                Ok(counts) => counts,
                Err(e) => {
                    debug!("No progress for {} this tick: {}", record.state().title, e);
                    summary.skipped += 1;
                    return;
                }
            };

            if record.state_mut().update(completed, missing) {
                info!("Transfer complete: {}", record.state().title);
            }
            summary.updated += 1;
            render_record(record, display);
        });

        present(display);
        summary.complete = registry.complete_count();
        summary
    }

    /// Re-render every record from its current state without polling
    pub fn render_all<H, D>(&self, registry: &TransferRegistry<H>, display: &mut D)
    where
        D: DisplaySurface,
    {
        registry.for_each(|record| render_record(record, display));
        present(display);
    }
}

fn query_progress<E: TransferEngine>(engine: &E, handle: &E::Handle) -> EngineResult<(u64, u64)> {
    let completed = engine.bytes_completed(handle)?;
    let missing = engine.bytes_missing(handle)?;
    Ok((completed, missing))
}

fn present<D: DisplaySurface>(display: &mut D) {
    if let Err(e) = display.present() {
        warn!("Failed to draw the progress view: {}", e);
    }
}

fn render_record<H, D: DisplaySurface>(record: &TransferRecord<H>, display: &mut D) {
    if let Err(e) = display.render_widget(&Widget::Gauge(record.gauge())) {
        warn!("Failed to render {}: {}", record.state().title, e);
    }
}

//! Transfer records and the registry that orders them
//!
//! The registry is filled before the event loop starts and is never shrunk.
//! A record's index is its widget slot, so iteration order is also the
//! top-to-bottom order of the gauges on screen.

use crate::app::display::GaugeWidget;

/// Index of a record in the registry, equal to its widget slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(usize);

impl RecordId {
    /// Registration index
    pub fn index(self) -> usize {
        self.0
    }
}

/// Percent complete, floored; 0 while the total is unknown or zero
pub fn percent_complete(completed: u64, missing: u64) -> u8 {
    let total = u128::from(completed) + u128::from(missing);
    if total == 0 {
        return 0;
    }
    let percent = u128::from(completed) * 100 / total;
    percent.min(100) as u8
}

/// Label drawn over a gauge
pub fn progress_label(percent: u8) -> String {
    format!("{}% complete", percent)
}

/// Last rendered state of one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    /// Transfer name
    pub title: String,
    /// Percent complete at the last successful poll
    pub percent: u8,
    /// Rendered label
    pub label: String,
    /// Set once percent has reached 100; never cleared
    pub complete: bool,
}

impl DisplayState {
    /// State of a freshly registered transfer
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            percent: 0,
            label: progress_label(0),
            complete: false,
        }
    }

    /// Recompute from byte counts
    ///
    /// Returns `true` when this update is the one that marked the transfer
    /// complete.
    pub fn update(&mut self, completed: u64, missing: u64) -> bool {
        self.percent = percent_complete(completed, missing);
        self.label = progress_label(self.percent);

        let newly_complete = self.percent == 100 && !self.complete;
        if newly_complete {
            self.complete = true;
        }
        newly_complete
    }
}

/// One registered transfer
#[derive(Debug, Clone)]
pub struct TransferRecord<H> {
    id: RecordId,
    handle: H,
    state: DisplayState,
}

impl<H> TransferRecord<H> {
    /// Registry index of the record
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Engine handle
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Last rendered state
    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// Mutable access for the poller
    pub fn state_mut(&mut self) -> &mut DisplayState {
        &mut self.state
    }

    /// Gauge widget reflecting the current state
    pub fn gauge(&self) -> GaugeWidget {
        GaugeWidget {
            slot: self.id.index(),
            title: self.state.title.clone(),
            percent: self.state.percent,
            label: self.state.label.clone(),
            complete: self.state.complete,
        }
    }
}

/// Ordered, append-only collection of transfer records
#[derive(Debug, Clone)]
pub struct TransferRegistry<H> {
    records: Vec<TransferRecord<H>>,
}

impl<H> TransferRegistry<H> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append a record and return its id
    pub fn register(&mut self, handle: H, title: impl Into<String>) -> RecordId {
        let id = RecordId(self.records.len());
        self.records.push(TransferRecord {
            id,
            handle,
            state: DisplayState::new(title),
        });
        id
    }

    /// Visit every record in registration order
    pub fn for_each(&self, mut f: impl FnMut(&TransferRecord<H>)) {
        self.records.iter().for_each(|record| f(record));
    }

    /// Visit every record mutably in registration order
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut TransferRecord<H>)) {
        self.records.iter_mut().for_each(|record| f(record));
    }

    /// Iterate records in registration order
    pub fn iter(&self) -> impl Iterator<Item = &TransferRecord<H>> {
        self.records.iter()
    }

    /// Look up a record
    pub fn get(&self, id: RecordId) -> Option<&TransferRecord<H>> {
        self.records.get(id.index())
    }

    /// Number of registered transfers
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records marked complete
    pub fn complete_count(&self) -> usize {
        self.records.iter().filter(|r| r.state.complete).count()
    }
}

impl<H> Default for TransferRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

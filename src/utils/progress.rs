use serde::Serialize;
use crossbeam_channel::Sender;

/// Progress event for entry-level extraction updates
///
/// `current` runs 1..=`total` in input order; the last event of a batch has
/// `current == total` and an empty label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub current: usize,
    pub total: usize,
    pub label: String,
}

impl ProgressEvent {
    pub fn new(current: usize, total: usize, label: impl Into<String>) -> Self {
        Self {
            current,
            total,
            label: label.into(),
        }
    }

    /// The completion sentinel closing a batch
    pub fn finished(total: usize) -> Self {
        Self::new(total, total, String::new())
    }

    pub fn is_final(&self) -> bool {
        self.current == self.total && self.label.is_empty()
    }

    /// Completion in percent (0.0 - 100.0)
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        (self.current as f32 / self.total as f32) * 100.0
    }
}

/// One-way consumer of progress events
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

impl<F: FnMut(ProgressEvent)> ProgressSink for F {
    fn emit(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Collects every event, mostly useful for tests and batch reporting
impl ProgressSink for Vec<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}

/// Channel producer side; blocks while the bounded channel is full
impl ProgressSink for Sender<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        // A dropped receiver only means nobody is watching anymore
        if self.send(event).is_err() {
            log::debug!("Progress receiver disconnected, event dropped");
        }
    }
}

/// Discards all events
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&mut self, _event: ProgressEvent) {}
}

/// Enforces the event ordering contract for one extraction batch
pub(crate) struct ProgressTracker<'a> {
    sink: &'a mut dyn ProgressSink,
    current: usize,
    total: usize,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a mut dyn ProgressSink, total: usize) -> Self {
        Self {
            sink,
            current: 0,
            total,
        }
    }

    /// Report one completed entry
    pub(crate) fn advance(&mut self, label: &str) {
        debug_assert!(self.current < self.total, "more entries than announced");
        self.current += 1;
        self.sink.emit(ProgressEvent::new(self.current, self.total, label));
    }

    /// Emit the completion sentinel
    pub(crate) fn finish(self) {
        self.sink.emit(ProgressEvent::finished(self.total));
    }
}

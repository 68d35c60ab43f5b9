use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use crossbeam_channel::{bounded, Receiver};
use crate::core::compression::common::ArchiveHandler;
use crate::models::ArchiveError;
use crate::utils::progress::ProgressEvent;

/// Extraction running on its own worker thread
///
/// Progress arrives over a bounded channel in the same order the handler
/// emits it. When the channel is full the worker blocks until the consumer
/// catches up, so either read `events()` or call `wait()`, which drains
/// it. The channel closes once the worker is done. There is no
/// cancellation: a started job runs to completion or failure.
pub struct ExtractionJob {
    events: Receiver<ProgressEvent>,
    handle: JoinHandle<Result<(), ArchiveError>>,
}

impl ExtractionJob {
    /// Start extracting on a new thread
    ///
    /// # Arguments
    /// * `handler` - Handler resolved for the archive
    /// * `capacity` - Bound of the progress channel (at least 1)
    pub fn spawn(
        handler: Arc<dyn ArchiveHandler>,
        archive_path: PathBuf,
        names: Vec<String>,
        dest_dir: PathBuf,
        capacity: usize,
    ) -> Result<Self, ArchiveError> {
        let (mut sender, events) = bounded::<ProgressEvent>(capacity.max(1));

        let handle = thread::Builder::new()
            .name("archive-extract".to_string())
            .spawn(move || {
                log::debug!(
                    "Background extraction of {} entries from {}",
                    names.len(),
                    archive_path.display()
                );
                let result = handler.extract(&archive_path, &names, &dest_dir, &mut sender);
                if let Err(e) = &result {
                    log::error!("Background extraction from {} failed: {}", archive_path.display(), e);
                }
                result
            })
            .map_err(|e| ArchiveError::fs("archive-extract", e))?;

        Ok(Self { events, handle })
    }

    /// Receiver of the ordered progress events
    pub fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker is done and return its outcome
    ///
    /// Drains the progress channel first so a worker blocked on a full
    /// channel can finish. Returns the events not already taken through
    /// `events()`, in emission order.
    pub fn wait(self) -> (Result<(), ArchiveError>, Vec<ProgressEvent>) {
        // Disconnects once the worker drops its sender
        let pending: Vec<ProgressEvent> = self.events.iter().collect();

        let result = self.handle.join().unwrap_or_else(|_| {
            Err(ArchiveError::Extraction {
                entry: String::new(),
                reason: "Extraction worker panicked".to_string(),
            })
        });
        (result, pending)
    }
}

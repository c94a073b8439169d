//! Progress synchronization.
//!
//! Every settled page is written to the local [`ProgressStore`] right away and
//! announced to the [`ProgressNotifier`]. Remote writes go through a writer
//! task that owns a single debounce deadline: each settle pushes the deadline
//! back, and when it finally elapses exactly one write carrying the latest
//! page is sent.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};

use crate::domain::{ProgressEvent, ProgressRecord, StartSource, StartingPage};
use crate::error::SyncWriteError;
use crate::progress_client::{RemoteProgress, RemoteProgressService};
use crate::storage::ProgressStore;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

/// Receives progress changes for UI surfaces outside the reader.
pub trait ProgressNotifier: Send + Sync {
    fn progress_changed(&self, event: &ProgressEvent);

    /// Called once per streak of failed remote writes.
    fn sync_failed(&self, _error: &SyncWriteError) {}
}

/// Notifier for callers with nobody to tell.
pub struct NoopNotifier;

impl ProgressNotifier for NoopNotifier {
    fn progress_changed(&self, _event: &ProgressEvent) {}
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet interval after the latest settle before the remote write fires.
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

struct SyncState {
    record: ProgressRecord,
    /// Page the remote service is known to hold.
    confirmed_remote: Option<u32>,
    /// The latest settle has not reached the remote service yet.
    pending: bool,
    /// A failure notice was raised and no write has succeeded since.
    failing: bool,
}

struct Shared {
    document_id: String,
    store: ProgressStore,
    remote: Arc<dyn RemoteProgressService>,
    notifier: Arc<dyn ProgressNotifier>,
    state: Mutex<SyncState>,
}

enum SyncCommand {
    Settled,
    Flush(oneshot::Sender<()>),
}

pub struct SyncManager {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<SyncCommand>,
}

impl SyncManager {
    /// Start the manager for one session. `remote_record` is the record
    /// fetched when the session opened, if any.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        document_id: impl Into<String>,
        store: ProgressStore,
        remote: Arc<dyn RemoteProgressService>,
        notifier: Arc<dyn ProgressNotifier>,
        remote_record: Option<&RemoteProgress>,
        config: SyncConfig,
    ) -> Self {
        let document_id = document_id.into();
        let confirmed_remote = remote_record.map(|r| r.last_page_read).filter(|p| *p >= 1);
        // The total is learned from the document itself; a remote total may be stale.
        let record = ProgressRecord::new(document_id.clone(), confirmed_remote.unwrap_or(1), None);
        let shared = Arc::new(Shared {
            document_id,
            store,
            remote,
            notifier,
            state: Mutex::new(SyncState {
                record,
                confirmed_remote,
                pending: false,
                failing: false,
            }),
        });
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(shared.clone(), rx, config.debounce));
        SyncManager { shared, commands }
    }

    pub fn document_id(&self) -> &str {
        &self.shared.document_id
    }

    /// Pick the page a session opens at: caller hint, then the remote
    /// record, then the local fallback, then the first page.
    pub fn resolve_starting_page(
        &self,
        hint: Option<u32>,
        remote: Option<&RemoteProgress>,
    ) -> StartingPage {
        if let Some(page) = hint.filter(|p| *p >= 1) {
            return StartingPage {
                page,
                source: StartSource::Hint,
            };
        }
        if let Some(page) = remote.map(|r| r.last_page_read).filter(|p| *p >= 1) {
            return StartingPage {
                page,
                source: StartSource::Remote,
            };
        }
        if let Some(local) = self.shared.store.read(&self.shared.document_id) {
            return StartingPage {
                page: local.last_page_read,
                source: StartSource::Local,
            };
        }
        StartingPage {
            page: 1,
            source: StartSource::Default,
        }
    }

    /// Record a settled page: working record and local store now, remote
    /// service once the debounce window closes.
    pub fn report_settled_page(&self, page: u32, known_total: Option<u32>) -> ProgressEvent {
        let (event, schedule) = {
            let mut state = self.shared.state();
            state.record.settle(page, known_total);
            let page = state.record.last_page_read();
            self.shared
                .store
                .write(&self.shared.document_id, page, state.record.total_pages());
            let duplicate = !state.pending && state.confirmed_remote == Some(page);
            if !duplicate {
                state.pending = true;
            }
            (state.record.event(), !duplicate)
        };

        self.shared.notifier.progress_changed(&event);

        if schedule {
            if self.commands.send(SyncCommand::Settled).is_err() {
                tracing::warn!(document_id = %self.shared.document_id, "progress writer has stopped");
            }
        } else {
            tracing::trace!(page = event.current_page, "page already stored remotely");
        }
        event
    }

    /// Send any pending write now instead of waiting for the debounce.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(SyncCommand::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    pub fn record(&self) -> ProgressRecord {
        self.shared.state().record.clone()
    }

    pub fn has_pending_write(&self) -> bool {
        self.shared.state().pending
    }

    pub fn confirmed_remote_page(&self) -> Option<u32> {
        self.shared.state().confirmed_remote
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn push_latest(&self) {
        let page = {
            let state = self.state();
            if !state.pending {
                return;
            }
            state.record.last_page_read()
        };

        match self.remote.update(&self.document_id, page).await {
            Ok(()) => {
                let mut state = self.state();
                state.confirmed_remote = Some(page);
                if state.record.last_page_read() == page {
                    state.pending = false;
                }
                state.failing = false;
                tracing::debug!(document_id = %self.document_id, page, "remote progress updated");
            }
            Err(e) => {
                let error = SyncWriteError {
                    document_id: self.document_id.clone(),
                    page,
                    reason: format!("{:#}", e),
                };
                tracing::warn!(error = %error, "remote progress write failed");
                let first_failure = {
                    let mut state = self.state();
                    !std::mem::replace(&mut state.failing, true)
                };
                if first_failure {
                    self.notifier.sync_failed(&error);
                }
            }
        }
    }
}

async fn run_writer(
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<SyncCommand>,
    debounce: Duration,
) {
    let mut deadline: Option<Instant> = None;
    loop {
        let command = match deadline {
            Some(at) => tokio::select! {
                _ = sleep_until(at) => {
                    deadline = None;
                    shared.push_latest().await;
                    continue;
                }
                command = commands.recv() => command,
            },
            None => commands.recv().await,
        };

        match command {
            Some(SyncCommand::Settled) => deadline = Some(Instant::now() + debounce),
            Some(SyncCommand::Flush(done)) => {
                deadline = None;
                shared.push_latest().await;
                let _ = done.send(());
            }
            None => {
                if deadline.is_some() {
                    shared.push_latest().await;
                }
                tracing::trace!(document_id = %shared.document_id, "progress writer stopped");
                return;
            }
        }
    }
}

// In-memory collaborators for unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::document::{Credentials, Document, DocumentSource, RenderedPage};
use crate::domain::ProgressEvent;
use crate::error::{AuthError, LoadError, OpenError, RenderError, SyncWriteError};
use crate::progress_client::{RemoteProgress, RemoteProgressService};
use crate::render::PageSurface;
use crate::session::{ControlState, ReaderControls};
use crate::sync::ProgressNotifier;

/// A document whose per-page latency and failures are scripted by the test.
#[derive(Default)]
pub struct ScriptedDocument {
    page_count: Option<u32>,
    total_on_render: Option<u32>,
    delays: Mutex<HashMap<u32, Duration>>,
    failing: Mutex<HashSet<u32>>,
    calls: Mutex<Vec<u32>>,
}

impl ScriptedDocument {
    pub fn with_pages(total: u32) -> Self {
        Self {
            page_count: Some(total),
            total_on_render: Some(total),
            ..Default::default()
        }
    }

    /// Length is unknown at open and, if given, reported by rendered pages.
    pub fn with_unknown_length(total_on_render: Option<u32>) -> Self {
        Self {
            page_count: None,
            total_on_render,
            ..Default::default()
        }
    }

    pub fn delay_page(&self, page: u32, delay: Duration) {
        self.delays.lock().unwrap().insert(page, delay);
    }

    pub fn fail_page(&self, page: u32) {
        self.failing.lock().unwrap().insert(page);
    }

    pub fn heal_page(&self, page: u32) {
        self.failing.lock().unwrap().remove(&page);
    }

    pub fn render_calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Document for ScriptedDocument {
    fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    async fn render_page(&self, page: u32) -> Result<RenderedPage, RenderError> {
        self.calls.lock().unwrap().push(page);
        let delay = self.delays.lock().unwrap().get(&page).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&page) {
            return Err(RenderError::new(page, "scripted failure"));
        }
        if let Some(total) = self.page_count.or(self.total_on_render) {
            if page > total {
                return Err(RenderError::new(page, "past the end"));
            }
        }
        Ok(RenderedPage {
            page,
            total_pages: self.total_on_render,
            content: format!("page {}", page),
        })
    }
}

enum OpenFailure {
    Load,
    Auth,
}

pub struct ScriptedSource {
    document: Arc<ScriptedDocument>,
    failure: Option<OpenFailure>,
    opens: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(document: Arc<ScriptedDocument>) -> Self {
        Self {
            document,
            failure: None,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn failing_load() -> Self {
        Self {
            failure: Some(OpenFailure::Load),
            ..Self::new(Arc::new(ScriptedDocument::with_pages(1)))
        }
    }

    pub fn failing_auth() -> Self {
        Self {
            failure: Some(OpenFailure::Auth),
            ..Self::new(Arc::new(ScriptedDocument::with_pages(1)))
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocumentSource for ScriptedSource {
    async fn open(
        &self,
        locator: &str,
        _credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn Document>, OpenError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(OpenFailure::Load) => Err(LoadError::new(locator, "unreachable").into()),
            Some(OpenFailure::Auth) => Err(AuthError {
                locator: locator.to_string(),
                status: 401,
            }
            .into()),
            None => Ok(self.document.clone()),
        }
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    pages: Mutex<Vec<u32>>,
}

impl RecordingSurface {
    pub fn pages(&self) -> Vec<u32> {
        self.pages.lock().unwrap().clone()
    }
}

impl PageSurface for RecordingSurface {
    fn present(&self, page: &RenderedPage) {
        self.pages.lock().unwrap().push(page.page);
    }
}

/// Remote progress service that records every write attempt.
#[derive(Default)]
pub struct MockRemote {
    record: Mutex<Option<RemoteProgress>>,
    attempts: Mutex<Vec<u32>>,
    fail_writes: AtomicBool,
    fail_fetch: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
}

impl MockRemote {
    pub fn with_record(last_page_read: u32, total_pages: Option<u32>) -> Self {
        let remote = Self::default();
        *remote.record.lock().unwrap() = Some(RemoteProgress {
            last_page_read,
            total_pages,
        });
        remote
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn set_fetch_failing(&self, failing: bool) {
        self.fail_fetch.store(failing, Ordering::SeqCst);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = Some(delay);
    }

    /// Every page the service was asked to store, successful or not.
    pub fn attempts(&self) -> Vec<u32> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn stored_page(&self) -> Option<u32> {
        self.record.lock().unwrap().map(|r| r.last_page_read)
    }
}

#[async_trait::async_trait]
impl RemoteProgressService for MockRemote {
    async fn fetch(&self, _document_id: &str) -> anyhow::Result<Option<RemoteProgress>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            anyhow::bail!("progress service unreachable");
        }
        Ok(*self.record.lock().unwrap())
    }

    async fn update(&self, _document_id: &str, last_page_read: u32) -> anyhow::Result<()> {
        self.attempts.lock().unwrap().push(last_page_read);
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("network error");
        }
        let mut record = self.record.lock().unwrap();
        let total_pages = record.and_then(|r| r.total_pages);
        *record = Some(RemoteProgress {
            last_page_read,
            total_pages,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ProgressEvent>>,
    failures: Mutex<Vec<SyncWriteError>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn pages(&self) -> Vec<u32> {
        self.events().iter().map(|e| e.current_page).collect()
    }

    pub fn failures(&self) -> Vec<SyncWriteError> {
        self.failures.lock().unwrap().clone()
    }
}

impl ProgressNotifier for RecordingNotifier {
    fn progress_changed(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn sync_failed(&self, error: &SyncWriteError) {
        self.failures.lock().unwrap().push(error.clone());
    }
}

#[derive(Default)]
pub struct RecordingControls {
    states: Mutex<Vec<ControlState>>,
    progress: Mutex<Vec<ProgressEvent>>,
    notices: Mutex<Vec<String>>,
}

impl RecordingControls {
    pub fn last_state(&self) -> Option<ControlState> {
        self.states.lock().unwrap().last().copied()
    }

    pub fn states(&self) -> Vec<ControlState> {
        self.states.lock().unwrap().clone()
    }

    pub fn last_progress(&self) -> Option<ProgressEvent> {
        self.progress.lock().unwrap().last().cloned()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl ReaderControls for RecordingControls {
    fn set_controls(&self, state: ControlState) {
        self.states.lock().unwrap().push(state);
    }

    fn show_progress(&self, event: &ProgressEvent) {
        self.progress.lock().unwrap().push(event.clone());
    }

    fn show_notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

//! One open-document reading session.
//!
//! A [`ReaderSession`] resolves where to start reading, drives the
//! [`RenderController`] from button and keyboard input, keeps the host's
//! controls and progress indicator current, and hands every settled page to
//! the [`SyncManager`]. Only one navigation runs at a time; requests that
//! arrive while one is in flight are dropped.

pub mod input;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::document::{Credentials, DocumentSource};
use crate::domain::{DocumentDescriptor, ProgressEvent, StartingPage};
use crate::error::{ReaderError, SyncWriteError};
use crate::progress_client::RemoteProgressService;
use crate::render::{Navigation, PageSurface, RenderController};
use crate::storage::ProgressStore;
use crate::sync::{ProgressNotifier, SyncConfig, SyncManager};

pub use input::{Focus, Key, NavRequest, ReaderInput};

/// Enabled state of the previous/next affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub prev_enabled: bool,
    pub next_enabled: bool,
    pub busy: bool,
}

impl ControlState {
    pub fn at(page: u32, total_pages: Option<u32>) -> Self {
        let single_page = total_pages == Some(1);
        ControlState {
            prev_enabled: page > 1 && !single_page,
            next_enabled: !single_page && total_pages.is_none_or(|t| page < t),
            busy: false,
        }
    }

    pub fn busy() -> Self {
        ControlState {
            prev_enabled: false,
            next_enabled: false,
            busy: true,
        }
    }
}

/// The host UI around the rendered page.
pub trait ReaderControls: Send + Sync {
    fn set_controls(&self, state: ControlState);
    fn show_progress(&self, event: &ProgressEvent);
    /// Transient, non-blocking message.
    fn show_notice(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Settled(ProgressEvent),
    Unchanged(u32),
    Superseded,
    /// Another navigation was in flight.
    Busy,
    /// Already at the first or last page.
    Blocked,
    /// The page failed to render; the position did not change.
    Failed(u32),
    Closed,
}

/// Everything a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn DocumentSource>,
    pub remote: Arc<dyn RemoteProgressService>,
    pub store: ProgressStore,
    pub notifier: Arc<dyn ProgressNotifier>,
    pub surface: Arc<dyn PageSurface>,
    pub controls: Arc<dyn ReaderControls>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub credentials: Option<Credentials>,
    /// Page to open at, e.g. a record already loaded by a previous screen.
    pub page_hint: Option<u32>,
    pub sync: SyncConfig,
}

/// Forwards progress to the outer notifier and raises sync failures in the reader too.
struct SessionNotifier {
    outer: Arc<dyn ProgressNotifier>,
    controls: Arc<dyn ReaderControls>,
}

impl ProgressNotifier for SessionNotifier {
    fn progress_changed(&self, event: &ProgressEvent) {
        self.outer.progress_changed(event);
    }

    fn sync_failed(&self, error: &SyncWriteError) {
        self.outer.sync_failed(error);
        self.controls
            .show_notice("Reading progress could not be saved yet; it will be retried.");
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ReaderSession {
    id: Uuid,
    span: tracing::Span,
    descriptor: Mutex<DocumentDescriptor>,
    starting_page: StartingPage,
    controller: RenderController,
    sync: SyncManager,
    controls: Arc<dyn ReaderControls>,
    navigating: AtomicBool,
    closed: AtomicBool,
    input_task: Mutex<Option<JoinHandle<()>>>,
}

impl ReaderSession {
    /// Open `locator` and render the page reading should resume at.
    ///
    /// Only document load and authorization failures are returned; an
    /// unreachable progress service just means there is no remote record.
    pub async fn open(
        document_id: &str,
        locator: &str,
        collaborators: Collaborators,
        options: SessionOptions,
    ) -> Result<Arc<Self>, ReaderError> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("reader_session", session_id = %id, %document_id);
        Self::open_in(id, span.clone(), document_id, locator, collaborators, options)
            .instrument(span)
            .await
    }

    async fn open_in(
        id: Uuid,
        span: tracing::Span,
        document_id: &str,
        locator: &str,
        collaborators: Collaborators,
        options: SessionOptions,
    ) -> Result<Arc<Self>, ReaderError> {
        let Collaborators {
            source,
            remote,
            store,
            notifier,
            surface,
            controls,
        } = collaborators;

        let remote_record = match remote.fetch(document_id).await {
            Ok(record) => record,
            Err(e) => {
                let reason = format!("{:#}", e);
                tracing::warn!(error = %reason, "remote progress unavailable, using local fallback");
                None
            }
        };

        let notifier = Arc::new(SessionNotifier {
            outer: notifier,
            controls: controls.clone(),
        });
        let sync = SyncManager::start(
            document_id,
            store,
            remote,
            notifier,
            remote_record.as_ref(),
            options.sync,
        );
        let starting_page = sync.resolve_starting_page(options.page_hint, remote_record.as_ref());
        tracing::info!(page = starting_page.page, source = ?starting_page.source, "resolved starting page");

        let controller = RenderController::open(
            source.as_ref(),
            locator,
            options.credentials.as_ref(),
            starting_page.page,
            surface,
        )
        .await?;

        let mut descriptor = DocumentDescriptor::new(document_id, locator);
        descriptor.learn_total_pages(controller.total_pages());
        let page = controller.current_page().unwrap_or(1);
        let event = sync.report_settled_page(page, controller.total_pages());
        controls.show_progress(&event);
        controls.set_controls(ControlState::at(page, controller.total_pages()));

        Ok(Arc::new(ReaderSession {
            id,
            span,
            descriptor: Mutex::new(descriptor),
            starting_page,
            controller,
            sync,
            controls,
            navigating: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            input_task: Mutex::new(None),
        }))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn descriptor(&self) -> DocumentDescriptor {
        self.descriptor_guard().clone()
    }

    fn descriptor_guard(&self) -> MutexGuard<'_, DocumentDescriptor> {
        self.descriptor.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn starting_page(&self) -> StartingPage {
        self.starting_page
    }

    pub fn current_page(&self) -> u32 {
        self.controller.current_page().unwrap_or(1)
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.controller.total_pages()
    }

    pub fn progress(&self) -> ProgressEvent {
        self.sync.record().event()
    }

    pub fn control_state(&self) -> ControlState {
        ControlState::at(self.current_page(), self.total_pages())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_input_bound(&self) -> bool {
        self.input_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// The single navigation path shared by buttons, keys and programmatic requests.
    pub async fn navigate(&self, request: NavRequest) -> NavOutcome {
        self.navigate_inner(request).instrument(self.span.clone()).await
    }

    async fn navigate_inner(&self, request: NavRequest) -> NavOutcome {
        if self.is_closed() {
            return NavOutcome::Closed;
        }
        if self
            .navigating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(?request, "navigation already in flight, dropping request");
            return NavOutcome::Busy;
        }
        let _in_flight = InFlight(&self.navigating);

        let current = self.current_page();
        let total = self.total_pages();
        let target = match request {
            NavRequest::Prev if current <= 1 => return NavOutcome::Blocked,
            NavRequest::Prev => current - 1,
            NavRequest::Next if total.is_some_and(|t| current >= t) => return NavOutcome::Blocked,
            NavRequest::Next => current + 1,
            NavRequest::First => 1,
            NavRequest::Last => match total {
                Some(t) => t,
                None => return NavOutcome::Blocked,
            },
            NavRequest::GoTo(page) => page,
        };

        self.controls.set_controls(ControlState::busy());
        let outcome = match self.controller.go_to(target).await {
            Ok(Navigation::Settled(page)) => {
                // The page is on the surface, so it is recorded even if close raced it.
                let total = self.controller.total_pages();
                self.descriptor_guard().learn_total_pages(total);
                let event = self.sync.report_settled_page(page, total);
                if !self.is_closed() {
                    self.controls.show_progress(&event);
                }
                NavOutcome::Settled(event)
            }
            Ok(Navigation::Unchanged(page)) => NavOutcome::Unchanged(page),
            Ok(Navigation::Superseded) if !self.is_closed() => NavOutcome::Superseded,
            Ok(_) | Err(ReaderError::Destroyed) => NavOutcome::Closed,
            Err(ReaderError::Render(e)) => {
                tracing::warn!(error = %e, "page render failed");
                self.controls
                    .show_notice(&format!("Page {} could not be displayed.", e.page));
                NavOutcome::Failed(e.page)
            }
            Err(e) => {
                tracing::error!(error = %e, "unexpected navigation failure");
                NavOutcome::Failed(target)
            }
        };

        if !self.is_closed() {
            self.controls.set_controls(self.control_state());
        }
        outcome
    }

    /// Deliver input events from `events` until the session closes.
    pub fn bind_input(self: &Arc<Self>, mut events: mpsc::UnboundedReceiver<ReaderInput>) {
        let session: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(
            async move {
                while let Some(input) = events.recv().await {
                    let Some(session) = session.upgrade() else {
                        break;
                    };
                    let Some(request) = input.request() else {
                        tracing::trace!(?input, "ignoring input");
                        continue;
                    };
                    // Each request races for the in-flight slot on its own.
                    tokio::spawn(async move {
                        session.navigate(request).await;
                    });
                }
            }
            .instrument(self.span.clone()),
        );

        let mut slot = self.input_task.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_closed() {
            task.abort();
            return;
        }
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// End the session: unbind input, flush progress, release the document.
    /// Calling it again does nothing.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(parent: &self.span, "session already closed");
            return;
        }
        let task = self
            .input_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
        // Renders still in flight must not reach the surface once flushing starts.
        self.controller.destroy();
        self.sync.flush().instrument(self.span.clone()).await;
        tracing::info!(parent: &self.span, page = self.sync.record().last_page_read(), "session closed");
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        if let Some(task) = self
            .input_task
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

//! Single-page render controller.
//!
//! Renders one page of a document at a time onto a [`PageSurface`]. Every
//! `go_to` takes a ticket from the controller's render generation; a render
//! result is applied only if its ticket is still the current generation when
//! it completes, so overlapping navigation always resolves to the most
//! recently requested page no matter which render finishes first.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::document::{Credentials, Document, DocumentSource, RenderedPage};
use crate::error::{LoadError, ReaderError};

/// The visual region a controller renders into.
pub trait PageSurface: Send + Sync {
    fn present(&self, page: &RenderedPage);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Ready,
    Rendering,
    Destroyed,
}

/// Result of a navigation request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// The page was rendered and is now on the surface.
    Settled(u32),
    /// The page is already shown or already being rendered.
    Unchanged(u32),
    /// A later request won; this result was discarded.
    Superseded,
}

struct ControllerInner {
    document: Option<Arc<dyn Document>>,
    generation: u64,
    /// Ticket and page of the latest request still rendering.
    in_flight: Option<(u64, u32)>,
    current_page: Option<u32>,
    total_pages: Option<u32>,
}

pub struct RenderController {
    locator: String,
    surface: Arc<dyn PageSurface>,
    inner: Mutex<ControllerInner>,
}

impl RenderController {
    /// Load the document and render `initial_page`.
    ///
    /// If the initial page cannot be rendered the controller falls back to
    /// the first page; a document whose first page cannot be rendered fails
    /// to open.
    #[tracing::instrument(level = "debug", skip(source, credentials, surface))]
    pub async fn open(
        source: &dyn DocumentSource,
        locator: &str,
        credentials: Option<&Credentials>,
        initial_page: u32,
        surface: Arc<dyn PageSurface>,
    ) -> Result<Self, ReaderError> {
        let document = source.open(locator, credentials).await?;
        let controller = RenderController {
            locator: locator.to_string(),
            surface,
            inner: Mutex::new(ControllerInner {
                total_pages: document.page_count(),
                document: Some(document),
                generation: 0,
                in_flight: None,
                current_page: None,
            }),
        };

        let initial = controller.go_to(initial_page).await;
        let settled = match initial {
            Err(ReaderError::Render(e)) if initial_page > 1 => {
                tracing::warn!(error = %e, initial_page, "initial page failed, falling back to page 1");
                controller.go_to(1).await
            }
            other => other,
        };
        match settled {
            Ok(_) => Ok(controller),
            Err(e) => Err(controller.open_failure(e)),
        }
    }

    fn open_failure(&self, err: ReaderError) -> ReaderError {
        self.destroy();
        match err {
            ReaderError::Render(e) => LoadError::new(&self.locator, e.to_string()).into(),
            other => other,
        }
    }

    fn inner(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// The page on the surface, `None` until the first render settles.
    pub fn current_page(&self) -> Option<u32> {
        self.inner().current_page
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.inner().total_pages
    }

    pub fn state(&self) -> ControllerState {
        let inner = self.inner();
        if inner.document.is_none() {
            ControllerState::Destroyed
        } else if inner.in_flight.is_some() {
            ControllerState::Rendering
        } else {
            ControllerState::Ready
        }
    }

    /// Clamp to `1..=total` when the total is known, otherwise only at 1.
    pub fn clamp_page(&self, target: u32) -> u32 {
        clamp_page(target, self.inner().total_pages)
    }

    pub async fn go_to(&self, target: u32) -> Result<Navigation, ReaderError> {
        let (ticket, page, document) = {
            let mut inner = self.inner();
            let Some(document) = inner.document.clone() else {
                return Err(ReaderError::Destroyed);
            };
            let page = clamp_page(target, inner.total_pages);
            match inner.in_flight {
                Some((_, pending)) if pending == page => return Ok(Navigation::Unchanged(page)),
                None if inner.current_page == Some(page) => return Ok(Navigation::Unchanged(page)),
                _ => {}
            }
            inner.generation += 1;
            let ticket = inner.generation;
            inner.in_flight = Some((ticket, page));
            (ticket, page, document)
        };
        tracing::trace!(ticket, page, target, "rendering page");

        let result = document.render_page(page).await;

        let mut inner = self.inner();
        if inner.document.is_none() || inner.generation != ticket {
            tracing::debug!(ticket, page, current = inner.generation, "discarding stale render");
            return Ok(Navigation::Superseded);
        }
        inner.in_flight = None;
        let rendered = result?;
        if inner.total_pages.is_none() {
            inner.total_pages = rendered.total_pages;
        }
        inner.current_page = Some(page);
        self.surface.present(&rendered);
        tracing::debug!(page, total_pages = ?inner.total_pages, "page settled");
        Ok(Navigation::Settled(page))
    }

    /// Release the document. Outstanding renders become permanently stale.
    pub fn destroy(&self) {
        let mut inner = self.inner();
        if inner.document.take().is_some() {
            inner.generation += 1;
            inner.in_flight = None;
            tracing::debug!(locator = %self.locator, "render controller destroyed");
        }
    }
}

fn clamp_page(target: u32, total_pages: Option<u32>) -> u32 {
    target.clamp(1, total_pages.unwrap_or(u32::MAX).max(1))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{RecordingSurface, ScriptedDocument, ScriptedSource};

    async fn open_at(
        doc: ScriptedDocument,
        page: u32,
    ) -> (RenderController, Arc<ScriptedDocument>, Arc<RecordingSurface>) {
        let doc = Arc::new(doc);
        let source = ScriptedSource::new(doc.clone());
        let surface = Arc::new(RecordingSurface::default());
        let controller = RenderController::open(&source, "mem://doc", None, page, surface.clone())
            .await
            .expect("document should open");
        (controller, doc, surface)
    }

    #[tokio::test]
    async fn open_renders_initial_page() {
        let (controller, _, surface) = open_at(ScriptedDocument::with_pages(10), 4).await;
        assert_eq!(controller.current_page(), Some(4));
        assert_eq!(controller.total_pages(), Some(10));
        assert_eq!(controller.state(), ControllerState::Ready);
        assert_eq!(surface.pages(), vec![4]);
    }

    #[tokio::test]
    async fn open_failures_propagate() {
        let source = ScriptedSource::failing_load();
        let surface = Arc::new(RecordingSurface::default());
        let err = RenderController::open(&source, "mem://doc", None, 1, surface.clone())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ReaderError::Load(_)));

        let source = ScriptedSource::failing_auth();
        let err = RenderController::open(&source, "mem://doc", None, 1, surface)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ReaderError::Auth(_)));
    }

    #[tokio::test]
    async fn unrenderable_initial_page_falls_back_to_first() {
        let doc = ScriptedDocument::with_unknown_length(Some(8));
        doc.fail_page(6);
        let (controller, _, surface) = open_at(doc, 6).await;
        assert_eq!(controller.current_page(), Some(1));
        assert_eq!(surface.pages(), vec![1]);
    }

    #[tokio::test]
    async fn document_without_renderable_pages_fails_to_open() {
        let doc = Arc::new(ScriptedDocument::with_pages(3));
        doc.fail_page(1);
        let source = ScriptedSource::new(doc);
        let surface = Arc::new(RecordingSurface::default());
        let result = RenderController::open(&source, "mem://doc", None, 1, surface).await;
        assert!(matches!(result, Err(ReaderError::Load(_))));
    }

    #[tokio::test]
    async fn targets_are_clamped_to_known_bounds() {
        let (controller, _, _) = open_at(ScriptedDocument::with_pages(10), 1).await;
        assert_eq!(controller.go_to(0).await.unwrap(), Navigation::Unchanged(1));
        assert_eq!(controller.go_to(99).await.unwrap(), Navigation::Settled(10));
    }

    #[tokio::test]
    async fn unknown_total_is_learned_from_first_render() {
        let (controller, _, _) = open_at(ScriptedDocument::with_unknown_length(Some(20)), 1).await;
        assert_eq!(controller.total_pages(), Some(20));
        assert_eq!(controller.clamp_page(50), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn later_request_wins_when_it_finishes_first() {
        let (controller, doc, surface) = open_at(ScriptedDocument::with_pages(10), 1).await;
        doc.delay_page(3, Duration::from_millis(200));
        doc.delay_page(5, Duration::from_millis(10));

        let (first, second) = tokio::join!(controller.go_to(3), controller.go_to(5));
        assert_eq!(first.unwrap(), Navigation::Superseded);
        assert_eq!(second.unwrap(), Navigation::Settled(5));
        assert_eq!(controller.current_page(), Some(5));
        assert_eq!(surface.pages(), vec![1, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn later_request_wins_when_it_finishes_last() {
        let (controller, doc, surface) = open_at(ScriptedDocument::with_pages(10), 1).await;
        doc.delay_page(3, Duration::from_millis(10));
        doc.delay_page(5, Duration::from_millis(200));

        let (first, second) = tokio::join!(controller.go_to(3), controller.go_to(5));
        assert_eq!(first.unwrap(), Navigation::Superseded);
        assert_eq!(second.unwrap(), Navigation::Settled(5));
        assert_eq!(surface.pages(), vec![1, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_last_of_a_burst_reaches_the_surface() {
        let (controller, doc, surface) = open_at(ScriptedDocument::with_pages(10), 1).await;
        for (page, ms) in [(2, 50), (3, 5), (4, 120), (6, 30)] {
            doc.delay_page(page, Duration::from_millis(ms));
        }
        let (a, b, c, d) = tokio::join!(
            controller.go_to(2),
            controller.go_to(3),
            controller.go_to(4),
            controller.go_to(6)
        );
        assert_eq!(a.unwrap(), Navigation::Superseded);
        assert_eq!(b.unwrap(), Navigation::Superseded);
        assert_eq!(c.unwrap(), Navigation::Superseded);
        assert_eq!(d.unwrap(), Navigation::Settled(6));
        assert_eq!(surface.pages(), vec![1, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_request_for_in_flight_page_is_a_no_op() {
        let (controller, doc, _) = open_at(ScriptedDocument::with_pages(10), 1).await;
        doc.delay_page(4, Duration::from_millis(50));
        let (first, second) = tokio::join!(controller.go_to(4), controller.go_to(4));
        assert_eq!(first.unwrap(), Navigation::Settled(4));
        assert_eq!(second.unwrap(), Navigation::Unchanged(4));
        assert_eq!(doc.render_calls(), vec![1, 4]);
    }

    #[tokio::test]
    async fn render_failure_keeps_position_and_handle_usable() {
        let (controller, doc, surface) = open_at(ScriptedDocument::with_pages(10), 2).await;
        doc.fail_page(3);
        let err = controller.go_to(3).await.err().unwrap();
        assert!(matches!(err, ReaderError::Render(_)));
        assert_eq!(controller.current_page(), Some(2));
        assert_eq!(controller.state(), ControllerState::Ready);

        assert_eq!(controller.go_to(4).await.unwrap(), Navigation::Settled(4));
        assert_eq!(surface.pages(), vec![2, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_discards_outstanding_renders() {
        let (controller, doc, surface) = open_at(ScriptedDocument::with_pages(10), 1).await;
        doc.delay_page(7, Duration::from_millis(100));

        let (outcome, _) = tokio::join!(controller.go_to(7), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            controller.destroy();
        });
        assert_eq!(outcome.unwrap(), Navigation::Superseded);
        assert_eq!(surface.pages(), vec![1]);
        assert_eq!(controller.state(), ControllerState::Destroyed);
        assert!(matches!(controller.go_to(2).await, Err(ReaderError::Destroyed)));
        controller.destroy();
    }
}

//! Paginated document reader with read-progress synchronization.
//!
//! A [`ReaderSession`] renders one page of a remote document at a time via the
//! [`RenderController`], and reports every settled page to the
//! [`SyncManager`], which keeps the device-local [`ProgressStore`] current and
//! sends debounced updates to the remote progress service.

pub mod document;
pub mod domain;
pub mod error;
pub mod progress_client;
pub mod render;
pub mod session;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod testing;

pub use document::{Credentials, Document, DocumentSource, HttpDocumentSource, RenderedPage};
pub use domain::{DocumentDescriptor, ProgressEvent, ProgressRecord, StartSource, StartingPage};
pub use error::{AuthError, LoadError, OpenError, ReaderError, RenderError, SyncWriteError};
pub use progress_client::{HttpProgressService, RemoteProgress, RemoteProgressService};
pub use render::{ControllerState, Navigation, PageSurface, RenderController};
pub use session::{
    Collaborators, ControlState, Focus, Key, NavOutcome, NavRequest, ReaderControls,
    ReaderInput, ReaderSession, SessionOptions,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, ProgressStore};
pub use sync::{NoopNotifier, ProgressNotifier, SyncConfig, SyncManager};

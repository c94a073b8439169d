// Error taxonomy of the reader core

/// The document could not be opened: unreachable, not a document, or corrupt.
#[derive(Debug, thiserror::Error)]
#[error("failed to load document {locator}: {reason}")]
pub struct LoadError {
    pub locator: String,
    pub reason: String,
}

impl LoadError {
    pub fn new(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            reason: reason.into(),
        }
    }
}

/// Credentials were required and rejected by the document source.
#[derive(Debug, thiserror::Error)]
#[error("access to {locator} was denied (status {status})")]
pub struct AuthError {
    pub locator: String,
    pub status: u16,
}

/// A failure raised while opening a document.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// A single page failed to render. The document stays usable.
#[derive(Debug, thiserror::Error)]
#[error("failed to render page {page}: {reason}")]
pub struct RenderError {
    pub page: u32,
    pub reason: String,
}

impl RenderError {
    pub fn new(page: u32, reason: impl Into<String>) -> Self {
        Self {
            page,
            reason: reason.into(),
        }
    }
}

/// The remote progress service did not accept a write.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to sync page {page} of {document_id}: {reason}")]
pub struct SyncWriteError {
    pub document_id: String,
    pub page: u32,
    pub reason: String,
}

/// Errors surfaced by the render controller and the reader session.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("the document has been closed")]
    Destroyed,
}

impl From<OpenError> for ReaderError {
    fn from(err: OpenError) -> Self {
        match err {
            OpenError::Load(e) => ReaderError::Load(e),
            OpenError::Auth(e) => ReaderError::Auth(e),
        }
    }
}

impl ReaderError {
    /// Errors that prevent a session from being opened at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReaderError::Load(_) | ReaderError::Auth(_))
    }
}

// Document source collaborator: opens a paginated document and renders pages

pub mod http;

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::{OpenError, RenderError};

pub use http::HttpDocumentSource;

/// Credentials presented to a document source or the progress service.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Basic { user: String, password: String },
}

impl Credentials {
    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        match self {
            Credentials::Bearer(token) => format!("Bearer {}", token),
            Credentials::Basic { user, password } => {
                format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
            }
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Bearer(_) => f.write_str("Bearer(***)"),
            Credentials::Basic { user, .. } => write!(f, "Basic({user}:***)"),
        }
    }
}

/// One rendered page, ready to be presented on a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub page: u32,
    /// Some sources only learn their length once a page has been rendered.
    pub total_pages: Option<u32>,
    pub content: String,
}

#[async_trait::async_trait]
pub trait DocumentSource: Send + Sync {
    async fn open(
        &self,
        locator: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn Document>, OpenError>;
}

#[async_trait::async_trait]
pub trait Document: Send + Sync {
    /// Total page count if the source already knows it.
    fn page_count(&self) -> Option<u32>;

    /// Render a 1-based page.
    async fn render_page(&self, page: u32) -> Result<RenderedPage, RenderError>;
}

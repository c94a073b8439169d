// Document source backed by an HTTP page service

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;

use super::{Credentials, Document, DocumentSource, RenderedPage};
use crate::error::{AuthError, LoadError, OpenError, RenderError};

#[derive(Clone, Debug)]
pub struct HttpDocumentSource {
    client: reqwest::Client,
}

impl HttpDocumentSource {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(HttpDocumentSource { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        HttpDocumentSource { client }
    }
}

#[async_trait::async_trait]
impl DocumentSource for HttpDocumentSource {
    /// GET {locator}
    #[tracing::instrument(level = "debug", skip(self, credentials))]
    async fn open(
        &self,
        locator: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn Document>, OpenError> {
        let base = locator.trim_end_matches('/').to_string();
        let auth = credentials.map(Credentials::header_value);
        tracing::debug!(%base, has_credentials = auth.is_some(), "GET document metadata");

        let mut req = self.client.get(&base);
        if let Some(v) = &auth {
            req = req.header("Authorization", v);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| LoadError::new(&base, e.to_string()))?;
        check_status(&base, resp.status())?;
        let body = resp
            .text()
            .await
            .map_err(|e| LoadError::new(&base, e.to_string()))?;
        let meta: DocumentMetaDto = serde_json::from_str(&body)
            .map_err(|e| LoadError::new(&base, format!("not a paginated document: {}", e)))?;

        tracing::debug!(%base, page_count = ?meta.page_count, "opened document");
        Ok(Arc::new(HttpDocument {
            client: self.client.clone(),
            base,
            auth,
            page_count: meta.page_count.filter(|n| *n >= 1),
        }))
    }
}

/// 401/403 are authorization failures; any other non-success status is a load failure.
fn check_status(locator: &str, status: StatusCode) -> Result<(), OpenError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError {
            locator: locator.to_string(),
            status: status.as_u16(),
        }
        .into()),
        s if !s.is_success() => Err(LoadError::new(locator, format!("status {}", s)).into()),
        _ => Ok(()),
    }
}

struct HttpDocument {
    client: reqwest::Client,
    base: String,
    auth: Option<String>,
    page_count: Option<u32>,
}

#[async_trait::async_trait]
impl Document for HttpDocument {
    fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    /// GET {locator}/pages/{page}
    #[tracing::instrument(level = "debug", skip(self), fields(base = %self.base))]
    async fn render_page(&self, page: u32) -> Result<RenderedPage, RenderError> {
        let url = format!("{}/pages/{}", self.base, page);
        tracing::debug!(%url, "GET page");
        let mut req = self.client.get(&url);
        if let Some(v) = &self.auth {
            req = req.header("Authorization", v);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| RenderError::new(page, e.to_string()))?;
        let status = resp
            .error_for_status()
            .map_err(|e| RenderError::new(page, e.to_string()))?;
        let body = status
            .text()
            .await
            .map_err(|e| RenderError::new(page, e.to_string()))?;
        let parsed: PageDto = serde_json::from_str(&body)
            .map_err(|e| RenderError::new(page, format!("undecodable page: {}", e)))?;
        Ok(parsed.into_rendered(page))
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetaDto {
    #[serde(deserialize_with = "crate::domain::de::opt_u32_from_str_or_num", default)]
    pub page_count: Option<u32>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageDto {
    #[serde(deserialize_with = "crate::domain::de::opt_u32_from_str_or_num", default)]
    pub page: Option<u32>,
    #[serde(deserialize_with = "crate::domain::de::opt_u32_from_str_or_num", default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub content: String,
}

impl PageDto {
    fn into_rendered(self, requested: u32) -> RenderedPage {
        RenderedPage {
            page: self.page.unwrap_or(requested),
            total_pages: self.total_pages.filter(|t| *t >= 1),
            content: self.content,
        }
    }
}

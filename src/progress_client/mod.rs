// Remote progress service: the cross-device record of how far a reader got

use anyhow::Context;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

/// Remote progress record as returned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteProgress {
    pub last_page_read: u32,
    pub total_pages: Option<u32>,
}

#[async_trait::async_trait]
pub trait RemoteProgressService: Send + Sync {
    /// `Ok(None)` when the service has no record for the document.
    async fn fetch(&self, document_id: &str) -> anyhow::Result<Option<RemoteProgress>>;
    async fn update(&self, document_id: &str, last_page_read: u32) -> anyhow::Result<()>;
}

#[derive(Clone, Debug)]
pub struct HttpProgressService {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpProgressService {
    /// Create a new client with the given base URL (e.g. "http://localhost:8080/learning").
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let base_url_str = base_url.into();
        tracing::debug!(base_url = %base_url_str, "creating HttpProgressService");
        Ok(HttpProgressService {
            base_url: base_url_str.trim_end_matches('/').to_string(),
            api_key: None,
            client,
        })
    }

    /// Return a client with the provided API key set (Bearer)
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    fn progress_url(&self, document_id: &str) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid progress service url: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("progress service url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["api", "progress", document_id]);
        Ok(url)
    }

    fn auth_header(&self) -> Option<(String, String)> {
        self.api_key
            .as_ref()
            .map(|k| ("Authorization".to_string(), format!("Bearer {}", k)))
    }

    /// GET /api/progress/:document_id
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_progress(&self, document_id: &str) -> anyhow::Result<Option<ProgressDto>> {
        let url = self.progress_url(document_id)?;
        tracing::debug!(%url, "GET progress");
        let mut req = self.client.get(url);
        if let Some((k, v)) = self.auth_header() {
            req = req.header(&k, &v);
        }
        let resp = req.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        match serde_json::from_str::<ProgressDto>(&body) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                let snippet: String = body.chars().take(500).collect();
                tracing::error!(error = %e, body_snippet = %snippet, "failed to parse ProgressDto");
                Err(e.into())
            }
        }
    }

    /// PUT /api/progress/:document_id
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn put_progress(&self, document_id: &str, last_page_read: u32) -> anyhow::Result<()> {
        let url = self.progress_url(document_id)?;
        tracing::debug!(%url, last_page_read, "PUT progress");
        let mut req = self
            .client
            .put(url)
            .json(&ProgressUpdateDto { last_page_read });
        if let Some((k, v)) = self.auth_header() {
            req = req.header(&k, &v);
        }
        req.send().await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteProgressService for HttpProgressService {
    async fn fetch(&self, document_id: &str) -> anyhow::Result<Option<RemoteProgress>> {
        let dto = self.get_progress(document_id).await?;
        Ok(dto.and_then(ProgressDto::into_remote))
    }

    async fn update(&self, document_id: &str, last_page_read: u32) -> anyhow::Result<()> {
        self.put_progress(document_id, last_page_read).await
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDto {
    #[serde(deserialize_with = "crate::domain::de::opt_u32_from_str_or_num", default)]
    pub last_page_read: Option<u32>,
    #[serde(deserialize_with = "crate::domain::de::opt_u32_from_str_or_num", default)]
    pub total_pages: Option<u32>,
}

impl ProgressDto {
    /// A record without a positive page is no record at all.
    fn into_remote(self) -> Option<RemoteProgress> {
        let last_page_read = self.last_page_read.filter(|p| *p >= 1)?;
        Some(RemoteProgress {
            last_page_read,
            total_pages: self.total_pages.filter(|t| *t >= 1),
        })
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateDto {
    pub last_page_read: u32,
}

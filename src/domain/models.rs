// Domain models shared by the render, storage, sync and session layers

/// Identity of the document open in a reader session.
///
/// `total_pages` starts out unknown for sources that only learn their length
/// after the first render. Once known it never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDescriptor {
    pub document_id: String,
    pub source_locator: String,
    total_pages: Option<u32>,
}

impl DocumentDescriptor {
    pub fn new(document_id: impl Into<String>, source_locator: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            source_locator: source_locator.into(),
            total_pages: None,
        }
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    /// Record the total page count the first time it is learned. Returns true
    /// when this call made it known.
    pub fn learn_total_pages(&mut self, total: Option<u32>) -> bool {
        match (self.total_pages, total) {
            (None, Some(t)) if t >= 1 => {
                self.total_pages = Some(t);
                true
            }
            _ => false,
        }
    }
}

/// Percentage of the document read, or `None` while the total is unknown.
pub fn percent_complete(page: u32, total_pages: Option<u32>) -> Option<u8> {
    let total = total_pages.filter(|t| *t >= 1)?;
    let percent = (100.0 * f64::from(page) / f64::from(total)).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}

/// The in-memory working record of a reader session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub document_id: String,
    last_page_read: u32,
    total_pages: Option<u32>,
}

impl ProgressRecord {
    pub fn new(document_id: impl Into<String>, last_page_read: u32, total_pages: Option<u32>) -> Self {
        let mut record = Self {
            document_id: document_id.into(),
            last_page_read: 1,
            total_pages: None,
        };
        record.settle(last_page_read, total_pages);
        record
    }

    pub fn last_page_read(&self) -> u32 {
        self.last_page_read
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    /// Derived on every read so it can never drift from the page values.
    pub fn percent_complete(&self) -> Option<u8> {
        percent_complete(self.last_page_read, self.total_pages)
    }

    /// Move the record to `page`, adopting `total` if it was still unknown.
    /// The page is clamped to `1..=total` once the total is known.
    pub fn settle(&mut self, page: u32, total: Option<u32>) {
        if self.total_pages.is_none() {
            self.total_pages = total.filter(|t| *t >= 1);
        }
        let upper = self.total_pages.unwrap_or(u32::MAX);
        self.last_page_read = page.clamp(1, upper);
    }

    pub fn event(&self) -> ProgressEvent {
        ProgressEvent {
            document_id: self.document_id.clone(),
            current_page: self.last_page_read,
            total_pages: self.total_pages,
            percent: self.percent_complete().unwrap_or(0),
        }
    }
}

/// Change notification raised on every settled page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub document_id: String,
    pub current_page: u32,
    pub total_pages: Option<u32>,
    /// 0 while the total is unknown
    pub percent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartSource {
    Hint,
    Remote,
    Local,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartingPage {
    pub page: u32,
    pub source: StartSource,
}

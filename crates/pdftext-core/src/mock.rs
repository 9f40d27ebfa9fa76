//! In-memory PDF engine for testing.
//!
//! Documents use a plain-text stand-in for PDF syntax:
//!
//! ```text
//! %PDF-mock
//! %%CreationDate: D:20210101120000Z
//! %%Title: Example
//! first page line one
//! first page line two
//! \x0c
//! second page
//! ```
//!
//! The first line must start with `%PDF-`. `%%Key: Value` lines directly
//! after it become info entries (`CreationDate`/`ModDate` map to the date
//! fields). Pages are separated by form feeds. A page containing `%%FAIL`
//! makes extraction of that page fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::{BackendError, DocumentInfo, PdfDocument, PdfEngine};
use crate::loader::DocumentSource;

/// Hand-rolled engine implementing [`PdfEngine`] for tests.
///
/// Counts opens and releases so tests can assert that every opened
/// document is released exactly once.
#[derive(Clone, Default)]
pub struct MockEngine {
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl PdfEngine for MockEngine {
    fn open(&self, source: &DocumentSource) -> Result<Box<dyn PdfDocument>, BackendError> {
        let bytes = match (source.as_bytes(), source.path()) {
            (Some(bytes), _) => bytes.to_vec(),
            (None, Some(path)) => std::fs::read(path)?,
            (None, None) => return Err(BackendError::Open("no source".into())),
        };
        let text = String::from_utf8(bytes).map_err(|e| BackendError::Open(e.to_string()))?;

        let (header, rest) = text.split_once('\n').unwrap_or((text.as_str(), ""));
        if !header.starts_with("%PDF-") {
            return Err(BackendError::Open("missing %PDF- header".into()));
        }
        if header.contains("encrypted") {
            return Err(BackendError::Encrypted);
        }

        let mut info = DocumentInfo::default();
        let mut body = rest;
        while let Some(line) = body.strip_prefix("%%") {
            let (entry, remainder) = line.split_once('\n').unwrap_or((line, ""));
            if let Some((key, value)) = entry.split_once(':') {
                let value = value.trim().to_string();
                match key.trim() {
                    "CreationDate" => info.creation_date = Some(value),
                    "ModDate" => info.modification_date = Some(value),
                    other => info.entries.push((other.to_string(), value)),
                }
            }
            body = remainder;
        }

        let pages = body.split('\x0c').map(str::to_string).collect();

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDocument {
            pages,
            info,
            released: Arc::clone(&self.released),
        }))
    }
}

struct MockDocument {
    pages: Vec<String>,
    info: DocumentInfo,
    released: Arc<AtomicUsize>,
}

impl PdfDocument for MockDocument {
    fn page_count(&self) -> Result<usize, BackendError> {
        Ok(self.pages.len())
    }

    fn page_lines(&self, page: usize) -> Result<Vec<String>, BackendError> {
        let text = self
            .pages
            .get(page)
            .ok_or_else(|| BackendError::Extraction(format!("no page {page}")))?;
        if text.contains("%%FAIL") {
            return Err(BackendError::Extraction(format!(
                "page {page} is damaged"
            )));
        }
        Ok(text.lines().map(str::to_string).collect())
    }

    fn info(&self, _source: &DocumentSource) -> Result<DocumentInfo, BackendError> {
        Ok(self.info.clone())
    }
}

impl Drop for MockDocument {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

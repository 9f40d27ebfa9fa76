use thiserror::Error;

use crate::loader::DocumentSource;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    Open(String),
    #[error("document is encrypted")]
    Encrypted,
    #[error("failed to extract text: {0}")]
    Extraction(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document information dictionary as reported by a backend.
///
/// Dates are kept in their raw PDF form (`D:YYYYMMDDHHmmSSOHH'mm'`);
/// [`crate::metadata`] converts them for output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    /// Remaining info entries in dictionary order.
    pub entries: Vec<(String, String)>,
}

/// A parsed, page-addressable PDF.
///
/// Implementors are not required to be `Send`: a document is opened, read
/// and dropped on the same blocking worker thread.
pub trait PdfDocument {
    fn page_count(&self) -> Result<usize, BackendError>;

    /// Raw text lines of one page (0-based), in reading order.
    fn page_lines(&self, page: usize) -> Result<Vec<String>, BackendError>;

    /// Every entry of the document information dictionary.
    ///
    /// `source` is the buffer the document was opened from, for backends
    /// that read the dictionary with a separate parser.
    fn info(&self, source: &DocumentSource) -> Result<DocumentInfo, BackendError>;
}

/// Trait for PDF parsing backends.
///
/// Implementors turn buffered bytes into a [`PdfDocument`]; everything
/// downstream (streaming, dehyphenation, metadata assembly) lives in this
/// crate and is backend-agnostic.
pub trait PdfEngine: Send + Sync {
    fn open(&self, source: &DocumentSource) -> Result<Box<dyn PdfDocument>, BackendError>;
}

use crate::ExtractError;
use crate::backend::{DocumentInfo, PdfDocument};
use crate::loader::DocumentSource;
use crate::metadata::MetadataError;

/// Exclusive owner of an opened document and the bytes backing it.
///
/// Released exactly once: either explicitly through [`release`](Self::release)
/// or on drop. Reads after release fail with
/// [`ExtractError::UseAfterRelease`].
pub struct DocumentHandle {
    document: Option<Box<dyn PdfDocument>>,
    source: Option<DocumentSource>,
}

impl DocumentHandle {
    pub fn new(document: Box<dyn PdfDocument>, source: DocumentSource) -> Self {
        Self {
            document: Some(document),
            source: Some(source),
        }
    }

    fn document(&self) -> Result<&dyn PdfDocument, ExtractError> {
        self.document
            .as_deref()
            .ok_or(ExtractError::UseAfterRelease)
    }

    pub fn page_count(&self) -> Result<usize, ExtractError> {
        self.document()?
            .page_count()
            .map_err(ExtractError::Extraction)
    }

    pub fn page_lines(&self, page: usize) -> Result<Vec<String>, ExtractError> {
        self.document()?
            .page_lines(page)
            .map_err(ExtractError::Extraction)
    }

    pub fn info(&self) -> Result<DocumentInfo, MetadataError> {
        let (Some(document), Some(source)) = (self.document.as_deref(), self.source.as_ref())
        else {
            return Err(MetadataError::Released);
        };
        document.info(source).map_err(MetadataError::Backend)
    }

    pub fn is_released(&self) -> bool {
        self.document.is_none()
    }

    /// Close the document and delete any spill file.
    ///
    /// Returns `true` if this call performed the release.
    pub fn release(&mut self) -> bool {
        let Some(document) = self.document.take() else {
            return false;
        };
        // The engine may still reference the spill file, so the document goes first.
        drop(document);
        let spilled = self.source.take().is_some_and(|s| s.is_spilled());
        tracing::debug!(spilled, "document released");
        true
    }
}

impl Drop for DocumentHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("released", &self.is_released())
            .field("source_len", &self.source.as_ref().map(|s| s.len()))
            .finish()
    }
}

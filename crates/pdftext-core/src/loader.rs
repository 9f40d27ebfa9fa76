use std::path::Path;

use futures_util::StreamExt;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::ExtractError;
use crate::backend::{BackendError, PdfEngine};
use crate::fetch::ByteStream;
use crate::handle::DocumentHandle;

/// Buffered PDF bytes, either held in memory or spilled to a temp file.
///
/// The temp file is deleted when the source is dropped.
#[derive(Debug)]
pub enum DocumentSource {
    Memory(Vec<u8>),
    TempFile { file: NamedTempFile, len: u64 },
}

impl DocumentSource {
    pub fn len(&self) -> u64 {
        match self {
            Self::Memory(data) => data.len() as u64,
            Self::TempFile { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self, Self::TempFile { .. })
    }

    /// The in-memory bytes, if the source was not spilled.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Memory(data) => Some(data),
            Self::TempFile { .. } => None,
        }
    }

    /// Path of the spill file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Memory(_) => None,
            Self::TempFile { file, .. } => Some(file.path()),
        }
    }
}

/// Drain `stream` into a [`DocumentSource`].
///
/// Bytes stay in memory while the running total is at most
/// `threshold_bytes`. The chunk that crosses it moves everything buffered so
/// far into a temp file and the rest of the body is written straight to
/// disk. A threshold of `0` always spills.
pub async fn buffer_source(
    mut stream: ByteStream,
    threshold_bytes: u64,
) -> Result<DocumentSource, ExtractError> {
    let mut memory: Vec<u8> = Vec::new();
    let mut spill: Option<(NamedTempFile, tokio::fs::File)> = None;
    let mut total: u64 = 0;

    if threshold_bytes == 0 {
        spill = Some(create_spill_file()?);
    }

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        total += chunk.len() as u64;

        if spill.is_none() && total > threshold_bytes {
            let (file, mut writer) = create_spill_file()?;
            writer.write_all(&memory).await?;
            memory = Vec::new();
            tracing::debug!(threshold_bytes, "document exceeds memory threshold, spilling to disk");
            spill = Some((file, writer));
        }

        match spill.as_mut() {
            Some((_, writer)) => writer.write_all(&chunk).await?,
            None => memory.extend_from_slice(&chunk),
        }
    }

    match spill {
        Some((file, mut writer)) => {
            writer.flush().await?;
            tracing::info!(bytes = total, path = %file.path().display(), "download complete (spilled)");
            Ok(DocumentSource::TempFile { file, len: total })
        }
        None => {
            tracing::info!(bytes = total, "download complete");
            Ok(DocumentSource::Memory(memory))
        }
    }
}

fn create_spill_file() -> Result<(NamedTempFile, tokio::fs::File), ExtractError> {
    let file = tempfile::Builder::new()
        .prefix("pdftext-")
        .suffix(".pdf")
        .tempfile()?;
    let writer = tokio::fs::File::from_std(file.as_file().try_clone()?);
    Ok((file, writer))
}

/// Parse `source` into a [`DocumentHandle`] with the given engine.
///
/// Blocking: call from a blocking worker thread.
pub fn open_document(
    engine: &dyn PdfEngine,
    source: DocumentSource,
) -> Result<DocumentHandle, ExtractError> {
    if source.is_empty() {
        return Err(ExtractError::Parse(BackendError::Open(
            "empty document".into(),
        )));
    }

    tracing::info!(bytes = source.len(), spilled = source.is_spilled(), "opening PDF");
    let document = engine.open(&source).map_err(ExtractError::Parse)?;
    let handle = DocumentHandle::new(document, source);
    tracing::info!(pages = handle.page_count()?, "PDF opened");
    Ok(handle)
}

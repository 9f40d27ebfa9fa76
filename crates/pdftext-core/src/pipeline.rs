//! Request-level orchestration: fetch → load → {produce ⇄ dehyphenate}.
//!
//! Every operation takes a [`CancellationToken`]. Cancelling it stops the
//! download, makes the consumer return [`ExtractError::Cancelled`], and
//! lets the producer wind down and release its document.

use std::future::Future;
use std::sync::Arc;

use futures_util::Stream;
use tokio::sync::{Semaphore, oneshot};
use tokio_util::sync::CancellationToken;

use crate::backend::{DocumentInfo, PdfEngine};
use crate::dehyphen::dehyphenate_pipe;
use crate::fetch::Fetcher;
use crate::loader::{DocumentSource, buffer_source, open_document};
use crate::metadata::{ResultMap, assemble};
use crate::pipe::{PipeReader, pipe};
use crate::producer::produce_text;
use crate::{Config, ExtractError};

/// Shared entry point for all extraction operations.
///
/// Cheap to clone: the config, HTTP client, PDF engine and worker permits
/// are shared.
#[derive(Clone)]
pub struct TextService {
    config: Arc<Config>,
    fetcher: Fetcher,
    engine: Arc<dyn PdfEngine>,
    /// One permit per open document, `num_workers` in total.
    workers: Arc<Semaphore>,
}

impl TextService {
    pub fn new(config: Config, engine: Arc<dyn PdfEngine>) -> Result<Self, ExtractError> {
        let fetcher = Fetcher::new(config.fetch_timeout())?;
        Ok(Self::with_fetcher(config, engine, fetcher))
    }

    pub fn with_fetcher(config: Config, engine: Arc<dyn PdfEngine>, fetcher: Fetcher) -> Self {
        let workers = Arc::new(Semaphore::new(config.num_workers.max(1)));
        Self {
            config: Arc::new(config),
            fetcher,
            engine,
            workers,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Download `url` and buffer it according to the memory threshold.
    pub async fn download(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<DocumentSource, ExtractError> {
        let threshold = self.config.memory_threshold_bytes();
        cancellable(cancel, async {
            let body = self.fetcher.get(url).await?;
            buffer_source(body, threshold).await
        })
        .await
    }

    /// Dehyphenated plain text of the PDF at `url`.
    pub async fn remote_pdf_to_text(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractError> {
        let source = self.download(url, cancel).await?;
        self.source_to_text(source, cancel).await
    }

    /// Dehyphenated text of already buffered PDF bytes.
    pub async fn source_to_text(
        &self,
        source: DocumentSource,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractError> {
        let (reader, _) = self.start_producer(source, false, cancel).await?;
        dehyphenate_pipe(reader, self.config.dehyphen_options(), cancel).await
    }

    /// Document metadata plus dehyphenated text under `content_key`
    /// (the configured default when `None`).
    pub async fn remote_pdf_to_json(
        &self,
        url: &str,
        content_key: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ResultMap, ExtractError> {
        let source = self.download(url, cancel).await?;
        self.source_to_json(source, content_key, cancel).await
    }

    pub async fn source_to_json(
        &self,
        source: DocumentSource,
        content_key: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ResultMap, ExtractError> {
        let (reader, info) = self.start_producer(source, true, cancel).await?;
        let info = info.unwrap_or_default();
        let content = dehyphenate_pipe(reader, self.config.dehyphen_options(), cancel).await?;
        let key = content_key.unwrap_or(&self.config.content_key);
        Ok(assemble(&info, content, key, self.config.collision_policy)?)
    }

    /// Raw extracted lines of the PDF at `url`, yielded as they are produced.
    ///
    /// No dehyphenation is applied. Dropping the stream stops the producer.
    pub async fn remote_pdf_raw_lines(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<impl Stream<Item = Result<String, ExtractError>> + Send + use<>, ExtractError> {
        let source = self.download(url, cancel).await?;
        self.source_raw_lines(source, cancel).await
    }

    pub async fn source_raw_lines(
        &self,
        source: DocumentSource,
        cancel: &CancellationToken,
    ) -> Result<impl Stream<Item = Result<String, ExtractError>> + Send + use<>, ExtractError> {
        let (reader, _) = self.start_producer(source, false, cancel).await?;
        Ok(reader.into_stream())
    }

    /// Text of the PDF at `url` via the external extraction tool.
    ///
    /// Bypasses the PDF engine: the body is streamed straight into the
    /// tool's stdin as it downloads.
    pub async fn remote_pdf_to_text_external(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractError> {
        let body = cancellable(cancel, async { Ok(self.fetcher.get(url).await?) }).await?;
        self.config.external_extractor().extract(body, cancel).await
    }

    /// Open `source` on a blocking worker and start writing its text into a
    /// pipe.
    ///
    /// Waits for a worker permit first; the permit is held until the
    /// producer has released the document. Resolves once the document is
    /// open (or failed to open), returning the read end and, if requested,
    /// the document info read before extraction began.
    async fn start_producer(
        &self,
        source: DocumentSource,
        with_info: bool,
        cancel: &CancellationToken,
    ) -> Result<(PipeReader, Option<DocumentInfo>), ExtractError> {
        let permit = cancellable(cancel, async {
            Arc::clone(&self.workers)
                .acquire_owned()
                .await
                .map_err(|_| ExtractError::Task("worker pool closed".into()))
        })
        .await?;

        let (writer, reader) = pipe(self.config.pipe_capacity);
        let (opened_tx, opened_rx) = oneshot::channel::<Result<Option<DocumentInfo>, ExtractError>>();
        let engine = Arc::clone(&self.engine);
        let producer_cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let handle = match open_document(engine.as_ref(), source) {
                Ok(handle) => handle,
                Err(e) => {
                    let _ = opened_tx.send(Err(e));
                    return;
                }
            };

            let info = if with_info {
                match handle.info() {
                    Ok(info) => Some(info),
                    Err(e) => {
                        let _ = opened_tx.send(Err(e.into()));
                        return;
                    }
                }
            } else {
                None
            };

            if opened_tx.send(Ok(info)).is_err() {
                // Requester gone before extraction started; dropping the
                // handle releases it.
                return;
            }

            let outcome = produce_text(handle, writer, &producer_cancel);
            tracing::debug!(?outcome, "text producer finished");
        });

        let info = cancellable(cancel, async {
            opened_rx
                .await
                .map_err(|_| ExtractError::Task("document loader exited unexpectedly".into()))?
        })
        .await?;

        Ok((reader, info))
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T, ExtractError>>,
) -> Result<T, ExtractError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ExtractError::Cancelled),
        result = work => result,
    }
}

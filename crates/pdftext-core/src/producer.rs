use tokio_util::sync::CancellationToken;

use crate::ExtractError;
use crate::handle::DocumentHandle;
use crate::pipe::PipeWriter;

/// How a producer run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProduceOutcome {
    /// Every page was written and the pipe closed.
    Completed { pages: usize, lines: usize },
    /// The reader went away or the request was cancelled.
    Abandoned { pages: usize },
    /// Extraction failed; the error was sent down the pipe.
    Failed,
}

/// Write the document's text into `writer` page by page, then release the
/// document.
///
/// Blocking: run on a blocking worker thread. The handle is released after
/// the last page has been read and before the pipe is closed, on every exit
/// path, so a reader that saw the end of the text knows the document is
/// gone. On failure the pipe is closed with the error so the reader does not
/// wait forever.
pub fn produce_text(
    mut handle: DocumentHandle,
    writer: PipeWriter,
    cancel: &CancellationToken,
) -> ProduceOutcome {
    let progress = write_pages(&handle, &writer, cancel);
    handle.release();

    match progress {
        Ok(Progress::Done { pages, lines }) => {
            writer.close();
            ProduceOutcome::Completed { pages, lines }
        }
        Ok(Progress::Stopped { pages }) => {
            tracing::debug!(pages, "text producer stopped early");
            ProduceOutcome::Abandoned { pages }
        }
        Err(error) => {
            tracing::warn!(error = %error, "text extraction failed");
            writer.fail(error);
            ProduceOutcome::Failed
        }
    }
}

enum Progress {
    Done { pages: usize, lines: usize },
    Stopped { pages: usize },
}

fn write_pages(
    handle: &DocumentHandle,
    writer: &PipeWriter,
    cancel: &CancellationToken,
) -> Result<Progress, ExtractError> {
    let page_count = handle.page_count()?;
    let mut lines = 0usize;

    for page in 0..page_count {
        if cancel.is_cancelled() || writer.reader_gone() {
            return Ok(Progress::Stopped { pages: page });
        }
        for line in handle.page_lines(page)? {
            if writer.write_line(line).is_err() {
                return Ok(Progress::Stopped { pages: page });
            }
            lines += 1;
        }
        tracing::trace!(page, "page written");
    }

    Ok(Progress::Done {
        pages: page_count,
        lines,
    })
}

//! Bounded line pipe between the blocking text producer and async readers.

use futures_util::Stream;
use tokio::sync::mpsc;

use crate::ExtractError;
use crate::backend::BackendError;

enum Message {
    Line(String),
    Failed(ExtractError),
    End,
}

/// Create a pipe holding at most `capacity` lines in flight.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PipeWriter { tx: Some(tx) },
        PipeReader { rx, done: false },
    )
}

/// Write end. Used from a blocking thread.
///
/// Dropping the writer without [`close`](Self::close) or
/// [`fail`](Self::fail) is reported to the reader as an aborted extraction.
pub struct PipeWriter {
    tx: Option<mpsc::Sender<Message>>,
}

/// The reader went away; the producer should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderGone;

impl PipeWriter {
    /// Send one line, blocking while the pipe is full.
    pub fn write_line(&self, line: String) -> Result<(), ReaderGone> {
        let tx = self.tx.as_ref().ok_or(ReaderGone)?;
        tx.blocking_send(Message::Line(line)).map_err(|_| ReaderGone)
    }

    /// Close the write end normally.
    pub fn close(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.blocking_send(Message::End);
        }
    }

    /// Close the write end with an error the reader will observe.
    pub fn fail(mut self, error: ExtractError) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.blocking_send(Message::Failed(error));
        }
    }

    pub fn reader_gone(&self) -> bool {
        self.tx.as_ref().is_none_or(|tx| tx.is_closed())
    }
}

/// Read end. Yields lines in the order they were written.
pub struct PipeReader {
    rx: mpsc::Receiver<Message>,
    done: bool,
}

impl PipeReader {
    /// Next line, `None` once the writer closed the pipe.
    pub async fn next_line(&mut self) -> Option<Result<String, ExtractError>> {
        if self.done {
            return None;
        }
        match self.rx.recv().await {
            Some(Message::Line(line)) => Some(Ok(line)),
            Some(Message::Failed(error)) => {
                self.done = true;
                Some(Err(error))
            }
            Some(Message::End) => {
                self.done = true;
                None
            }
            None => {
                self.done = true;
                Some(Err(ExtractError::Extraction(BackendError::Extraction(
                    "text producer stopped without closing the pipe".into(),
                ))))
            }
        }
    }

    /// Adapt into a [`Stream`] of lines.
    pub fn into_stream(self) -> impl Stream<Item = Result<String, ExtractError>> + Send {
        futures_util::stream::unfold(self, |mut reader| async move {
            reader.next_line().await.map(|item| (item, reader))
        })
    }
}

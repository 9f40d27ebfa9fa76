use std::process::{ExitStatus, Stdio};

use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio_util::sync::CancellationToken;

use crate::fetch::ByteStream;
use crate::{ExitPolicy, ExtractError};

/// Longest stderr excerpt carried in [`ProcessError::Exit`].
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("process exited with {}: {stderr}", describe_exit(.code))]
    Exit { code: Option<i32>, stderr: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

/// Converts PDF bytes to text with an external command line tool.
///
/// The tool reads the PDF on stdin and writes plain text to stdout
/// (`pdftotext -nopgbrk -enc UTF-8 - -` by default).
#[derive(Debug, Clone)]
pub struct ExternalExtractor {
    program: String,
    args: Vec<String>,
    exit_policy: ExitPolicy,
}

impl ExternalExtractor {
    pub fn new(program: impl Into<String>, args: Vec<String>, exit_policy: ExitPolicy) -> Self {
        Self {
            program: program.into(),
            args,
            exit_policy,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Pipe `input` through the tool and return its non-blank output lines
    /// joined with `\n`.
    ///
    /// Input is written and output read concurrently, so output larger than
    /// the OS pipe buffer cannot stall the writer.
    pub async fn extract(
        &self,
        input: ByteStream,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        tracing::info!(program = %self.program, pid = ?child.id(), "external extractor started");

        let (Some(stdin), Some(stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(ProcessError::Io(std::io::Error::other("child stdio not captured")).into());
        };

        let feed = feed_stdin(input, stdin);

        let collect = async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut kept: Vec<String> = Vec::new();
            while let Some(line) = lines.next_line().await? {
                if !line.trim().is_empty() {
                    kept.push(line);
                }
            }
            Ok::<_, std::io::Error>(kept)
        };

        let drain_stderr = async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await?;
            Ok::<_, std::io::Error>(buf)
        };

        let run = async {
            let (fed, kept, stderr) = tokio::join!(feed, collect, drain_stderr);
            let status = child.wait().await.map_err(ProcessError::Io)?;
            Ok::<_, ExtractError>((fed, kept, stderr, status))
        };

        let (fed, kept, stderr, status) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
            result = run => result?,
        };

        let kept = kept.map_err(ProcessError::Io)?;
        let stderr = stderr.map_err(ProcessError::Io)?;
        self.check_exit(fed, status, &stderr)?;

        tracing::info!(
            program = %self.program,
            lines = kept.len(),
            "external extraction finished"
        );
        Ok(kept.join("\n"))
    }

    fn check_exit(
        &self,
        fed: Result<u64, ExtractError>,
        status: ExitStatus,
        stderr: &[u8],
    ) -> Result<(), ExtractError> {
        match fed {
            // The body broke off mid-transfer: the tool saw a truncated PDF.
            Err(e @ ExtractError::Transfer(_)) => return Err(e),
            Err(ExtractError::Process(ProcessError::Io(e)))
                if e.kind() == std::io::ErrorKind::BrokenPipe =>
            {
                // The tool stopped reading early; its exit status decides.
                tracing::debug!(program = %self.program, "stdin closed by extractor");
            }
            Err(e) => return Err(e),
            Ok(bytes) => tracing::debug!(program = %self.program, bytes, "input fed"),
        }

        if status.success() {
            return Ok(());
        }

        let stderr = stderr_tail(stderr);
        match self.exit_policy {
            ExitPolicy::Strict => Err(ProcessError::Exit {
                code: status.code(),
                stderr,
            }
            .into()),
            ExitPolicy::BestEffort => {
                tracing::warn!(
                    program = %self.program,
                    code = ?status.code(),
                    stderr = %stderr,
                    "extractor exited abnormally, returning collected output"
                );
                Ok(())
            }
        }
    }
}

/// Copy the byte stream into the child's stdin, then close it.
async fn feed_stdin(mut input: ByteStream, mut stdin: ChildStdin) -> Result<u64, ExtractError> {
    let mut written = 0u64;
    while let Some(chunk) = input.next().await {
        let chunk = chunk?;
        stdin
            .write_all(&chunk)
            .await
            .map_err(ProcessError::Io)?;
        written += chunk.len() as u64;
    }
    stdin.shutdown().await.map_err(ProcessError::Io)?;
    drop(stdin);
    Ok(written)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

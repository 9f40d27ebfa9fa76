use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub mod backend;
pub mod config_file;
pub mod dehyphen;
pub mod external;
pub mod fetch;
pub mod handle;
pub mod loader;
pub mod metadata;
pub mod mock;
pub mod pipe;
pub mod pipeline;
pub mod producer;

// Re-export for convenience
pub use backend::{BackendError, DocumentInfo, PdfDocument, PdfEngine};
pub use dehyphen::{DehyphenOptions, Dehyphenator, dehyphenate};
pub use external::{ExternalExtractor, ProcessError};
pub use fetch::{ByteStream, FetchError, Fetcher};
pub use handle::DocumentHandle;
pub use loader::DocumentSource;
pub use metadata::{MetadataError, ResultMap};
pub use pipeline::TextService;

/// Failure of one extraction pipeline run.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("download failed: {0}")]
    Transfer(#[from] FetchError),
    #[error("could not parse PDF: {0}")]
    Parse(#[source] BackendError),
    #[error("text extraction failed: {0}")]
    Extraction(#[source] BackendError),
    #[error("document used after release")]
    UseAfterRelease,
    #[error("external extractor failed: {0}")]
    Process(#[from] ProcessError),
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("extraction cancelled")]
    Cancelled,
    #[error("worker task failed: {0}")]
    Task(String),
}

impl ExtractError {
    /// Stable machine-readable tag for this error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transfer(_) => "transfer_error",
            Self::Parse(_) => "parse_error",
            Self::Extraction(_) => "extraction_error",
            Self::UseAfterRelease => "use_after_release_error",
            Self::Process(_) => "process_error",
            Self::Metadata(_) => "metadata_error",
            Self::Io(_) => "io_error",
            Self::Cancelled => "cancelled",
            Self::Task(_) => "task_error",
        }
    }
}

/// Separator placed between dehyphenated segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinSeparator {
    #[default]
    Space,
    Newline,
}

impl JoinSeparator {
    pub fn as_char(self) -> char {
        match self {
            Self::Space => ' ',
            Self::Newline => '\n',
        }
    }
}

impl FromStr for JoinSeparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "space" => Ok(Self::Space),
            "newline" => Ok(Self::Newline),
            other => Err(format!("unknown separator `{other}` (expected space or newline)")),
        }
    }
}

/// What to do when the external extractor exits abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Fail with [`ProcessError::Exit`].
    #[default]
    Strict,
    /// Return whatever output was collected.
    BestEffort,
}

impl FromStr for ExitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "best-effort" | "best_effort" => Ok(Self::BestEffort),
            other => Err(format!("unknown exit policy `{other}` (expected strict or best-effort)")),
        }
    }
}

/// What to do when a metadata field has the same name as the content key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Keep the content, drop the metadata value, log a warning.
    #[default]
    ContentWins,
    /// Fail with [`MetadataError::KeyCollision`].
    Reject,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "content-wins" | "content_wins" => Ok(Self::ContentWins),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown collision policy `{other}` (expected content-wins or reject)"
            )),
        }
    }
}

/// Configuration for the extraction pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bodies up to this size stay in memory; larger ones spill to a temp
    /// file. `0` always spills.
    pub memory_threshold_mebibytes: u64,
    /// Lines buffered between producer and dehyphenator.
    pub pipe_capacity: usize,
    pub dehyphenate: bool,
    pub separator: JoinSeparator,
    /// Whole-request timeout for downloads. `None` waits indefinitely.
    pub fetch_timeout_secs: Option<u64>,
    pub external_program: String,
    pub external_args: Vec<String>,
    pub exit_policy: ExitPolicy,
    pub content_key: String,
    pub collision_policy: CollisionPolicy,
    /// Documents a service holds open at once.
    pub num_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_threshold_mebibytes: 32,
            pipe_capacity: 64,
            dehyphenate: true,
            separator: JoinSeparator::Space,
            fetch_timeout_secs: None,
            external_program: "pdftotext".to_string(),
            external_args: ["-nopgbrk", "-enc", "UTF-8", "-", "-"]
                .into_iter()
                .map(String::from)
                .collect(),
            exit_policy: ExitPolicy::Strict,
            content_key: metadata::DEFAULT_CONTENT_KEY.to_string(),
            collision_policy: CollisionPolicy::ContentWins,
            num_workers: 4,
        }
    }
}

impl Config {
    pub fn memory_threshold_bytes(&self) -> u64 {
        self.memory_threshold_mebibytes.saturating_mul(1024 * 1024)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn dehyphen_options(&self) -> DehyphenOptions {
        DehyphenOptions {
            join_hyphenated: self.dehyphenate,
            separator: self.separator,
        }
    }

    pub fn external_extractor(&self) -> ExternalExtractor {
        ExternalExtractor::new(
            self.external_program.clone(),
            self.external_args.clone(),
            self.exit_policy,
        )
    }
}

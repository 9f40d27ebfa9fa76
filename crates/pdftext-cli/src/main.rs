use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pdftext_core::fetch::stream_from_bytes;
use pdftext_core::{DocumentSource, JoinSeparator, TextService, config_file};
use pdftext_mupdf::MupdfEngine;

mod output;

use output::ColorMode;

/// Extract the dehyphenated text of a PDF from a URL or a local file
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// URL of the PDF, or path to a local PDF file
    source: String,

    /// Print document metadata and text as JSON
    #[arg(long, conflicts_with_all = ["large", "raw"])]
    json: bool,

    /// Extract with the external tool (pdftotext) instead of MuPDF
    #[arg(long, conflicts_with = "raw")]
    large: bool,

    /// Print the extracted lines as they are, without dehyphenation
    #[arg(long)]
    raw: bool,

    /// Never join lines at a trailing hyphen
    #[arg(long)]
    no_dehyphenate: bool,

    /// Key for the extracted text in JSON output
    #[arg(long)]
    content_key: Option<String>,

    /// Separator between joined lines: space or newline
    #[arg(long)]
    separator: Option<JoinSeparator>,

    /// Write output to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let color = ColorMode(!cli.no_color);
    if let Err(e) = run(cli).await {
        output::print_error(&e, color);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Resolve configuration: CLI flags > env vars > config files > defaults
    let (mut config, _) = config_file::load_effective_config();
    if cli.no_dehyphenate {
        config.dehyphenate = false;
    }
    if let Some(separator) = cli.separator {
        config.separator = separator;
    }
    if let Some(key) = &cli.content_key {
        config.content_key = key.clone();
    }

    let service = TextService::new(config, Arc::new(MupdfEngine::new()))?;

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };

    let local = local_file(&cli.source);

    if cli.raw {
        let mut lines = match &local {
            Some(path) => {
                let source = read_local(path)?;
                service.source_raw_lines(source, &cancel).await?.boxed()
            }
            None => service
                .remote_pdf_raw_lines(&cli.source, &cancel)
                .await?
                .boxed(),
        };
        while let Some(line) = lines.next().await {
            writeln!(out, "{}", line?)?;
        }
    } else if cli.large {
        let text = match &local {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                service
                    .config()
                    .external_extractor()
                    .extract(stream_from_bytes(bytes), &cancel)
                    .await?
            }
            None => service.remote_pdf_to_text_external(&cli.source, &cancel).await?,
        };
        output::write_text(&mut out, &text)?;
    } else if cli.json {
        let map = match &local {
            Some(path) => service.source_to_json(read_local(path)?, None, &cancel).await?,
            None => service.remote_pdf_to_json(&cli.source, None, &cancel).await?,
        };
        output::write_json(&mut out, &map)?;
    } else {
        let text = match &local {
            Some(path) => service.source_to_text(read_local(path)?, &cancel).await?,
            None => service.remote_pdf_to_text(&cli.source, &cancel).await?,
        };
        output::write_text(&mut out, &text)?;
    }

    out.flush()?;
    Ok(())
}

/// `source` as a local path, unless it looks like a URL.
fn local_file(source: &str) -> Option<PathBuf> {
    if source.contains("://") {
        return None;
    }
    let path = Path::new(source);
    path.exists().then(|| path.to_path_buf())
}

fn read_local(path: &Path) -> anyhow::Result<DocumentSource> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    Ok(DocumentSource::Memory(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_never_local() {
        assert_eq!(local_file("https://example.org/a.pdf"), None);
        assert_eq!(local_file("/definitely/not/here.pdf"), None);
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "pdftext-cli",
            "https://example.org/a.pdf",
            "--json",
            "--content-key",
            "body",
            "--separator",
            "newline",
            "-vv",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.content_key.as_deref(), Some("body"));
        assert_eq!(cli.separator, Some(JoinSeparator::Newline));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn json_conflicts_with_raw() {
        assert!(Cli::try_parse_from(["pdftext-cli", "x", "--json", "--raw"]).is_err());
    }
}

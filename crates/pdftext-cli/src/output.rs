use std::io::Write;

use owo_colors::OwoColorize;
use pdftext_core::{ExtractError, ResultMap};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Write the result mapping as pretty-printed JSON.
pub fn write_json(w: &mut dyn Write, map: &ResultMap) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *w, map)?;
    writeln!(w)?;
    Ok(())
}

pub fn write_text(w: &mut dyn Write, text: &str) -> std::io::Result<()> {
    w.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        writeln!(w)?;
    }
    Ok(())
}

/// Print a failure to stderr, tagged with the error class when known.
pub fn print_error(error: &anyhow::Error, color: ColorMode) {
    let kind = error
        .downcast_ref::<ExtractError>()
        .map(ExtractError::kind)
        .unwrap_or("error");

    if color.enabled() {
        eprintln!("{} {:#}", format!("{kind}:").red().bold(), error);
    } else {
        eprintln!("{kind}: {:#}", error);
    }
}

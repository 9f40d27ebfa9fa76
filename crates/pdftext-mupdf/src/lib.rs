use lopdf::{Dictionary, Object};
use mupdf::{Document, MetadataName, TextPageFlags};

use pdftext_core::{BackendError, DocumentInfo, DocumentSource, PdfDocument, PdfEngine};

/// Info entries MuPDF can report by name, used when the Info dictionary
/// cannot be read directly.
const STANDARD_ENTRIES: [(MetadataName, &str); 6] = [
    (MetadataName::Title, "Title"),
    (MetadataName::Author, "Author"),
    (MetadataName::Subject, "Subject"),
    (MetadataName::Keywords, "Keywords"),
    (MetadataName::Creator, "Creator"),
    (MetadataName::Producer, "Producer"),
];

/// MuPDF-based implementation of [`PdfEngine`].
///
/// This crate is the sole AGPL island: it isolates the mupdf dependency
/// (which is AGPL-3.0) so that the rest of the pipeline does not
/// transitively depend on it.
///
/// MuPDF documents are not `Send`; each one is opened, read and dropped on
/// the blocking worker that called [`PdfEngine::open`]. MuPDF only exposes
/// the standard Info keys, so the full Info dictionary is read with `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfEngine;

impl MupdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl PdfEngine for MupdfEngine {
    fn open(&self, source: &DocumentSource) -> Result<Box<dyn PdfDocument>, BackendError> {
        let document = match (source.as_bytes(), source.path()) {
            (Some(bytes), _) => Document::from_bytes(bytes, "application/pdf"),
            (None, Some(path)) => {
                let path_str = path
                    .to_str()
                    .ok_or_else(|| BackendError::Open("invalid path encoding".into()))?;
                Document::open(path_str)
            }
            (None, None) => return Err(BackendError::Open("empty document source".into())),
        }
        .map_err(|e| BackendError::Open(e.to_string()))?;

        if document
            .needs_password()
            .map_err(|e| BackendError::Open(e.to_string()))?
        {
            return Err(BackendError::Encrypted);
        }

        Ok(Box::new(MupdfDocument { document }))
    }
}

struct MupdfDocument {
    document: Document,
}

impl MupdfDocument {
    fn metadata(&self, name: MetadataName) -> Result<Option<String>, BackendError> {
        let value = self
            .document
            .metadata(name)
            .map_err(|e| BackendError::Extraction(e.to_string()))?;
        let value = value.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    fn standard_info(&self) -> Result<DocumentInfo, BackendError> {
        let mut info = DocumentInfo {
            creation_date: self.metadata(MetadataName::CreationDate)?,
            modification_date: self.metadata(MetadataName::ModDate)?,
            entries: Vec::new(),
        };
        for (name, key) in STANDARD_ENTRIES {
            if let Some(value) = self.metadata(name)? {
                info.entries.push((key.to_string(), value));
            }
        }
        Ok(info)
    }
}

impl PdfDocument for MupdfDocument {
    fn page_count(&self) -> Result<usize, BackendError> {
        let count = self
            .document
            .page_count()
            .map_err(|e| BackendError::Extraction(e.to_string()))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn page_lines(&self, page: usize) -> Result<Vec<String>, BackendError> {
        let index = i32::try_from(page)
            .map_err(|_| BackendError::Extraction(format!("page index {page} out of range")))?;
        let page = self
            .document
            .load_page(index)
            .map_err(|e| BackendError::Extraction(e.to_string()))?;
        let text_page = page
            .to_text_page(TextPageFlags::empty())
            .map_err(|e| BackendError::Extraction(e.to_string()))?;

        // Block/line iteration gives reading-order lines, one per text line
        // on the page.
        let mut lines = Vec::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                let text: String = line
                    .chars()
                    .map(|c| c.char().unwrap_or('\u{FFFD}'))
                    .collect();
                lines.push(text);
            }
        }
        tracing::trace!(page = index, lines = lines.len(), "page text extracted");
        Ok(lines)
    }

    fn info(&self, source: &DocumentSource) -> Result<DocumentInfo, BackendError> {
        match read_info(source) {
            Ok(Some(info)) => Ok(info),
            Ok(None) => self.standard_info(),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read Info dictionary, using standard entries");
                self.standard_info()
            }
        }
    }
}

/// Read every entry of the trailer `/Info` dictionary.
///
/// `None` when the document has no Info dictionary.
fn read_info(source: &DocumentSource) -> Result<Option<DocumentInfo>, lopdf::Error> {
    let doc = match (source.as_bytes(), source.path()) {
        (Some(bytes), _) => lopdf::Document::load_mem(bytes)?,
        (None, Some(path)) => lopdf::Document::load(path)?,
        (None, None) => return Ok(None),
    };

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_object(*id)?,
        Ok(object) => object,
        Err(_) => return Ok(None),
    };
    let Ok(dict) = info.as_dict() else {
        return Ok(None);
    };
    Ok(Some(info_from_dictionary(&doc, dict)))
}

fn info_from_dictionary(doc: &lopdf::Document, dict: &Dictionary) -> DocumentInfo {
    let mut info = DocumentInfo::default();
    for (key, value) in dict.iter() {
        let value = match value {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(object) => object,
                Err(_) => continue,
            },
            other => other,
        };
        let Some(value) = text_value(value) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let key = String::from_utf8_lossy(key);
        match key.as_ref() {
            "CreationDate" => info.creation_date = Some(value.to_string()),
            "ModDate" => info.modification_date = Some(value.to_string()),
            _ => info.entries.push((key.into_owned(), value.to_string())),
        }
    }
    info
}

fn text_value(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::Integer(i) => Some(i.to_string()),
        Object::Real(r) => Some(r.to_string()),
        Object::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE or UTF-8 with a byte order mark,
/// otherwise PDFDocEncoding (read as Latin-1, which it matches for
/// printable characters).
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}

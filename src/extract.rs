//! Text extraction for ingested files.
//!
//! Turns a file on disk into the plain-text content stored on a document,
//! plus the `file_format` label recorded alongside it. Plain-text formats
//! (txt, md, csv) pass through unmodified; PDF and OOXML containers are
//! unpacked here. Extraction failures are reported, never panicked — the
//! caller decides whether to skip or abort.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to read {0}")]
    Io(String, #[source] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("file is not valid UTF-8: {0}")]
    Encoding(String),
}

/// Extracted file content plus the format label to record on the document.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub content: String,
    pub file_format: String,
}

/// Extract plain text from a file, dispatching on its extension.
pub fn extract_file(path: &Path) -> Result<Extracted, ExtractError> {
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if !matches!(
        format.as_str(),
        "txt" | "md" | "markdown" | "csv" | "pdf" | "docx" | "xlsx"
    ) {
        return Err(ExtractError::UnsupportedFormat(format));
    }

    let bytes = std::fs::read(path)
        .map_err(|e| ExtractError::Io(path.display().to_string(), e))?;

    let content = match format.as_str() {
        "pdf" => extract_pdf(&bytes)?,
        "docx" => extract_docx(&bytes)?,
        "xlsx" => extract_xlsx(&bytes)?,
        _ => String::from_utf8(bytes)
            .map_err(|_| ExtractError::Encoding(path.display().to_string()))?,
    };

    Ok(Extracted {
        content,
        file_format: if format == "markdown" {
            "md".to_string()
        } else {
            format
        },
    })
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Pull every `<w:t>` run out of `word/document.xml`.
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml")?;
    collect_t_elements(&xml, " ")
}

/// Pull the shared-string table out of an xlsx. Text cells reference this
/// table; inline numeric cells are not ingested.
fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, "xl/sharedStrings.xml")?;
    collect_t_elements(&xml, " ")
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{name}: {e}")))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {name} exceeds size limit ({MAX_XML_ENTRY_BYTES} bytes)"
        )));
    }
    Ok(out)
}

/// Concatenate the text content of every `<t>` element in an OOXML part.
fn collect_t_elements(xml: &[u8], separator: &str) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                let text = te.unescape().unwrap_or_default();
                if !text.is_empty() {
                    if !out.is_empty() {
                        out.push_str(separator);
                    }
                    out.push_str(&text);
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let err = extract_file(Path::new("/nonexistent/file.bin")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_invalid_zip_is_ooxml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip").unwrap();
        let err = extract_file(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn test_invalid_pdf_is_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let err = extract_file(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}

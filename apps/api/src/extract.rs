//! Best-effort plain-text extraction from uploaded CV documents.
//!
//! Never fails: anything unreadable yields an empty string, which the
//! handler reports back to the client.

use std::io::{Cursor, Read};

use bytes::Bytes;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};
use zip::ZipArchive;

const PDF_MAGIC: &[u8] = b"%PDF-";
const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const DOCX_BODY_PART: &str = "word/document.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
    Unsupported,
}

fn detect_kind(data: &[u8], content_type: Option<&str>, file_name: Option<&str>) -> DocumentKind {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    let extension = file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if data.starts_with(PDF_MAGIC) || content_type == "application/pdf" || extension == "pdf" {
        DocumentKind::Pdf
    } else if content_type == DOCX_CONTENT_TYPE || extension == "docx" {
        DocumentKind::Docx
    } else if content_type.starts_with("text/")
        || matches!(extension.as_str(), "txt" | "md" | "csv")
        || std::str::from_utf8(data).is_ok()
    {
        DocumentKind::PlainText
    } else {
        DocumentKind::Unsupported
    }
}

/// Extracts trimmed plain text from an uploaded document.
pub async fn extract_text(data: Bytes, content_type: Option<&str>, file_name: Option<&str>) -> String {
    if data.is_empty() {
        return String::new();
    }

    let kind = detect_kind(&data, content_type, file_name);
    debug!("Extracting text from {} byte document ({:?})", data.len(), kind);

    let text = match kind {
        DocumentKind::Pdf => extract_pdf(data).await,
        DocumentKind::Docx => extract_docx(data).await,
        DocumentKind::PlainText => String::from_utf8_lossy(&data).into_owned(),
        DocumentKind::Unsupported => {
            warn!(
                "Unsupported document type (content type: {:?}, file name: {:?})",
                content_type, file_name
            );
            String::new()
        }
    };

    text.trim().to_string()
}

/// PDF parsing is CPU-bound and may panic on malformed input, so it runs on
/// the blocking pool where a panic surfaces as a `JoinError`.
async fn extract_pdf(data: Bytes) -> String {
    let result = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&data).map_err(|e| e.to_string())
    })
    .await;

    match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("Error extracting text from PDF: {e}");
            String::new()
        }
        Err(e) => {
            warn!("PDF extraction task failed: {e}");
            String::new()
        }
    }
}

async fn extract_docx(data: Bytes) -> String {
    let result = tokio::task::spawn_blocking(move || docx_body_text(&data)).await;

    match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("Error extracting text from DOCX: {e}");
            String::new()
        }
        Err(e) => {
            warn!("DOCX extraction task failed: {e}");
            String::new()
        }
    }
}

/// Reads the main document part of a DOCX archive, one line per paragraph.
fn docx_body_text(data: &[u8]) -> Result<String, String> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| e.to_string())?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY_PART)
        .map_err(|e| e.to_string())?
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;

    let mut reader = Reader::from_str(&xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_run_text => {
                text.push_str(&t.unescape().map_err(|e| e.to_string())?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

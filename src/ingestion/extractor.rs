//! Page-level text extraction with provenance.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::providers::extraction::DocumentExtractor;
use crate::types::{FileType, PageText, SourceDocument};

/// Extracts per-page plain text from document bytes.
pub struct TextExtractor {
    pdf_timeout: Duration,
}

impl TextExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            pdf_timeout: Duration::from_secs(config.pdf_timeout_secs),
        }
    }

    fn extract_pdf(&self, name: &str, data: &[u8]) -> Result<(Vec<PageText>, Option<u32>)> {
        let total_pages = lopdf::Document::load_mem(data)
            .ok()
            .map(|doc| doc.get_pages().len() as u32);

        let raw = match self.extract_pdf_with_timeout(name, data) {
            Ok(text) => text,
            Err(e) => {
                warn!("primary PDF extraction failed for {}: {}", name, e);
                extract_pdf_fallback(name, data)?
            }
        };

        Ok((split_form_feed_pages(&raw), total_pages))
    }

    /// Run pdf-extract on its own thread so a pathological file cannot hang
    /// the pipeline; a crash in the extractor surfaces as a normal error.
    fn extract_pdf_with_timeout(&self, name: &str, data: &[u8]) -> Result<String> {
        let (tx, rx) = mpsc::channel();
        let bytes = data.to_vec();
        thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&bytes);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.pdf_timeout) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(Error::extraction(name, format!("PDF parsing failed: {e}"))),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::extraction(
                name,
                format!(
                    "PDF extraction timed out after {}s",
                    self.pdf_timeout.as_secs()
                ),
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::extraction(name, "PDF extraction crashed"))
            }
        }
    }
}

impl DocumentExtractor for TextExtractor {
    /// Pages without text are skipped silently, but surviving pages keep
    /// their true 1-based numbers; a document with no extractable text at
    /// all is an error naming the document.
    fn extract(&self, name: &str, data: &[u8]) -> Result<SourceDocument> {
        let file_type = FileType::from_name(name).ok_or_else(|| {
            let ext = std::path::Path::new(name)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown");
            Error::UnsupportedFileType(ext.to_string())
        })?;

        let (pages, total_pages) = match file_type {
            FileType::Pdf => self.extract_pdf(name, data)?,
            FileType::Text | FileType::Markdown => (extract_plain(data), None),
        };

        if pages.is_empty() {
            return Err(Error::extraction(name, "no text content could be extracted"));
        }
        debug!("extracted {} page(s) from {}", pages.len(), name);

        Ok(SourceDocument {
            name: name.to_string(),
            file_type,
            content_hash: hash_content(data),
            file_size: data.len() as u64,
            pages,
            total_pages,
        })
    }
}

/// Plain text and Markdown load as a single page 1.
fn extract_plain(data: &[u8]) -> Vec<PageText> {
    let text = String::from_utf8_lossy(data).replace('\0', "");
    if text.trim().is_empty() {
        return Vec::new();
    }
    vec![PageText::new(1, text)]
}

/// Structural fallback: pull text objects straight from the page tree.
fn extract_pdf_fallback(name: &str, data: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::extraction(name, format!("not a readable PDF: {e}")))?;

    let mut out = String::new();
    for (index, page_number) in doc.get_pages().keys().enumerate() {
        if index > 0 {
            out.push('\u{c}');
        }
        if let Ok(text) = doc.extract_text(&[*page_number]) {
            out.push_str(&text);
        }
    }
    if out.trim().is_empty() {
        return Err(Error::extraction(name, "no text content could be extracted"));
    }
    Ok(out)
}

/// Split raw extractor output into pages on form-feed markers, keeping true
/// 1-based numbers and dropping blank pages.
fn split_form_feed_pages(raw: &str) -> Vec<PageText> {
    raw.split('\u{c}')
        .enumerate()
        .filter_map(|(index, page)| {
            let cleaned = page.replace('\0', "");
            if cleaned.trim().is_empty() {
                None
            } else {
                Some(PageText::new(index as u32 + 1, cleaned))
            }
        })
        .collect()
}

/// Hex SHA-256 of the raw document bytes.
fn hash_content(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> TextExtractor {
        TextExtractor::new(&ExtractionConfig::default())
    }

    #[test]
    fn test_extract_text_file_as_single_page() {
        let document = extractor()
            .extract("notes.txt", b"hello\nworld")
            .unwrap();
        assert_eq!(document.file_type, FileType::Text);
        assert_eq!(document.pages.len(), 1);
        assert_eq!(document.pages[0].page_number, 1);
        assert_eq!(document.pages[0].text, "hello\nworld");
        assert_eq!(document.total_pages, None);
        assert_eq!(document.content_hash.len(), 64);
        assert_eq!(document.file_size, 11);
    }

    #[test]
    fn test_extract_markdown() {
        let document = extractor().extract("readme.md", b"# Title\nbody").unwrap();
        assert_eq!(document.file_type, FileType::Markdown);
        assert_eq!(document.pages.len(), 1);
    }

    #[test]
    fn test_empty_document_is_an_extraction_error() {
        let err = extractor().extract("blank.txt", b"   \n\t ").unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
        assert!(err.to_string().contains("blank.txt"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = extractor().extract("sheet.xlsx", b"data").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));
    }

    #[test]
    fn test_form_feed_split_keeps_true_page_numbers() {
        let pages = split_form_feed_pages("page one\u{c}  \n \u{c}page three");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].text, "page one");
        assert_eq!(pages[1].page_number, 3);
        assert_eq!(pages[1].text, "page three");
    }

    #[test]
    fn test_form_feed_split_all_blank() {
        assert!(split_form_feed_pages("\u{c} \u{c}\n").is_empty());
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_content(b"abc"), hash_content(b"abc"));
        assert_ne!(hash_content(b"abc"), hash_content(b"abd"));
    }

    #[test]
    fn test_corrupt_pdf_is_an_extraction_error() {
        let err = extractor()
            .extract("broken.pdf", b"definitely not a pdf")
            .unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }
}

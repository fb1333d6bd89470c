// Text extraction module
// Turns an uploaded PDF into a single ordered text stream


use std::panic::{self, AssertUnwindSafe};

use pdf_extract::{Document as PdfDocument, PlainTextOutput};
use tracing::{debug, warn};

use crate::{AskPdfError, Result};

const PDF_MAGIC: &[u8] = b"%PDF-";
/// The header may be preceded by a small amount of junk
const HEADER_SEARCH_WINDOW: usize = 1024;

/// An uploaded document as an ordered sequence of page texts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pages: Vec<String>,
}

impl Document {
    /// Build a document from already extracted pages. Pages without text
    /// contribute an empty string.
    #[inline]
    pub fn from_pages<I>(pages: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self {
            pages: pages.into_iter().map(Option::unwrap_or_default).collect(),
        }
    }

    /// Parse PDF bytes, extracting every page's text.
    ///
    /// A page that fails to extract (or makes the parser panic) is kept as an
    /// empty page. Input that is not a PDF, or a PDF that cannot be opened at
    /// all, is a [`AskPdfError::DocumentParse`].
    #[inline]
    pub fn from_pdf_bytes(bytes: &[u8]) -> Result<Self> {
        check_pdf_header(bytes)?;

        let mut document = PdfDocument::load_mem(bytes)
            .map_err(|e| AskPdfError::DocumentParse(format!("Failed to open PDF: {}", e)))?;

        if document.is_encrypted() {
            document.decrypt("").map_err(|e| {
                AskPdfError::DocumentParse(format!("PDF is encrypted and could not be decrypted: {}", e))
            })?;
        }

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        debug!("Extracting text from {} pages", page_numbers.len());

        let pages = page_numbers
            .into_iter()
            .map(|page_number| extract_page(&document, page_number));

        Ok(Self::from_pages(pages))
    }

    /// Parse PDF bytes on the blocking thread pool
    #[inline]
    pub async fn from_pdf(bytes: Vec<u8>) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::from_pdf_bytes(&bytes))
            .await
            .map_err(|e| AskPdfError::DocumentParse(format!("PDF extraction task failed: {}", e)))?
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    /// All page texts concatenated in page order, without separators
    #[inline]
    pub fn text(&self) -> String {
        self.pages.concat()
    }
}

/// Extract the full text of a PDF
#[inline]
pub async fn extract_text(bytes: Vec<u8>) -> Result<String> {
    let document = Document::from_pdf(bytes).await?;
    let text = document.text();

    if text.trim().is_empty() {
        warn!(
            "PDF with {} pages contains no extractable text, it may be image-based",
            document.page_count()
        );
    }

    Ok(text)
}

/// Reject input that does not carry a PDF header, without parsing it
#[inline]
pub fn check_pdf_header(bytes: &[u8]) -> Result<()> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    let found = window
        .windows(PDF_MAGIC.len())
        .any(|candidate| candidate == PDF_MAGIC);

    if found {
        Ok(())
    } else {
        Err(AskPdfError::DocumentParse(
            "input is not a PDF document".to_string(),
        ))
    }
}

fn extract_page(document: &PdfDocument, page_number: u32) -> Option<String> {
    let mut text = String::new();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut output = PlainTextOutput::new(&mut text);
        pdf_extract::output_doc_page(document, &mut output, page_number)
    }));

    match outcome {
        Ok(Ok(())) => Some(text),
        Ok(Err(e)) => {
            warn!("Failed to extract text from page {}: {}", page_number, e);
            None
        }
        Err(_) => {
            warn!("Text extraction panicked on page {}", page_number);
            None
        }
    }
}

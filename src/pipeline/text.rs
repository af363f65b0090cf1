//! Document text source: PDF bytes → ordered page texts.
//!
//! `pdf-extract` returns the whole text layer as one string with a form feed
//! (`\x0C`) between pages. Splitting on it keeps page numbering intact even
//! when some pages are blank; blank pages are simply omitted.
//!
//! Extraction is CPU-bound and some malformed PDFs make the parser panic, so
//! it runs inside `spawn_blocking`, where a panic surfaces as a `JoinError`
//! instead of tearing down the runtime.

use crate::error::PitchMatchError;
use crate::model::PageText;
use crate::pipeline::input::LoadedDocument;
use tracing::{debug, info};

const PAGE_BREAK: char = '\x0C';

/// Extract the text of every non-blank page.
///
/// # Errors
/// [`PitchMatchError::DocumentUnreadable`] when the PDF cannot be parsed or
/// no page carries any text (scanned decks without a text layer).
pub async fn extract_pages(doc: &LoadedDocument) -> Result<Vec<PageText>, PitchMatchError> {
    let bytes = doc.bytes.clone();
    let source_name = doc.source_name.clone();

    let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| PitchMatchError::DocumentUnreadable {
            source_name: source_name.clone(),
            detail: format!("text extraction aborted: {e}"),
        })?
        .map_err(|e| PitchMatchError::DocumentUnreadable {
            source_name: source_name.clone(),
            detail: e.to_string(),
        })?;

    let pages = split_pages(&raw);
    if pages.is_empty() {
        return Err(PitchMatchError::DocumentUnreadable {
            source_name,
            detail: "no page contains extractable text".into(),
        });
    }

    info!("Extracted text from {} pages of {}", pages.len(), doc.source_name);
    Ok(pages)
}

/// Split raw extracted text into numbered pages, dropping blank ones.
pub fn split_pages(raw: &str) -> Vec<PageText> {
    raw.split(PAGE_BREAK)
        .enumerate()
        .filter_map(|(idx, chunk)| {
            let text = chunk.trim();
            if text.is_empty() {
                debug!("Page {} has no text, skipping", idx + 1);
                None
            } else {
                Some(PageText {
                    page_number: idx + 1,
                    text: text.to_string(),
                })
            }
        })
        .collect()
}

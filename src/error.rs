//! Error types for the pitchdeck-matcher library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PitchMatchError`]: **Fatal** for the operation that returns it: the
//!   document cannot be read, no provider is configured, the fund store is
//!   down. Document-level variants are returned as `Err(PitchMatchError)` from
//!   [`crate::analyze::parse_pitch_deck`]; collaborator-level variants
//!   (fund store, semantic oracle) are absorbed by the matcher and logged.
//!
//! * [`PageError`]: **Non-fatal**: a single page's extraction failed
//!   (transient API error, unparseable reply) but all other pages are fine.
//!   Stored inside [`crate::model::PageExtraction`] so the consolidator can
//!   skip the page instead of losing the whole deck to one bad slide.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pitchdeck-matcher library.
#[derive(Debug, Error)]
pub enum PitchMatchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{source_name}'\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: [u8; 4] },

    /// The document exceeds the configured size limit.
    #[error("File '{source_name}' is too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge {
        source_name: String,
        size: u64,
        limit: u64,
    },

    // ── Document errors ───────────────────────────────────────────────────
    /// No text could be extracted from any page.
    #[error("No text content found in PDF '{source_name}': {detail}")]
    DocumentUnreadable { source_name: String, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The semantic-equivalence oracle could not produce a verdict.
    #[error("Semantic comparison unavailable for field '{field}': {detail}")]
    SemanticOracleUnavailable { field: String, detail: String },

    // ── Fund store errors ─────────────────────────────────────────────────
    /// The fund store is not configured or a fetch failed.
    #[error("Fund store unavailable: {reason}")]
    FundStoreUnavailable { reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output report file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::model::PageExtraction::error`]. Pages carrying one are
/// excluded from consolidation; the parse continues even when every page fails.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// LLM call failed after retries.
    #[error("Page {page}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        page: usize,
        retries: u8,
        detail: String,
    },

    /// The model replied, but not with a usable JSON object.
    #[error("Page {page}: failed to parse AI response: {detail}")]
    MalformedResponse { page: usize, detail: String },

    /// LLM call timed out.
    #[error("Page {page}: LLM call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl PageError {
    /// The 1-indexed page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::LlmFailed { page, .. }
            | PageError::MalformedResponse { page, .. }
            | PageError::Timeout { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fund_store_display() {
        let e = PitchMatchError::FundStoreUnavailable {
            reason: "AIRTABLE_API_KEY not set".into(),
        };
        assert!(e.to_string().contains("AIRTABLE_API_KEY"));
    }

    #[test]
    fn file_too_large_display() {
        let e = PitchMatchError::FileTooLarge {
            source_name: "deck.pdf".into(),
            size: 30,
            limit: 25,
        };
        let msg = e.to_string();
        assert!(msg.contains("deck.pdf"));
        assert!(msg.contains("limit 25"));
    }

    #[test]
    fn page_error_reports_page() {
        let e = PageError::Timeout { page: 7, secs: 60 };
        assert_eq!(e.page(), 7);
        assert!(e.to_string().contains("60s"));

        let e = PageError::MalformedResponse {
            page: 2,
            detail: "expected value".into(),
        };
        assert_eq!(e.page(), 2);
    }
}

//! Progress-callback trait for parse and match events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to observe a
//! run as it extracts each page and then evaluates each fund.
//!
//! # Example
//!
//! ```rust
//! use pitchdeck_matcher::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, fields_found: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}/{total_pages}: {fields_found} fields");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { pages: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes pages and funds.
///
/// All methods have default no-op implementations. With `concurrency > 1`
/// the page callbacks may fire from several tasks at once, so
/// implementations must be `Send + Sync`.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once the document's page texts are known.
    fn on_parse_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the extraction request is sent for a page.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page was extracted.
    ///
    /// `fields_found` counts the non-null fields in the page's reply.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, fields_found: usize) {
        let _ = (page_num, total_pages, fields_found);
    }

    /// Called when a page failed after all retries.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after consolidation, with how many pages were extracted.
    fn on_parse_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }

    /// Called after fund filtering, before the first comparison.
    fn on_matching_start(&self, funds_to_compare: usize) {
        let _ = funds_to_compare;
    }

    /// Called after each fund has been compared.
    fn on_fund_evaluated(&self, index: usize, total: usize, matched: bool) {
        let _ = (index, total, matched);
    }

    /// Called once ranking is finished.
    fn on_matching_complete(&self, matched: usize) {
        let _ = matched;
    }

    /// Called instead of the matching events when no fund is compared: the
    /// pitch has no usable fields or the fund store is unavailable.
    fn on_matching_skipped(&self, reason: &str) {
        let _ = reason;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        page_starts: AtomicUsize,
        page_completes: AtomicUsize,
        page_errors: AtomicUsize,
        funds_matched: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.page_starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _fields: usize) {
            self.page_completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.page_errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_fund_evaluated(&self, _index: usize, _total: usize, matched: bool) {
            if matched {
                self.funds_matched.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_parse_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 4);
        cb.on_page_error(2, 5, "some error");
        cb.on_parse_complete(5, 4);
        cb.on_matching_start(12);
        cb.on_fund_evaluated(1, 12, true);
        cb.on_matching_complete(1);
        cb.on_matching_skipped("no usable pitch fields");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_page_start(1, 2);
        tracker.on_page_complete(1, 2, 3);
        tracker.on_page_start(2, 2);
        tracker.on_page_error(2, 2, "timeout");
        tracker.on_fund_evaluated(1, 3, true);
        tracker.on_fund_evaluated(2, 3, false);
        tracker.on_fund_evaluated(3, 3, true);

        assert_eq!(tracker.page_starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.page_completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.page_errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.funds_matched.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_parse_start(10);
        cb.on_matching_complete(0);
    }
}

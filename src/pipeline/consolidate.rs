//! Page consolidation: many per-page extractions → one pitch record.
//!
//! Pitch decks restate facts as the story unfolds ("we raised a seed round"
//! on slide 3, "currently raising Series A" on slide 12). Two signals pick
//! the winner for each field:
//!
//! 1. a value mentioning "current" (case-insensitive), latest page first;
//! 2. otherwise the value from the highest page number.
//!
//! Values are only ever copied from a page, never synthesised.

use crate::model::{PageExtraction, PitchRecord, TrackedField};
use tracing::debug;

/// A non-null value seen on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate<'a> {
    value: &'a str,
    page_number: usize,
}

/// Merge per-page extractions into a single [`PitchRecord`].
///
/// Pages carrying an error marker contribute nothing. `pages_analyzed`
/// counts every input page, failed or not.
pub fn consolidate(pages: &[PageExtraction]) -> PitchRecord {
    let mut record = PitchRecord::empty(pages.len());

    for field in TrackedField::ALL {
        let candidates = collect_candidates(pages, field);
        if let Some(best) = select(&candidates) {
            debug!(
                "'{}': chose '{}' from page {}",
                field, best.value, best.page_number
            );
            record.set(field, best.value);
        }
    }

    record
}

fn collect_candidates(pages: &[PageExtraction], field: TrackedField) -> Vec<Candidate<'_>> {
    pages
        .iter()
        .filter(|p| p.is_ok())
        .filter_map(|p| {
            p.value(field)
                .filter(|v| !v.is_empty() && *v != "null")
                .map(|value| Candidate {
                    value,
                    page_number: p.page_number,
                })
        })
        .collect()
}

fn select<'a>(candidates: &[Candidate<'a>]) -> Option<Candidate<'a>> {
    let current = latest(
        candidates
            .iter()
            .filter(|c| c.value.to_lowercase().contains("current")),
    );
    current.or_else(|| latest(candidates.iter()))
}

/// Highest page number; on equal page numbers the first seen wins.
fn latest<'a, 'b>(iter: impl Iterator<Item = &'b Candidate<'a>>) -> Option<Candidate<'a>>
where
    'a: 'b,
{
    iter.fold(None, |best: Option<Candidate<'a>>, c| match best {
        Some(b) if b.page_number >= c.page_number => Some(b),
        _ => Some(*c),
    })
}

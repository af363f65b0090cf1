//! Field-quality filtering for pitch and fund records.
//!
//! Extraction models and fund researchers both write placeholders
//! ("Unknown", "N/A", "Stage agnostic") instead of leaving a field empty.
//! Such values are dropped from the pitch before comparison, and a fund whose
//! compared fields contain one is dropped entirely.

use crate::model::{FundRecord, MatchField, PitchRecord};
use tracing::debug;

/// Substrings marking a value as a placeholder. Matched against the
/// lower-cased, trimmed value without word boundaries.
const POOR_QUALITY_MARKERS: &[&str] = &[
    "not identified",
    "unknown",
    "not available",
    "no reliable",
    "not a fit",
    "location unknown",
    "stage unknown",
    "sector unknown",
    "n/a",
    "tbd",
    "stage agnostic",
    "no themes found",
    "not available(no reliable check size data found).",
];

/// Whether `value` is absent, blank, or a known placeholder.
pub fn is_poor_quality(value: Option<&str>) -> bool {
    let Some(value) = value else {
        return true;
    };
    let normalised = value.trim().to_lowercase();
    if normalised.is_empty() {
        return true;
    }
    POOR_QUALITY_MARKERS
        .iter()
        .any(|marker| normalised.contains(marker))
}

/// Anything the pitch filter can read matchable values from.
pub trait PitchFields {
    fn value(&self, field: MatchField) -> Option<&str>;
}

impl PitchFields for PitchRecord {
    fn value(&self, field: MatchField) -> Option<&str> {
        self.get(field.tracked())
    }
}

/// The pitch fields that survived filtering, in comparison order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredPitch {
    fields: Vec<(MatchField, String)>,
}

impl FilteredPitch {
    pub fn iter(&self) -> impl Iterator<Item = (MatchField, &str)> {
        self.fields.iter().map(|(f, v)| (*f, v.as_str()))
    }

    pub fn fields(&self) -> impl Iterator<Item = MatchField> + '_ {
        self.fields.iter().map(|(f, _)| *f)
    }

    pub fn contains(&self, field: MatchField) -> bool {
        self.fields.iter().any(|(f, _)| *f == field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PitchFields for FilteredPitch {
    fn value(&self, field: MatchField) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }
}

/// Keep the six matchable fields, removing absent and poor-quality ones.
pub fn filter_pitch_record(record: &impl PitchFields) -> FilteredPitch {
    let fields = MatchField::ALL
        .iter()
        .filter_map(|&field| {
            let value = record.value(field);
            if is_poor_quality(value) {
                debug!("Dropping pitch field {} ({:?})", field, value);
                None
            } else {
                value.map(|v| (field, v.to_string()))
            }
        })
        .collect();
    FilteredPitch { fields }
}

/// Drop every fund holding a populated poor-quality value in a compared field.
///
/// Fields the fund leaves empty do not disqualify it; a whitespace-only
/// cell is populated and poor.
pub fn filter_fund_records(funds: Vec<FundRecord>, pitch: &FilteredPitch) -> Vec<FundRecord> {
    let total = funds.len();
    let kept: Vec<FundRecord> = funds
        .into_iter()
        .filter(|fund| {
            let poor = pitch.fields().find_map(|field| {
                fund.values
                    .get(&field)
                    .filter(|v| !v.is_empty() && is_poor_quality(Some(v.as_str())))
                    .map(|v| (field, v))
            });
            if let Some((field, value)) = poor {
                debug!(
                    "Rejecting fund {}: poor-quality {} '{}'",
                    fund.label(),
                    field,
                    value
                );
            }
            poor.is_none()
        })
        .collect();
    debug!("Fund quality filter kept {}/{} funds", kept.len(), total);
    kept
}

//! Records flowing through the pipeline.
//!
//! ```text
//! PageText ──▶ PageExtraction ──▶ PitchRecord ──┐
//!  (text)        (one per page)    (consolidated) ├──▶ MatchResult ──▶ AnalysisReport
//!                                  FundRecord  ───┘
//! ```
//!
//! Every type here is plain data: serialisable, cloneable, and free of any
//! handle to a network client, so records can be built by hand in tests.

use crate::error::PageError;
use crate::matching::compare::FieldResolution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Fields ───────────────────────────────────────────────────────────────

/// The nine fields requested from the LLM for every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    CompanyName,
    CompanyWebsite,
    CompanyEmail,
    Sector,
    Location,
    Stage,
    CheckSize,
    Lead,
    InvestmentTheme,
}

impl TrackedField {
    pub const ALL: [TrackedField; 9] = [
        TrackedField::CompanyName,
        TrackedField::CompanyWebsite,
        TrackedField::CompanyEmail,
        TrackedField::Sector,
        TrackedField::Location,
        TrackedField::Stage,
        TrackedField::CheckSize,
        TrackedField::Lead,
        TrackedField::InvestmentTheme,
    ];

    /// JSON key used in LLM replies and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            TrackedField::CompanyName => "company_name",
            TrackedField::CompanyWebsite => "company_website",
            TrackedField::CompanyEmail => "company_email",
            TrackedField::Sector => "sector",
            TrackedField::Location => "location",
            TrackedField::Stage => "stage",
            TrackedField::CheckSize => "check_size",
            TrackedField::Lead => "lead",
            TrackedField::InvestmentTheme => "investment_theme",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == key)
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six fields a pitch is compared on against fund records.
///
/// Declaration order is the comparison order; the first mismatching field
/// ends evaluation of a fund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Stage,
    Sector,
    InvestmentTheme,
    Location,
    Lead,
    CheckSize,
}

impl MatchField {
    pub const ALL: [MatchField; 6] = [
        MatchField::Stage,
        MatchField::Sector,
        MatchField::InvestmentTheme,
        MatchField::Location,
        MatchField::Lead,
        MatchField::CheckSize,
    ];

    pub fn as_str(self) -> &'static str {
        self.tracked().as_str()
    }

    /// The extraction field carrying the same information.
    pub fn tracked(self) -> TrackedField {
        match self {
            MatchField::Stage => TrackedField::Stage,
            MatchField::Sector => TrackedField::Sector,
            MatchField::InvestmentTheme => TrackedField::InvestmentTheme,
            MatchField::Location => TrackedField::Location,
            MatchField::Lead => TrackedField::Lead,
            MatchField::CheckSize => TrackedField::CheckSize,
        }
    }
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Parsing side ─────────────────────────────────────────────────────────

/// Raw text of one PDF page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed page number in the source document.
    pub page_number: usize,
    pub text: String,
}

/// Result of running the extraction oracle on a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageExtraction {
    /// 1-indexed page number.
    pub page_number: usize,
    /// Extracted values; `None` where the model reported null.
    pub fields: BTreeMap<TrackedField, Option<String>>,
    /// Wall-clock time spent on this page.
    pub duration_ms: u64,
    /// Number of retry attempts used (0 = first attempt succeeded).
    pub retries: u8,
    /// Error marker, if the page failed. Failed pages are never consolidated.
    pub error: Option<PageError>,
}

impl PageExtraction {
    pub fn succeeded(page_number: usize, fields: BTreeMap<TrackedField, Option<String>>) -> Self {
        Self {
            page_number,
            fields,
            duration_ms: 0,
            retries: 0,
            error: None,
        }
    }

    pub fn failed(page_number: usize, error: PageError) -> Self {
        Self {
            page_number,
            fields: BTreeMap::new(),
            duration_ms: 0,
            retries: 0,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn value(&self, field: TrackedField) -> Option<&str> {
        self.fields.get(&field).and_then(|v| v.as_deref())
    }
}

/// Confidence label attached to every consolidated record.
pub const EXTRACTION_CONFIDENCE: &str = "high";

/// The consolidated, per-document pitch record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchRecord {
    #[serde(flatten)]
    pub fields: BTreeMap<TrackedField, Option<String>>,
    pub pages_analyzed: usize,
    pub extraction_confidence: String,
}

impl PitchRecord {
    /// A record with every tracked field set to null.
    pub fn empty(pages_analyzed: usize) -> Self {
        Self {
            fields: TrackedField::ALL.iter().map(|f| (*f, None)).collect(),
            pages_analyzed,
            extraction_confidence: EXTRACTION_CONFIDENCE.to_string(),
        }
    }

    pub fn get(&self, field: TrackedField) -> Option<&str> {
        self.fields.get(&field).and_then(|v| v.as_deref())
    }

    pub fn set(&mut self, field: TrackedField, value: impl Into<String>) {
        self.fields.insert(field, Some(value.into()));
    }

    /// Builder-style setter, mostly useful for tests and hand-built records.
    pub fn with(mut self, field: TrackedField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }
}

// ── Matching side ────────────────────────────────────────────────────────

/// One fund row as fetched from the fund store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundRecord {
    /// Opaque store identifier.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Populated matchable values.
    #[serde(default)]
    pub values: BTreeMap<MatchField, String>,
    /// Confidence label per field, as stored ("very high" … "very low").
    #[serde(default)]
    pub confidences: BTreeMap<MatchField, String>,
}

impl FundRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Builder-style setter for a value and its confidence label.
    pub fn with_field(
        mut self,
        field: MatchField,
        value: impl Into<String>,
        confidence: impl Into<String>,
    ) -> Self {
        self.values.insert(field, value.into());
        self.confidences.insert(field, confidence.into());
        self
    }

    /// The field value, if the fund has a non-blank one.
    pub fn value(&self, field: MatchField) -> Option<&str> {
        self.values
            .get(&field)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn confidence(&self, field: MatchField) -> Option<&str> {
        self.confidences.get(&field).map(String::as_str)
    }

    /// Short label for log lines: website when known, otherwise the id.
    pub fn label(&self) -> &str {
        self.website
            .as_deref()
            .filter(|w| !w.is_empty())
            .unwrap_or(&self.id)
    }
}

/// Coarse verbal bucket for a confidence rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchQuality {
    Excellent,
    Strong,
    Good,
    Fair,
    Poor,
}

impl MatchQuality {
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 80.0 {
            MatchQuality::Excellent
        } else if rate >= 60.0 {
            MatchQuality::Strong
        } else if rate >= 40.0 {
            MatchQuality::Good
        } else if rate >= 20.0 {
            MatchQuality::Fair
        } else {
            MatchQuality::Poor
        }
    }
}

impl fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchQuality::Excellent => "Excellent Match",
            MatchQuality::Strong => "Strong Match",
            MatchQuality::Good => "Good Match",
            MatchQuality::Fair => "Fair Match",
            MatchQuality::Poor => "Poor Match",
        };
        f.write_str(s)
    }
}

/// A fund that matched on every compared field, with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub fund: FundRecord,
    /// Weighted confidence, 0.0–100.0.
    pub confidence_rate: f64,
    pub match_quality: MatchQuality,
    /// Which comparator tier resolved each compared field.
    pub resolutions: BTreeMap<MatchField, FieldResolution>,
}

// ── Report ───────────────────────────────────────────────────────────────

/// Free-form metadata supplied alongside a document. Passed through only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormData {
    pub company_name: String,
    pub stage: String,
    pub funding_goal: String,
    pub continents: Vec<String>,
    pub countries: Vec<String>,
}

impl FormData {
    /// Parse a JSON array of strings, treating anything invalid as empty.
    pub fn parse_list(raw: &str) -> Vec<String> {
        if raw.trim().is_empty() {
            return Vec::new();
        }
        serde_json::from_str::<Vec<String>>(raw).unwrap_or_default()
    }
}

/// Full output of an analysis: the pitch record enriched with matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub pitch: PitchRecord,
    pub form_data: FormData,
    pub matching_funds: Vec<MatchResult>,
    /// Number of funds returned in `matching_funds`.
    pub funds_processed: usize,
    /// Set when matching could not run (as opposed to finding nothing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_error: Option<String>,
}

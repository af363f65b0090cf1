//! Two-tier field comparison: literal rule first, semantic oracle second.
//!
//! Every comparison ends in exactly one [`FieldResolution`]:
//!
//! ```text
//! fund value missing ─────────────────────────▶ FundValueMissing
//! literal rule holds ─────────────────────────▶ LiteralMatch
//! literal rule fails ──▶ oracle ──▶ MATCH     ▶ OracleMatch
//!                                ├─▶ NO_MATCH ▶ OracleNoMatch
//!                                └─▶ error    ▶ OracleUnavailable
//! ```
//!
//! Only `LiteralMatch` and `OracleMatch` count as a match; an unavailable
//! oracle never lets a field through.

use crate::matching::oracle::SemanticOracle;
use crate::model::MatchField;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which tier decided a single field comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldResolution {
    LiteralMatch,
    OracleMatch,
    OracleNoMatch,
    OracleUnavailable,
    FundValueMissing,
}

impl FieldResolution {
    pub fn is_match(self) -> bool {
        matches!(self, FieldResolution::LiteralMatch | FieldResolution::OracleMatch)
    }
}

/// The literal rule on lower-cased, trimmed values.
///
/// Holds when both are equal, or when the pitch value appears in the fund
/// value between `\b` word boundaries ("seed" in "seed (pre-seed to series
/// a)", but not "us" in "must"). The pitch value is regex-escaped, so a value
/// that starts or ends with a non-word character ("$1-5M") only matches by
/// equality or when a word character sits on the far side of the boundary.
pub fn literal_match(pitch_value: &str, fund_value: &str) -> bool {
    let pitch = pitch_value.trim().to_lowercase();
    let fund = fund_value.trim().to_lowercase();

    if pitch == fund {
        return true;
    }
    if pitch.is_empty() {
        return false;
    }

    let pattern = format!(r"\b{}\b", regex::escape(&pitch));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(&fund),
        Err(e) => {
            warn!("Could not build literal pattern for '{}': {}", pitch, e);
            false
        }
    }
}

/// Compare one pitch value with one fund value.
pub async fn fields_match(
    oracle: &dyn SemanticOracle,
    pitch_value: &str,
    fund_value: Option<&str>,
    field: MatchField,
) -> FieldResolution {
    let Some(fund_value) = fund_value else {
        debug!("{}: fund has no value", field);
        return FieldResolution::FundValueMissing;
    };

    if literal_match(pitch_value, fund_value) {
        debug!("{}: literal match '{}' ~ '{}'", field, pitch_value, fund_value);
        return FieldResolution::LiteralMatch;
    }

    match oracle.equivalent(pitch_value, fund_value, field).await {
        Ok(true) => {
            debug!("{}: semantic match '{}' ~ '{}'", field, pitch_value, fund_value);
            FieldResolution::OracleMatch
        }
        Ok(false) => {
            debug!("{}: no match '{}' vs '{}'", field, pitch_value, fund_value);
            FieldResolution::OracleNoMatch
        }
        Err(e) => {
            warn!("{}: semantic comparison failed, treating as no match: {}", field, e);
            FieldResolution::OracleUnavailable
        }
    }
}

//! Confidence Scorer: weighted sum of per-field confidence labels.
//!
//! | field            | weight |
//! |------------------|--------|
//! | investment_theme | 25     |
//! | stage            | 20     |
//! | check_size       | 20     |
//! | sector           | 15     |
//! | location         | 10     |
//! | lead             | 10     |
//!
//! Only fields present in the filtered pitch contribute. The sum is capped at
//! 100 and never renormalised by the number of compared fields.

use crate::matching::quality::FilteredPitch;
use crate::model::{FundRecord, MatchField};

pub const MAX_SCORE: f64 = 100.0;

pub fn field_weight(field: MatchField) -> f64 {
    match field {
        MatchField::Stage => 20.0,
        MatchField::CheckSize => 20.0,
        MatchField::InvestmentTheme => 25.0,
        MatchField::Sector => 15.0,
        MatchField::Location => 10.0,
        MatchField::Lead => 10.0,
    }
}

/// Numeric value of a stored confidence label; unknown or absent is 0.
pub fn confidence_value(label: Option<&str>) -> f64 {
    match label.map(|l| l.trim().to_lowercase()).as_deref() {
        Some("very high") => 1.0,
        Some("high") => 0.8,
        Some("medium") => 0.6,
        Some("low") => 0.4,
        Some("very low") => 0.2,
        _ => 0.0,
    }
}

/// Confidence rate for a fund that matched every field of `pitch`.
pub fn score(fund: &FundRecord, pitch: &FilteredPitch) -> f64 {
    let total: f64 = pitch
        .fields()
        .map(|field| field_weight(field) * confidence_value(fund.confidence(field)))
        .sum();
    total.min(MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::quality::filter_pitch_record;
    use crate::model::{PitchRecord, TrackedField};

    fn pitch(fields: &[(TrackedField, &str)]) -> FilteredPitch {
        let rec = fields
            .iter()
            .fold(PitchRecord::empty(1), |r, (f, v)| r.with(*f, *v));
        filter_pitch_record(&rec)
    }

    #[test]
    fn weights_sum_to_one_hundred() {
        let sum: f64 = MatchField::ALL.iter().map(|f| field_weight(*f)).sum();
        assert_eq!(sum, 100.0);
    }

    #[test]
    fn label_values() {
        assert_eq!(confidence_value(Some("very high")), 1.0);
        assert_eq!(confidence_value(Some("High")), 0.8);
        assert_eq!(confidence_value(Some(" medium ")), 0.6);
        assert_eq!(confidence_value(Some("low")), 0.4);
        assert_eq!(confidence_value(Some("very low")), 0.2);
        assert_eq!(confidence_value(Some("certain")), 0.0);
        assert_eq!(confidence_value(None), 0.0);
    }

    #[test]
    fn seed_fintech_scores_thirty_one() {
        let p = pitch(&[(TrackedField::Stage, "seed"), (TrackedField::Sector, "fintech")]);
        let fund = FundRecord::new("f")
            .with_field(MatchField::Stage, "Seed (pre-seed to series A)", "high")
            .with_field(MatchField::Sector, "FinTech", "very high");
        assert!((score(&fund, &p) - 31.0).abs() < 1e-9);
    }

    #[test]
    fn uncompared_fields_do_not_count() {
        let p = pitch(&[(TrackedField::Stage, "seed")]);
        let fund = FundRecord::new("f")
            .with_field(MatchField::Stage, "Seed", "very high")
            .with_field(MatchField::InvestmentTheme, "AI", "very high");
        assert_eq!(score(&fund, &p), 20.0);
    }

    #[test]
    fn full_confidence_on_every_field_is_one_hundred() {
        let p = pitch(&[
            (TrackedField::Stage, "Seed"),
            (TrackedField::Sector, "AI"),
            (TrackedField::InvestmentTheme, "Climate"),
            (TrackedField::Location, "Berlin"),
            (TrackedField::Lead, "Lead"),
            (TrackedField::CheckSize, "$2M"),
        ]);
        let fund = MatchField::ALL
            .iter()
            .fold(FundRecord::new("f"), |f, field| f.with_field(*field, "x", "very high"));
        let s = score(&fund, &p);
        assert_eq!(s, 100.0);
        assert!((0.0..=MAX_SCORE).contains(&s));
    }

    #[test]
    fn missing_confidences_score_zero() {
        let p = pitch(&[(TrackedField::Sector, "AI")]);
        let mut fund = FundRecord::new("f");
        fund.values.insert(MatchField::Sector, "AI".into());
        assert_eq!(score(&fund, &p), 0.0);
    }
}

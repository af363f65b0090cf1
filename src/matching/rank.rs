//! Match Ranker: from a pitch record to a ranked list of fully-matching funds.
//!
//! ```text
//! PitchRecord ─▶ filter pitch ─▶ fetch funds ─▶ filter funds
//!                                                   │
//!        ranked ◀─ sort desc ◀─ score ◀─ compare every field (short-circuit)
//! ```
//!
//! A fund is kept only when every field of the filtered pitch matches. The
//! first non-matching field ends evaluation of that fund, so later fields
//! never reach the semantic oracle.

use crate::matching::compare::{fields_match, FieldResolution};
use crate::matching::oracle::SemanticOracle;
use crate::matching::quality::{filter_fund_records, filter_pitch_record, FilteredPitch};
use crate::matching::score::score;
use crate::matching::store::FundStore;
use crate::model::{FundRecord, MatchField, MatchQuality, MatchResult, PitchRecord};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a ranking run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchStatus {
    /// Funds were fetched and compared (possibly none matched).
    Completed {
        funds_fetched: usize,
        funds_retained: usize,
    },
    /// The fund store could not be read; no comparison took place.
    FundStoreUnavailable { reason: String },
}

/// Ranked matches plus how the run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RankOutcome {
    pub matches: Vec<MatchResult>,
    pub status: MatchStatus,
}

/// Compares a pitch against every fund from a [`FundStore`].
pub struct FundMatcher {
    store: Arc<dyn FundStore>,
    oracle: Arc<dyn SemanticOracle>,
    progress: Option<ProgressCallback>,
}

impl FundMatcher {
    pub fn new(store: Arc<dyn FundStore>, oracle: Arc<dyn SemanticOracle>) -> Self {
        Self {
            store,
            oracle,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Top `top_n` matches, best first. Never fails: an unreachable store
    /// yields an empty list.
    pub async fn rank(&self, pitch: &PitchRecord, top_n: usize) -> Vec<MatchResult> {
        self.rank_with_status(pitch, top_n).await.matches
    }

    /// Like [`rank`](Self::rank), but also reports whether the store was read.
    pub async fn rank_with_status(&self, pitch: &PitchRecord, top_n: usize) -> RankOutcome {
        let filtered = filter_pitch_record(pitch);
        if filtered.is_empty() {
            info!("No usable pitch fields to compare; skipping fund matching");
            if let Some(cb) = &self.progress {
                cb.on_matching_skipped("no usable pitch fields");
            }
            return RankOutcome {
                matches: Vec::new(),
                status: MatchStatus::Completed {
                    funds_fetched: 0,
                    funds_retained: 0,
                },
            };
        }
        info!(
            "Matching on {} fields: {:?}",
            filtered.len(),
            filtered.fields().map(MatchField::as_str).collect::<Vec<_>>()
        );

        let funds = match self.store.fetch_all().await {
            Ok(funds) => funds,
            Err(e) => {
                warn!("Fund matching skipped: {}", e);
                if let Some(cb) = &self.progress {
                    cb.on_matching_skipped(&e.to_string());
                }
                return RankOutcome {
                    matches: Vec::new(),
                    status: MatchStatus::FundStoreUnavailable {
                        reason: e.to_string(),
                    },
                };
            }
        };
        let funds_fetched = funds.len();

        let retained = filter_fund_records(funds, &filtered);
        let funds_retained = retained.len();
        info!("{} of {} funds passed the quality filter", funds_retained, funds_fetched);

        let mut matches = self.match_funds(&filtered, retained).await;
        matches.truncate(top_n);

        RankOutcome {
            matches,
            status: MatchStatus::Completed {
                funds_fetched,
                funds_retained,
            },
        }
    }

    /// Compare and score `funds`, returning every full match sorted by
    /// descending confidence. Ties keep the input order.
    pub async fn match_funds(&self, pitch: &FilteredPitch, funds: Vec<FundRecord>) -> Vec<MatchResult> {
        let total = funds.len();
        if let Some(cb) = &self.progress {
            cb.on_matching_start(total);
        }

        let mut matches = Vec::new();
        for (index, fund) in funds.into_iter().enumerate() {
            let resolutions = self.evaluate(&fund, pitch).await;
            let matched = resolutions.is_some();
            if let Some(cb) = &self.progress {
                cb.on_fund_evaluated(index + 1, total, matched);
            }

            if let Some(resolutions) = resolutions {
                let confidence_rate = score(&fund, pitch);
                debug!("Fund {} matched, confidence {:.1}%", fund.label(), confidence_rate);
                matches.push(MatchResult {
                    match_quality: MatchQuality::from_rate(confidence_rate),
                    fund,
                    confidence_rate,
                    resolutions,
                });
            }
        }

        matches.sort_by(|a, b| b.confidence_rate.total_cmp(&a.confidence_rate));

        info!("{} of {} funds fully matched", matches.len(), total);
        if let Some(cb) = &self.progress {
            cb.on_matching_complete(matches.len());
        }
        matches
    }

    /// `Some(resolutions)` when every compared field matched.
    async fn evaluate(
        &self,
        fund: &FundRecord,
        pitch: &FilteredPitch,
    ) -> Option<BTreeMap<MatchField, FieldResolution>> {
        if pitch.is_empty() {
            return None;
        }
        let mut resolutions = BTreeMap::new();
        for (field, pitch_value) in pitch.iter() {
            let resolution =
                fields_match(self.oracle.as_ref(), pitch_value, fund.value(field), field).await;
            if !resolution.is_match() {
                debug!("Fund {} rejected on {} ({:?})", fund.label(), field, resolution);
                return None;
            }
            resolutions.insert(field, resolution);
        }
        Some(resolutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PitchMatchError;
    use crate::model::TrackedField;
    use crate::progress::PipelineProgressCallback;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Funds(Vec<FundRecord>);

    #[async_trait]
    impl FundStore for Funds {
        async fn fetch_all(&self) -> Result<Vec<FundRecord>, PitchMatchError> {
            Ok(self.0.clone())
        }
    }

    struct DownStore;

    #[async_trait]
    impl FundStore for DownStore {
        async fn fetch_all(&self) -> Result<Vec<FundRecord>, PitchMatchError> {
            Err(PitchMatchError::FundStoreUnavailable {
                reason: "connection refused".into(),
            })
        }
    }

    /// Says MATCH for the listed (pitch, fund) pairs and records every call.
    #[derive(Default)]
    struct PairOracle {
        pairs: Vec<(&'static str, &'static str)>,
        calls: Mutex<Vec<MatchField>>,
    }

    #[async_trait]
    impl SemanticOracle for PairOracle {
        async fn equivalent(
            &self,
            pitch_value: &str,
            fund_value: &str,
            field: MatchField,
        ) -> Result<bool, PitchMatchError> {
            self.calls.lock().unwrap().push(field);
            Ok(self
                .pairs
                .iter()
                .any(|(p, f)| *p == pitch_value && *f == fund_value))
        }
    }

    fn matcher(funds: Vec<FundRecord>, oracle: PairOracle) -> (FundMatcher, Arc<PairOracle>) {
        let oracle = Arc::new(oracle);
        (FundMatcher::new(Arc::new(Funds(funds)), oracle.clone()), oracle)
    }

    fn seed_fintech() -> PitchRecord {
        PitchRecord::empty(3)
            .with(TrackedField::Stage, "seed")
            .with(TrackedField::Sector, "fintech")
    }

    #[tokio::test]
    async fn scores_and_orders_full_matches() {
        let funds = vec![
            FundRecord::new("low")
                .with_field(MatchField::Stage, "Seed", "low")
                .with_field(MatchField::Sector, "FinTech", "low"),
            FundRecord::new("high")
                .with_field(MatchField::Stage, "Seed (pre-seed to series A)", "high")
                .with_field(MatchField::Sector, "FinTech", "very high"),
            FundRecord::new("miss")
                .with_field(MatchField::Stage, "Series B", "very high")
                .with_field(MatchField::Sector, "FinTech", "very high"),
        ];
        let (m, _) = matcher(funds, PairOracle::default());
        let ranked = m.rank(&seed_fintech(), 10).await;

        let ids: Vec<_> = ranked.iter().map(|r| r.fund.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
        assert!((ranked[0].confidence_rate - 31.0).abs() < 1e-9);
        assert_eq!(ranked[0].match_quality, MatchQuality::Fair);
        assert_eq!(
            ranked[0].resolutions[&MatchField::Stage],
            FieldResolution::LiteralMatch
        );
    }

    #[tokio::test]
    async fn first_mismatch_short_circuits() {
        let funds = vec![FundRecord::new("f")
            .with_field(MatchField::Stage, "Growth", "high")
            .with_field(MatchField::Sector, "Healthcare", "high")];
        let (m, oracle) = matcher(funds, PairOracle::default());
        assert!(m.rank(&seed_fintech(), 10).await.is_empty());
        assert_eq!(*oracle.calls.lock().unwrap(), vec![MatchField::Stage]);
    }

    #[tokio::test]
    async fn oracle_match_counts() {
        let funds = vec![FundRecord::new("f")
            .with_field(MatchField::Stage, "Seed", "high")
            .with_field(MatchField::Sector, "Financial services", "medium")];
        let oracle = PairOracle {
            pairs: vec![("fintech", "Financial services")],
            ..Default::default()
        };
        let (m, _) = matcher(funds, oracle);
        let ranked = m.rank(&seed_fintech(), 10).await;
        assert_eq!(ranked.len(), 1);
        assert_eq!(
            ranked[0].resolutions[&MatchField::Sector],
            FieldResolution::OracleMatch
        );
    }

    #[tokio::test]
    async fn fund_missing_a_compared_field_is_rejected() {
        let funds = vec![FundRecord::new("f").with_field(MatchField::Stage, "Seed", "high")];
        let (m, oracle) = matcher(funds, PairOracle::default());
        assert!(m.rank(&seed_fintech(), 10).await.is_empty());
        assert!(oracle.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ties_keep_fetch_order_and_truncate() {
        let funds: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|id| {
                FundRecord::new(*id)
                    .with_field(MatchField::Stage, "seed", "high")
                    .with_field(MatchField::Sector, "fintech", "high")
            })
            .collect();
        let (m, _) = matcher(funds, PairOracle::default());
        let ranked = m.rank(&seed_fintech(), 2).await;
        let ids: Vec<_> = ranked.iter().map(|r| r.fund.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn skipped_matching_is_signalled() {
        #[derive(Default)]
        struct Events(Mutex<Vec<String>>);
        impl PipelineProgressCallback for Events {
            fn on_matching_skipped(&self, reason: &str) {
                self.0.lock().unwrap().push(reason.to_string());
            }
            fn on_matching_complete(&self, _matched: usize) {
                self.0.lock().unwrap().push("complete".into());
            }
        }

        let events = Arc::new(Events::default());
        let empty = FundMatcher::new(Arc::new(Funds(Vec::new())), Arc::new(PairOracle::default()))
            .with_progress(Some(events.clone() as ProgressCallback));
        empty.rank(&PitchRecord::empty(1), 10).await;

        let down = FundMatcher::new(Arc::new(DownStore), Arc::new(PairOracle::default()))
            .with_progress(Some(events.clone() as ProgressCallback));
        down.rank(&seed_fintech(), 10).await;

        let seen = events.0.lock().unwrap().clone();
        assert_eq!(seen.len(), 2, "{seen:?}");
        assert_eq!(seen[0], "no usable pitch fields");
        assert!(seen[1].contains("connection refused"));
    }

    #[tokio::test]
    async fn no_usable_pitch_fields_means_no_matches() {
        let pitch = PitchRecord::empty(1).with(TrackedField::Location, "unknown");
        let funds = vec![FundRecord::new("f").with_field(MatchField::Location, "Berlin", "high")];
        let (m, _) = matcher(funds, PairOracle::default());
        let outcome = m.rank_with_status(&pitch, 10).await;
        assert!(outcome.matches.is_empty());
        assert!(matches!(outcome.status, MatchStatus::Completed { .. }));
    }

    #[tokio::test]
    async fn unavailable_store_reports_status() {
        let m = FundMatcher::new(Arc::new(DownStore), Arc::new(PairOracle::default()));
        let outcome = m.rank_with_status(&seed_fintech(), 10).await;
        assert!(outcome.matches.is_empty());
        match outcome.status {
            MatchStatus::FundStoreUnavailable { reason } => {
                assert!(reason.contains("connection refused"))
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_counts_filtered_funds() {
        let funds = vec![
            FundRecord::new("ok")
                .with_field(MatchField::Stage, "Seed", "high")
                .with_field(MatchField::Sector, "FinTech", "high"),
            FundRecord::new("poor")
                .with_field(MatchField::Stage, "Seed", "high")
                .with_field(MatchField::Sector, "Sector Unknown", "high"),
        ];
        let (m, _) = matcher(funds, PairOracle::default());
        let outcome = m.rank_with_status(&seed_fintech(), 10).await;
        assert_eq!(
            outcome.status,
            MatchStatus::Completed {
                funds_fetched: 2,
                funds_retained: 1
            }
        );
        assert_eq!(outcome.matches.len(), 1);
    }
}

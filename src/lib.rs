//! # pitchdeck-matcher
//!
//! Read a startup's pitch-deck PDF, extract its investment profile with an
//! LLM, and rank the funds in a fund database that fit it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input        resolve local file or download from URL, check %PDF magic
//!  ├─ 2. Text         split the text layer into pages (spawn_blocking)
//!  ├─ 3. Extract      one LLM call per page → nine fields or an error marker
//!  ├─ 4. Consolidate  one value per field: "current" mentions, then latest page
//!  ├─ 5. Filter       drop placeholder values ("unknown", "n/a", …)
//!  ├─ 6. Compare      literal word match, else semantic MATCH / NO_MATCH
//!  ├─ 7. Score        weighted sum of the fund's confidence labels
//!  └─ 8. Rank         full matches only, best first, top N
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pitchdeck_matcher::{analyze, FormData, FundStoreConfig, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = PipelineConfig::builder()
//!         .fund_store(FundStoreConfig::from_env())
//!         .build()?;
//!     let report = analyze("deck.pdf", FormData::default(), &config).await?;
//!     for m in &report.matching_funds {
//!         println!("{:5.1}%  {}", m.confidence_rate, m.fund.label());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pitchmatch` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pitchdeck-matcher = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod matching;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{
    analyze, analyze_with_store, build_report, parse_document, parse_pitch_deck, write_report,
};
pub use config::{FundStoreConfig, PipelineConfig, PipelineConfigBuilder};
pub use error::{PageError, PitchMatchError};
pub use matching::compare::{fields_match, literal_match, FieldResolution};
pub use matching::oracle::{LlmSemanticOracle, SemanticOracle};
pub use matching::quality::{filter_fund_records, filter_pitch_record, is_poor_quality, FilteredPitch};
pub use matching::rank::{FundMatcher, MatchStatus, RankOutcome};
pub use matching::score::score;
pub use matching::store::{AirtableFundStore, FundStore, JsonFileFundStore};
pub use model::{
    AnalysisReport, FormData, FundRecord, MatchField, MatchQuality, MatchResult, PageExtraction,
    PageText, PitchRecord, TrackedField,
};
pub use pipeline::consolidate::consolidate;
pub use pipeline::llm::{ExtractionOracle, LlmExtractionOracle};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};

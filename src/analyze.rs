//! End-to-end entry points: parse a deck, then match it against funds.
//!
//! [`parse_pitch_deck`] stops after consolidation; [`analyze`] adds fund
//! matching and returns the full [`AnalysisReport`]. Both build their LLM
//! collaborators from [`PipelineConfig`]; [`parse_document`] and
//! [`build_report`] take them injected instead.

use crate::config::PipelineConfig;
use crate::error::PitchMatchError;
use crate::matching::oracle::LlmSemanticOracle;
use crate::matching::rank::{FundMatcher, MatchStatus};
use crate::matching::store::{AirtableFundStore, FundStore};
use crate::model::{AnalysisReport, FormData, PageExtraction, PageText, PitchRecord};
use crate::pipeline::consolidate::consolidate;
use crate::pipeline::input::{self, LoadedDocument};
use crate::pipeline::llm::{fields_found, ExtractionOracle, LlmExtractionOracle};
use crate::pipeline::text;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Parse a pitch deck (local path or URL) into a consolidated record.
///
/// # Errors
/// Only document-level failures: unreadable input or no provider. Page
/// failures are logged and skipped; if every page fails the record is empty.
pub async fn parse_pitch_deck(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<PitchRecord, PitchMatchError> {
    let input_str = input_str.as_ref();
    info!("Parsing pitch deck: {}", input_str);

    let doc =
        input::resolve_input(input_str, config.download_timeout_secs, config.max_file_bytes)
            .await?;
    let provider = resolve_provider(config).await?;
    let extractor = LlmExtractionOracle::new(provider, config);
    parse_document(&doc, &extractor, config).await
}

/// Parse an already-loaded document with the given extraction oracle.
pub async fn parse_document(
    doc: &LoadedDocument,
    extractor: &dyn ExtractionOracle,
    config: &PipelineConfig,
) -> Result<PitchRecord, PitchMatchError> {
    let start = Instant::now();
    input::validate_document(doc, config.max_file_bytes)?;

    let pages = text::extract_pages(doc).await?;
    info!("{}: {} pages with text", doc.source_name, pages.len());

    let extractions = extract_all(extractor, &pages, config).await;
    let succeeded = extractions.iter().filter(|e| e.is_ok()).count();

    let record = consolidate(&extractions);
    if let Some(ref cb) = config.progress_callback {
        cb.on_parse_complete(extractions.len(), succeeded);
    }
    if succeeded == 0 {
        let first_error = extractions
            .iter()
            .find_map(|e| e.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(
            "{}: all {} pages failed extraction, record is empty. First error: {}",
            doc.source_name,
            extractions.len(),
            first_error
        );
    }
    info!(
        "Parsed {}/{} pages in {}ms",
        succeeded,
        extractions.len(),
        start.elapsed().as_millis()
    );
    Ok(record)
}

/// Run the extraction oracle over every page.
///
/// Up to `config.concurrency` pages are in flight at once; the result is
/// always in ascending page order.
pub async fn extract_all(
    extractor: &dyn ExtractionOracle,
    pages: &[PageText],
    config: &PipelineConfig,
) -> Vec<PageExtraction> {
    let total_pages = pages.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_parse_start(total_pages);
    }

    let mut results: Vec<PageExtraction> = stream::iter(pages.iter().map(|page| async move {
        let page_num = page.page_number;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, total_pages);
        }
        let result = extractor.extract(page).await;
        match &result.error {
            None => {
                debug!("Page {}: {} fields found", page_num, fields_found(&result));
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_complete(page_num, total_pages, fields_found(&result));
                }
            }
            Some(e) => {
                warn!("{}", e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(page_num, total_pages, &e.to_string());
                }
            }
        }
        result
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    results.sort_by_key(|r| r.page_number);
    results
}

/// Parse a deck and match it against the Airtable fund store from
/// `config.fund_store`.
pub async fn analyze(
    input_str: impl AsRef<str>,
    form_data: FormData,
    config: &PipelineConfig,
) -> Result<AnalysisReport, PitchMatchError> {
    let store = AirtableFundStore::new(config.fund_store.clone())?
        .with_retry(config.max_retries, config.retry_backoff_ms);
    analyze_with_store(input_str, form_data, Arc::new(store), config).await
}

/// Like [`analyze`], with a caller-supplied fund store.
pub async fn analyze_with_store(
    input_str: impl AsRef<str>,
    form_data: FormData,
    store: Arc<dyn FundStore>,
    config: &PipelineConfig,
) -> Result<AnalysisReport, PitchMatchError> {
    let input_str = input_str.as_ref();
    let doc =
        input::resolve_input(input_str, config.download_timeout_secs, config.max_file_bytes)
            .await?;
    let provider = resolve_provider(config).await?;

    let extractor = LlmExtractionOracle::new(Arc::clone(&provider), config);
    let pitch = parse_document(&doc, &extractor, config).await?;

    let oracle = LlmSemanticOracle::new(provider, config);
    let matcher = FundMatcher::new(store, Arc::new(oracle))
        .with_progress(config.progress_callback.clone());
    Ok(build_report(pitch, form_data, &matcher, config.top_n).await)
}

/// Match `pitch` and assemble the report.
///
/// A store failure is reported through `matching_error`, never as `Err`.
pub async fn build_report(
    pitch: PitchRecord,
    form_data: FormData,
    matcher: &FundMatcher,
    top_n: usize,
) -> AnalysisReport {
    let outcome = matcher.rank_with_status(&pitch, top_n).await;
    let matching_error = match outcome.status {
        MatchStatus::FundStoreUnavailable { reason } => Some(reason),
        MatchStatus::Completed { .. } => None,
    };
    AnalysisReport {
        funds_processed: outcome.matches.len(),
        matching_funds: outcome.matches,
        pitch,
        form_data,
        matching_error,
    }
}

/// Write a report as pretty JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_report(
    report: &AnalysisReport,
    output_path: impl AsRef<Path>,
) -> Result<(), PitchMatchError> {
    let path = output_path.as_ref();
    let write_err = |source: std::io::Error| PitchMatchError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string_pretty(report)
        .map_err(|e| PitchMatchError::Internal(format!("report serialisation: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PitchMatchError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PitchMatchError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is;
/// 2. `config.provider_name` with `config.model`;
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set;
/// 4. OpenAI when `OPENAI_API_KEY` is set;
/// 5. whatever `ProviderFactory::from_env` detects.
pub async fn resolve_provider(
    config: &PipelineConfig,
) -> Result<Arc<dyn LLMProvider>, PitchMatchError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", config.model_or_default());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PitchMatchError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

//! Page extraction: send one page's text to the LLM, get nine fields back.
//!
//! All prompt text lives in [`crate::prompts`]; this module owns transport
//! concerns only: timeout, retry with backoff, and recovering a JSON object
//! from a chatty reply.
//!
//! ## Retry Strategy
//!
//! Provider errors and timeouts are retried `max_retries` times with
//! exponential backoff (`retry_backoff_ms * 2^attempt`). A reply that arrives
//! but cannot be parsed is *not* retried: it is recorded as
//! [`PageError::MalformedResponse`] and the page is skipped during
//! consolidation.

use crate::config::PipelineConfig;
use crate::error::PageError;
use crate::model::{PageExtraction, PageText, TrackedField};
use crate::prompts::{extraction_user_prompt, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Turns one page of text into a [`PageExtraction`].
///
/// Implementations never fail the whole run: every problem is reported via
/// [`PageExtraction::error`].
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    async fn extract(&self, page: &PageText) -> PageExtraction;
}

// ── Shared chat transport ────────────────────────────────────────────────

/// Timeout and retry settings for one logical LLM call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
}

impl RetryPolicy {
    pub(crate) fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

/// Why a chat call produced no reply after all attempts.
#[derive(Debug, Clone)]
pub(crate) enum ChatFailure {
    Timeout { secs: u64 },
    Api(String),
}

impl std::fmt::Display for ChatFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatFailure::Timeout { secs } => write!(f, "timed out after {secs}s"),
            ChatFailure::Api(msg) => f.write_str(msg),
        }
    }
}

/// Delay before retry `attempt` (1-based): `base_ms`, doubling each time.
pub(crate) fn backoff_delay(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Retry count as stored on a [`PageExtraction`].
fn retries_u8(n: u32) -> u8 {
    u8::try_from(n).unwrap_or(u8::MAX)
}

/// Send `messages`, retrying on provider errors and timeouts.
///
/// Returns the reply content and the number of retries used.
pub(crate) async fn chat_with_retry(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    options: &CompletionOptions,
    policy: RetryPolicy,
    label: &str,
) -> Result<(String, u32), ChatFailure> {
    let mut last_err = ChatFailure::Api("no attempt made".to_string());

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay(policy.backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label, attempt, policy.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let call = provider.chat(messages, Some(options));
        match timeout(Duration::from_secs(policy.timeout_secs), call).await {
            Ok(Ok(response)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    label, response.prompt_tokens, response.completion_tokens
                );
                return Ok((response.content, attempt));
            }
            Ok(Err(e)) => {
                let msg = e.to_string();
                warn!("{}: attempt {} failed: {}", label, attempt + 1, msg);
                last_err = ChatFailure::Api(msg);
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {}s",
                    label,
                    attempt + 1,
                    policy.timeout_secs
                );
                last_err = ChatFailure::Timeout {
                    secs: policy.timeout_secs,
                };
            }
        }
    }

    Err(last_err)
}

// ── LLM-backed extraction ────────────────────────────────────────────────

/// [`ExtractionOracle`] backed by an `edgequake-llm` provider.
pub struct LlmExtractionOracle {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
    policy: RetryPolicy,
}

impl LlmExtractionOracle {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            policy: RetryPolicy::from_config(config),
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ExtractionOracle for LlmExtractionOracle {
    async fn extract(&self, page: &PageText) -> PageExtraction {
        let start = Instant::now();
        let page_num = page.page_number;
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(extraction_user_prompt(page_num, &page.text).as_str()),
        ];

        let label = format!("Page {page_num}");
        let reply =
            chat_with_retry(&self.provider, &messages, &self.options(), self.policy, &label).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut extraction = match reply {
            Ok((content, retries)) => {
                let mut ex = match parse_extraction_response(page_num, &content) {
                    Ok(fields) => PageExtraction::succeeded(page_num, fields),
                    Err(e) => {
                        warn!("{}", e);
                        PageExtraction::failed(page_num, e)
                    }
                };
                ex.retries = retries_u8(retries);
                ex
            }
            Err(ChatFailure::Timeout { secs }) => {
                let mut ex = PageExtraction::failed(page_num, PageError::Timeout { page: page_num, secs });
                ex.retries = retries_u8(self.policy.max_retries);
                ex
            }
            Err(ChatFailure::Api(detail)) => {
                let mut ex = PageExtraction::failed(
                    page_num,
                    PageError::LlmFailed {
                        page: page_num,
                        retries: retries_u8(self.policy.max_retries),
                        detail,
                    },
                );
                ex.retries = retries_u8(self.policy.max_retries);
                ex
            }
        };
        extraction.duration_ms = duration_ms;
        extraction
    }
}

// ── Response parsing ─────────────────────────────────────────────────────

static RE_JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Parse a model reply into the nine tracked fields.
///
/// The whole reply is tried as JSON first; failing that, the outermost
/// `{…}` span (which also strips code fences and prose around it). Keys
/// other than the tracked fields are ignored; missing keys become null.
pub fn parse_extraction_response(
    page: usize,
    content: &str,
) -> Result<BTreeMap<TrackedField, Option<String>>, PageError> {
    let malformed = |detail: String| PageError::MalformedResponse { page, detail };

    let value: Value = match serde_json::from_str(content.trim()) {
        Ok(v) => v,
        Err(first) => {
            let span = RE_JSON_OBJECT
                .find(content)
                .ok_or_else(|| malformed(format!("no JSON object in reply: {first}")))?;
            serde_json::from_str(span.as_str()).map_err(|e| malformed(e.to_string()))?
        }
    };

    let obj = match value {
        Value::Object(map) => map,
        other => return Err(malformed(format!("expected a JSON object, got {other}"))),
    };

    if let Some(err) = obj.get("error") {
        return Err(malformed(format!("model reported an error: {err}")));
    }

    Ok(fields_from_object(&obj))
}

fn fields_from_object(obj: &Map<String, Value>) -> BTreeMap<TrackedField, Option<String>> {
    TrackedField::ALL
        .iter()
        .map(|f| (*f, obj.get(f.as_str()).and_then(value_to_string)))
        .collect()
}

/// Flatten a JSON value into the string form stored on records.
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_to_string).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Number of non-null fields in an extraction, for progress reporting.
pub fn fields_found(extraction: &PageExtraction) -> usize {
    extraction.fields.values().filter(|v| v.is_some()).count()
}

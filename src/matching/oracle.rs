//! Semantic-equivalence oracle: the second tier of field comparison.

use crate::config::PipelineConfig;
use crate::error::PitchMatchError;
use crate::model::MatchField;
use crate::pipeline::llm::{chat_with_retry, RetryPolicy};
use crate::prompts::comparison_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use tracing::debug;

/// Decides whether two differently-worded values mean the same thing.
///
/// An `Err` means "no verdict"; callers must treat it as a non-match.
#[async_trait]
pub trait SemanticOracle: Send + Sync {
    async fn equivalent(
        &self,
        pitch_value: &str,
        fund_value: &str,
        field: MatchField,
    ) -> Result<bool, PitchMatchError>;
}

/// [`SemanticOracle`] backed by an `edgequake-llm` provider.
///
/// Asks for a one-word `MATCH` / `NO_MATCH` verdict at temperature 0.
pub struct LlmSemanticOracle {
    provider: Arc<dyn LLMProvider>,
    max_tokens: usize,
    policy: RetryPolicy,
}

impl LlmSemanticOracle {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            max_tokens: config.comparison_max_tokens,
            policy: RetryPolicy::from_config(config),
        }
    }
}

#[async_trait]
impl SemanticOracle for LlmSemanticOracle {
    async fn equivalent(
        &self,
        pitch_value: &str,
        fund_value: &str,
        field: MatchField,
    ) -> Result<bool, PitchMatchError> {
        let prompt = comparison_prompt(pitch_value, fund_value, field);
        let messages = vec![ChatMessage::user(prompt.as_str())];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let label = format!("Compare {field}");
        let (reply, _) = chat_with_retry(&self.provider, &messages, &options, self.policy, &label)
            .await
            .map_err(|e| PitchMatchError::SemanticOracleUnavailable {
                field: field.to_string(),
                detail: e.to_string(),
            })?;

        let verdict = parse_verdict(&reply);
        debug!("{}: '{}' vs '{}' → {:?}", label, pitch_value, fund_value, reply.trim());
        Ok(verdict)
    }
}

/// `true` only for an exact `MATCH` reply (case and surrounding whitespace
/// ignored). Anything else, `NO_MATCH` included, is a non-match.
pub fn parse_verdict(reply: &str) -> bool {
    reply.trim().to_uppercase() == "MATCH"
}

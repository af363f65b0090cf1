//! Configuration types for pitch-deck analysis and fund matching.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Fund-store connection settings live in the
//! nested [`FundStoreConfig`], which can be filled from the environment.

use crate::error::PitchMatchError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default model for both extraction and semantic comparison.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default Airtable base holding the fund table.
pub const DEFAULT_AIRTABLE_BASE_ID: &str = "appZCSJhvllkpX1gV";

/// Default Airtable table name.
pub const DEFAULT_AIRTABLE_TABLE: &str = "Fund";

/// Default Airtable REST endpoint.
pub const DEFAULT_AIRTABLE_API_URL: &str = "https://api.airtable.com/v0";

/// Upper bound accepted for [`PipelineConfig::max_retries`].
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Configuration for a parse-then-match run.
///
/// # Example
/// ```rust
/// use pitchdeck_matcher::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .top_n(5)
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.top_n, 5);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for page extraction. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per page. Default: 500.
    ///
    /// A reply is one small JSON object with nine keys.
    pub max_tokens: usize,

    /// Maximum tokens for a semantic comparison reply. Default: 10.
    pub comparison_max_tokens: usize,

    /// Retry attempts on a failed LLM call or fund-store page. Default: 1.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Number of pages extracted concurrently. Default: 1 (sequential).
    ///
    /// Results are re-ordered by page number before consolidation, so this
    /// only affects wall-clock time.
    pub concurrency: usize,

    /// Number of ranked funds to return. Default: 10.
    pub top_n: usize,

    /// Maximum accepted document size in bytes. Default: 25 MiB.
    pub max_file_bytes: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom extraction system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,

    /// Fund-store connection settings.
    pub fund_store: FundStoreConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 500,
            comparison_max_tokens: 10,
            max_retries: 1,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            concurrency: 1,
            top_n: 10,
            max_file_bytes: 25 * 1024 * 1024,
            download_timeout_secs: 120,
            system_prompt: None,
            progress_callback: None,
            fund_store: FundStoreConfig::default(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("top_n", &self.top_n)
            .field("max_file_bytes", &self.max_file_bytes)
            .field("fund_store", &self.fund_store)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to use, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn top_n(mut self, n: usize) -> Self {
        self.config.top_n = n;
        self
    }

    pub fn max_file_bytes(mut self, n: u64) -> Self {
        self.config.max_file_bytes = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn fund_store(mut self, store: FundStoreConfig) -> Self {
        self.config.fund_store = store;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PitchMatchError> {
        let c = &self.config;
        if c.top_n == 0 {
            return Err(PitchMatchError::InvalidConfig("top_n must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(PitchMatchError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_retries > MAX_RETRIES_LIMIT {
            return Err(PitchMatchError::InvalidConfig(format!(
                "max_retries must be ≤ {MAX_RETRIES_LIMIT}, got {}",
                c.max_retries
            )));
        }
        if c.max_file_bytes == 0 {
            return Err(PitchMatchError::InvalidConfig(
                "max_file_bytes must be ≥ 1".into(),
            ));
        }
        c.fund_store.validate()?;
        Ok(self.config)
    }
}

// ── Fund store ───────────────────────────────────────────────────────────

/// Connection settings for the Airtable-backed fund store.
#[derive(Clone)]
pub struct FundStoreConfig {
    /// Personal access token. `None` means the store is unavailable.
    pub api_key: Option<String>,
    pub base_id: String,
    pub table_name: String,
    /// REST endpoint root, overridable for tests and proxies.
    pub api_url: String,
    /// Records per page. Airtable caps this at 100. Default: 100.
    pub page_size: usize,
    /// Stop after this many records. Default: no cap.
    pub max_records: Option<usize>,
    /// Per-request timeout in seconds. Default: 30.
    pub timeout_secs: u64,
}

impl Default for FundStoreConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_id: DEFAULT_AIRTABLE_BASE_ID.to_string(),
            table_name: DEFAULT_AIRTABLE_TABLE.to_string(),
            api_url: DEFAULT_AIRTABLE_API_URL.to_string(),
            page_size: 100,
            max_records: None,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for FundStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FundStoreConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_id", &self.base_id)
            .field("table_name", &self.table_name)
            .field("api_url", &self.api_url)
            .field("page_size", &self.page_size)
            .field("max_records", &self.max_records)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl FundStoreConfig {
    /// Read `AIRTABLE_API_KEY`, `AIRTABLE_BASE_ID` and `AIRTABLE_TABLE_NAME`,
    /// keeping defaults for anything unset or empty.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        config.api_key = non_empty("AIRTABLE_API_KEY");
        if let Some(base) = non_empty("AIRTABLE_BASE_ID") {
            config.base_id = base;
        }
        if let Some(table) = non_empty("AIRTABLE_TABLE_NAME") {
            config.table_name = table;
        }
        config
    }

    fn validate(&self) -> Result<(), PitchMatchError> {
        if self.page_size == 0 || self.page_size > 100 {
            return Err(PitchMatchError::InvalidConfig(format!(
                "fund store page_size must be 1–100, got {}",
                self.page_size
            )));
        }
        if self.max_records == Some(0) {
            return Err(PitchMatchError::InvalidConfig(
                "fund store max_records must be ≥ 1 when set".into(),
            ));
        }
        Ok(())
    }
}

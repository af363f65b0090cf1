//! CLI binary for pitchdeck-matcher.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, picks a fund store and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use pitchdeck_matcher::analyze::resolve_provider;
use pitchdeck_matcher::config::{DEFAULT_AIRTABLE_BASE_ID, DEFAULT_AIRTABLE_TABLE};
use pitchdeck_matcher::{
    analyze_with_store, build_report, parse_pitch_deck, write_report, AirtableFundStore,
    AnalysisReport, FormData, FundMatcher, FundStore, FundStoreConfig, JsonFileFundStore,
    LlmSemanticOracle, PipelineConfig, PipelineProgressCallback, PitchRecord, ProgressCallback,
    TrackedField,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One progress bar, reused for the page phase and then the fund phase.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, prefix: &'static str, unit: &str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        );
        let progress_style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(prefix);
    }

    /// Clear the bar; later calls are no-ops.
    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_parse_start(&self, total_pages: usize) {
        self.activate_bar(total_pages, "Extracting", "pages");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analysing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, fields_found: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{fields_found} fields")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_parse_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        if failed == 0 {
            self.bar.println(format!(
                "{} {} pages analysed",
                green("✔"),
                bold(&success_count.to_string())
            ));
        } else {
            self.bar.println(format!(
                "{} {}/{} pages analysed  ({} failed)",
                if failed == total_pages { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            ));
        }
    }

    fn on_matching_start(&self, funds_to_compare: usize) {
        self.activate_bar(funds_to_compare, "Matching", "funds");
    }

    fn on_fund_evaluated(&self, _index: usize, _total: usize, _matched: bool) {
        self.bar.inc(1);
    }

    fn on_matching_complete(&self, matched: usize) {
        self.finish();
        eprintln!("{} {} funds matched", green("✔"), bold(&matched.to_string()));
    }

    fn on_matching_skipped(&self, reason: &str) {
        self.finish();
        eprintln!("{} Matching skipped: {}", cyan("⚠"), dim(reason));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a deck against the Airtable fund table
  pitchmatch deck.pdf

  # Match against a local export instead of Airtable
  pitchmatch deck.pdf --funds-file funds.json

  # Only extract the pitch record
  pitchmatch deck.pdf --parse-only --json

  # Re-run matching on a saved pitch record
  pitchmatch --pitch-json pitch.json --funds-file funds.json --top-n 25

  # Pass-through form metadata, JSON report to a file
  pitchmatch deck.pdf --company-name Acme --stage Seed \
      --continents '["Europe"]' --countries '["France","Germany"]' -o report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  AIRTABLE_API_KEY        Airtable personal access token
  AIRTABLE_BASE_ID        Airtable base holding the fund table
  AIRTABLE_TABLE_NAME     Fund table name
"#;

/// Match pitch-deck PDFs against a fund database.
#[derive(Parser, Debug)]
#[command(
    name = "pitchmatch",
    version,
    about = "Extract investment metadata from a pitch deck and rank matching funds",
    long_about = "Reads a pitch-deck PDF (local file or URL), extracts company, stage, sector, \
location, check size, lead and investment theme with an LLM, then ranks the funds whose \
profile matches on every extracted field.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "pitch_json")]
    input: Option<String>,

    /// Skip parsing and match this saved pitch record (JSON) instead.
    #[arg(long, conflicts_with_all = ["input", "parse_only"])]
    pitch_json: Option<PathBuf>,

    /// Stop after extraction and print the pitch record.
    #[arg(long)]
    parse_only: bool,

    /// Write the JSON report to this file.
    #[arg(short, long, env = "PITCHMATCH_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the JSON report on stdout instead of a table.
    #[arg(long, env = "PITCHMATCH_JSON")]
    json: bool,

    // ── Form metadata (passed through to the report) ────────────────────
    /// Company name as entered by the user.
    #[arg(long, default_value = "")]
    company_name: String,

    /// Funding stage as entered by the user.
    #[arg(long, default_value = "")]
    stage: String,

    /// Funding goal as entered by the user.
    #[arg(long, default_value = "")]
    funding_goal: String,

    /// JSON array of continents; invalid JSON is treated as empty.
    #[arg(long, default_value = "[]")]
    continents: String,

    /// JSON array of countries; invalid JSON is treated as empty.
    #[arg(long, default_value = "[]")]
    countries: String,

    // ── Matching ────────────────────────────────────────────────────────
    /// Number of ranked funds to return.
    #[arg(long, env = "PITCHMATCH_TOP_N", default_value_t = 10)]
    top_n: usize,

    /// Read funds from a local JSON export instead of Airtable.
    #[arg(long, env = "PITCHMATCH_FUNDS_FILE")]
    funds_file: Option<PathBuf>,

    /// Airtable personal access token.
    #[arg(long, env = "AIRTABLE_API_KEY", hide_env_values = true)]
    airtable_api_key: Option<String>,

    /// Airtable base ID.
    #[arg(long, env = "AIRTABLE_BASE_ID", default_value = DEFAULT_AIRTABLE_BASE_ID)]
    airtable_base_id: String,

    /// Airtable table name.
    #[arg(long, env = "AIRTABLE_TABLE_NAME", default_value = DEFAULT_AIRTABLE_TABLE)]
    airtable_table: String,

    /// Stop fetching after this many fund records.
    #[arg(long)]
    max_funds: Option<usize>,

    // ── LLM ─────────────────────────────────────────────────────────────
    /// LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Pages extracted concurrently.
    #[arg(short, long, env = "PITCHMATCH_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Path to a text file containing a custom extraction system prompt.
    #[arg(long, env = "PITCHMATCH_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Retries per LLM call or fund-store page.
    #[arg(long, env = "PITCHMATCH_MAX_RETRIES", default_value_t = 1)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PITCHMATCH_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PITCHMATCH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    // ── Output control ──────────────────────────────────────────────────
    /// Disable progress bar.
    #[arg(long, env = "PITCHMATCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PITCHMATCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PITCHMATCH_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let cli_progress = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn PipelineProgressCallback>);
    let finish_progress = || {
        if let Some(ref cb) = cli_progress {
            cb.finish();
        }
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Parse only ───────────────────────────────────────────────────────
    if cli.parse_only {
        let input = cli.input.as_deref().context("No input given")?;
        let parsed = parse_pitch_deck(input, &config).await;
        finish_progress();
        let pitch = parsed.context("Parsing failed")?;
        if cli.json || !cli.quiet {
            println!(
                "{}",
                serde_json::to_string_pretty(&pitch).context("Failed to serialise pitch")?
            );
        }
        return Ok(());
    }

    // ── Parse + match ────────────────────────────────────────────────────
    let store = fund_store(&cli, &config)?;
    let form_data = FormData {
        company_name: cli.company_name.clone(),
        stage: cli.stage.clone(),
        funding_goal: cli.funding_goal.clone(),
        continents: FormData::parse_list(&cli.continents),
        countries: FormData::parse_list(&cli.countries),
    };

    let report = if let Some(ref path) = cli.pitch_json {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read pitch record from {:?}", path))?;
        let pitch: PitchRecord =
            serde_json::from_str(&raw).context("Pitch record is not valid JSON")?;
        let provider = resolve_provider(&config).await?;
        let oracle = LlmSemanticOracle::new(provider, &config);
        let matcher = FundMatcher::new(store, Arc::new(oracle))
            .with_progress(config.progress_callback.clone());
        build_report(pitch, form_data, &matcher, config.top_n).await
    } else {
        let input = cli.input.as_deref().context("No input given")?;
        let analysed = analyze_with_store(input, form_data, store, &config).await;
        finish_progress();
        analysed.context("Analysis failed")?
    };

    finish_progress();

    if let Some(ref output_path) = cli.output {
        write_report(&report, output_path)
            .await
            .context("Failed to write report")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} funds  →  {}",
                green("✔"),
                report.funds_processed,
                bold(&output_path.display().to_string()),
            );
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if cli.output.is_none() && !cli.quiet {
        print_table(&report);
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let fund_store = FundStoreConfig {
        api_key: cli.airtable_api_key.clone().filter(|k| !k.trim().is_empty()),
        base_id: cli.airtable_base_id.clone(),
        table_name: cli.airtable_table.clone(),
        max_records: cli.max_funds,
        ..Default::default()
    };

    let mut builder = PipelineConfig::builder()
        .concurrency(cli.concurrency)
        .top_n(cli.top_n)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .fund_store(fund_store);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn fund_store(cli: &Cli, config: &PipelineConfig) -> Result<Arc<dyn FundStore>> {
    if let Some(ref path) = cli.funds_file {
        return Ok(Arc::new(JsonFileFundStore::new(path)));
    }
    let store = AirtableFundStore::new(config.fund_store.clone())
        .context("Failed to set up Airtable client")?
        .with_retry(config.max_retries, config.retry_backoff_ms);
    Ok(Arc::new(store))
}

fn print_table(report: &AnalysisReport) {
    println!("{}", bold("Pitch"));
    for field in TrackedField::ALL {
        let value = report.pitch.get(field).unwrap_or("—");
        println!("  {:<18} {}", field.as_str(), value);
    }
    println!(
        "  {:<18} {}",
        "pages_analyzed",
        report.pitch.pages_analyzed
    );
    println!();

    if let Some(ref err) = report.matching_error {
        println!("{} Matching unavailable: {}", red("✘"), err);
        return;
    }
    if report.matching_funds.is_empty() {
        println!("{}", dim("No fund matched every extracted field."));
        return;
    }

    println!(
        "{}",
        bold(&format!("{:>3}  {:>6}  {:<15}  {}", "#", "score", "quality", "fund"))
    );
    for (i, m) in report.matching_funds.iter().enumerate() {
        let contact = m.fund.email.as_deref().unwrap_or("");
        println!(
            "{:>3}  {:>5.1}%  {:<15}  {}  {}",
            i + 1,
            m.confidence_rate,
            m.match_quality.to_string(),
            m.fund.label(),
            dim(contact),
        );
    }
}

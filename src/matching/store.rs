//! Fund stores: where [`FundRecord`]s come from.
//!
//! Two implementations share one record shape, `{ "id": …, "fields": { … } }`:
//!
//! * [`AirtableFundStore`] pages through the Airtable REST API.
//! * [`JsonFileFundStore`] reads a local export, for offline runs and tests.
//!
//! ## Column mapping
//!
//! | record field       | column                  | confidence column                  |
//! |--------------------|-------------------------|------------------------------------|
//! | `stage`            | `stage`                 | `stage confidence`                 |
//! | `sector`           | `sector`                | `sector confidence`                |
//! | `location`         | `location`              | `location confidence`              |
//! | `check_size`       | `check size`            | `check size confidence`            |
//! | `lead`             | `lead`                  | `lead confidence`                  |
//! | `investment_theme` | `investment theme`      | `investment theme confidence`      |
//!
//! plus `website` and `Email`. Multi-select and numeric cells are flattened to
//! strings the same way LLM replies are.

use crate::config::FundStoreConfig;
use crate::error::PitchMatchError;
use crate::model::{FundRecord, MatchField};
use crate::pipeline::llm::{backoff_delay, value_to_string};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Supplies the full list of candidate funds.
#[async_trait]
pub trait FundStore: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<FundRecord>, PitchMatchError>;
}

/// Column name holding a field's value.
pub fn column_name(field: MatchField) -> &'static str {
    match field {
        MatchField::Stage => "stage",
        MatchField::Sector => "sector",
        MatchField::Location => "location",
        MatchField::CheckSize => "check size",
        MatchField::Lead => "lead",
        MatchField::InvestmentTheme => "investment theme",
    }
}

/// Build a [`FundRecord`] from one row's cells.
pub fn fund_from_fields(id: impl Into<String>, fields: &Map<String, Value>) -> FundRecord {
    let mut fund = FundRecord::new(id);
    fund.website = fields.get("website").and_then(value_to_string);
    fund.email = fields.get("Email").and_then(value_to_string);

    for field in MatchField::ALL {
        let column = column_name(field);
        if let Some(value) = fields.get(column).and_then(value_to_string) {
            fund.values.insert(field, value);
        }
        let confidence_column = format!("{column} confidence");
        if let Some(conf) = fields.get(&confidence_column).and_then(value_to_string) {
            fund.confidences.insert(field, conf);
        }
    }
    fund
}

/// One row as returned by Airtable and as stored in JSON exports.
#[derive(Debug, Deserialize)]
struct RawRecord {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RawRecord {
    fn into_fund(self) -> FundRecord {
        fund_from_fields(self.id, &self.fields)
    }
}

/// One page of an Airtable list response.
#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<RawRecord>,
    #[serde(default)]
    offset: Option<String>,
}

// ── Airtable ─────────────────────────────────────────────────────────────

/// Fund store backed by an Airtable table.
///
/// Requests `pageSize` records at a time and follows the returned `offset`
/// cursor until the table is exhausted or `max_records` is reached.
pub struct AirtableFundStore {
    config: FundStoreConfig,
    client: reqwest::Client,
    max_retries: u32,
    backoff_ms: u64,
}

impl AirtableFundStore {
    pub fn new(config: FundStoreConfig) -> Result<Self, PitchMatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PitchMatchError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            max_retries: 1,
            backoff_ms: 500,
        })
    }

    /// Retry transient failures (connection errors, 429, 5xx) per page.
    pub fn with_retry(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_ms = backoff_ms;
        self
    }

    fn table_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.base_id,
            self.config.table_name
        )
    }

    async fn fetch_page(
        &self,
        api_key: &str,
        offset: Option<&str>,
    ) -> Result<RecordPage, PitchMatchError> {
        let url = self.table_url();
        let mut query = vec![("pageSize", self.config.page_size.to_string())];
        if let Some(max) = self.config.max_records {
            query.push(("maxRecords", max.to_string()));
        }
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let unavailable = |reason: String| PitchMatchError::FundStoreUnavailable { reason };
        let mut last_err = String::from("no attempt made");

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_delay(self.backoff_ms, attempt);
                warn!("Fund store: retry {}/{} after {}ms", attempt, self.max_retries, backoff);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .client
                .get(&url)
                .bearer_auth(api_key)
                .query(&query)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_err = e.to_string();
                    continue;
                }
                Err(e) => return Err(unavailable(e.to_string())),
            };

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                last_err = format!("HTTP {status}");
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let preview: String = body.chars().take(200).collect();
                return Err(unavailable(format!("HTTP {status}: {preview}")));
            }

            return response
                .json::<RecordPage>()
                .await
                .map_err(|e| unavailable(format!("invalid response body: {e}")));
        }

        Err(unavailable(format!(
            "{url} failed after {} attempts: {last_err}",
            self.max_retries + 1
        )))
    }
}

#[async_trait]
impl FundStore for AirtableFundStore {
    async fn fetch_all(&self) -> Result<Vec<FundRecord>, PitchMatchError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            PitchMatchError::FundStoreUnavailable {
                reason: "AIRTABLE_API_KEY is not set".into(),
            }
        })?;

        info!(
            "Fetching funds from Airtable base {} table '{}'",
            self.config.base_id, self.config.table_name
        );

        let mut funds = Vec::new();
        let mut offset: Option<String> = None;
        let mut page_num = 0usize;

        loop {
            let page = self.fetch_page(api_key, offset.as_deref()).await?;
            page_num += 1;
            let count = page.records.len();
            funds.extend(page.records.into_iter().map(RawRecord::into_fund));
            debug!("Fund page {}: {} records (total: {})", page_num, count, funds.len());

            if let Some(max) = self.config.max_records {
                if funds.len() >= max {
                    funds.truncate(max);
                    break;
                }
            }
            match page.offset {
                Some(next) if count > 0 => offset = Some(next),
                _ => break,
            }
        }

        info!("Fetched {} funds in {} pages", funds.len(), page_num);
        Ok(funds)
    }
}

// ── JSON file ────────────────────────────────────────────────────────────

/// Either an Airtable-style `{"records": [...]}` export or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FundFile {
    Wrapped { records: Vec<RawRecord> },
    Bare(Vec<RawRecord>),
}

/// Fund store reading a local JSON export.
#[derive(Debug, Clone)]
pub struct JsonFileFundStore {
    path: PathBuf,
}

impl JsonFileFundStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl FundStore for JsonFileFundStore {
    async fn fetch_all(&self) -> Result<Vec<FundRecord>, PitchMatchError> {
        let unavailable = |reason: String| PitchMatchError::FundStoreUnavailable { reason };

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| unavailable(format!("cannot read {}: {e}", self.path.display())))?;
        let file: FundFile = serde_json::from_str(&raw)
            .map_err(|e| unavailable(format!("invalid fund file {}: {e}", self.path.display())))?;

        let records = match file {
            FundFile::Wrapped { records } | FundFile::Bare(records) => records,
        };
        let funds: Vec<FundRecord> = records.into_iter().map(RawRecord::into_fund).collect();
        info!("Loaded {} funds from {}", funds.len(), self.path.display());
        Ok(funds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn cells(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn maps_columns_and_confidences() {
        let fund = fund_from_fields(
            "rec1",
            &cells(json!({
                "stage": "Seed",
                "stage confidence": "high",
                "check size": "$500k-$2M",
                "check size confidence": "medium",
                "investment theme": ["Climate", "Energy"],
                "website": "https://fund.example",
                "Email": "hi@fund.example",
                "unrelated": 42
            })),
        );
        assert_eq!(fund.id, "rec1");
        assert_eq!(fund.value(MatchField::Stage), Some("Seed"));
        assert_eq!(fund.confidence(MatchField::Stage), Some("high"));
        assert_eq!(fund.value(MatchField::CheckSize), Some("$500k-$2M"));
        assert_eq!(fund.confidence(MatchField::CheckSize), Some("medium"));
        assert_eq!(fund.value(MatchField::InvestmentTheme), Some("Climate, Energy"));
        assert_eq!(fund.confidence(MatchField::InvestmentTheme), None);
        assert_eq!(fund.value(MatchField::Sector), None);
        assert_eq!(fund.website.as_deref(), Some("https://fund.example"));
        assert_eq!(fund.email.as_deref(), Some("hi@fund.example"));
        assert_eq!(fund.label(), "https://fund.example");
    }

    #[test]
    fn numeric_cells_are_flattened() {
        let fund = fund_from_fields("rec2", &cells(json!({ "check size": 1000000 })));
        assert_eq!(fund.value(MatchField::CheckSize), Some("1000000"));
    }

    #[test]
    fn page_response_parses_offset() {
        let page: RecordPage = serde_json::from_value(json!({
            "records": [{ "id": "rec1", "createdTime": "2024-01-01T00:00:00.000Z", "fields": {} }],
            "offset": "itrABC/rec1"
        }))
        .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.offset.as_deref(), Some("itrABC/rec1"));

        let last: RecordPage = serde_json::from_value(json!({ "records": [] })).unwrap();
        assert!(last.offset.is_none());
    }

    #[tokio::test]
    async fn airtable_without_key_is_unavailable() {
        let store = AirtableFundStore::new(FundStoreConfig::default()).unwrap();
        let err = store.fetch_all().await.unwrap_err();
        assert!(matches!(err, PitchMatchError::FundStoreUnavailable { .. }));
        assert!(err.to_string().contains("AIRTABLE_API_KEY"));
    }

    #[test]
    fn table_url_joins_parts() {
        let store = AirtableFundStore::new(FundStoreConfig {
            api_url: "http://localhost:9999/v0/".into(),
            base_id: "appX".into(),
            table_name: "Fund".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(store.table_url(), "http://localhost:9999/v0/appX/Fund");
    }

    // ── Airtable paging against a local server ───────────────────────────

    /// Answer one connection per canned `(status, body)`, recording each
    /// request head. Returns the API root and the request log.
    async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&chunk[..n]);
                }
                log.lock().unwrap().push(String::from_utf8_lossy(&head).into_owned());

                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/v0"), seen)
    }

    fn page(ids: &[&str], offset: Option<&str>) -> (u16, String) {
        let records: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "id": id, "fields": { "stage": "Seed" } }))
            .collect();
        let mut body = json!({ "records": records });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        (200, body.to_string())
    }

    fn store_at(api_url: String, max_records: Option<usize>) -> AirtableFundStore {
        AirtableFundStore::new(FundStoreConfig {
            api_key: Some("patTEST".into()),
            base_id: "appT".into(),
            table_name: "Fund".into(),
            api_url,
            page_size: 2,
            max_records,
            timeout_secs: 5,
        })
        .unwrap()
        .with_retry(2, 1)
    }

    fn request_lines(seen: &Mutex<Vec<String>>) -> Vec<String> {
        seen.lock()
            .unwrap()
            .iter()
            .map(|r| r.lines().next().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn airtable_follows_offset_until_absent() {
        let (url, seen) = serve(vec![
            page(&["recA", "recB"], Some("itr1")),
            page(&["recC", "recD"], Some("itr2")),
            page(&["recE"], None),
        ])
        .await;

        let funds = store_at(url, None).fetch_all().await.unwrap();
        let ids: Vec<_> = funds.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["recA", "recB", "recC", "recD", "recE"]);
        assert_eq!(funds[4].value(MatchField::Stage), Some("Seed"));

        let lines = request_lines(&seen);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("GET /v0/appT/Fund?pageSize=2 "), "{}", lines[0]);
        assert!(lines[1].contains("offset=itr1"), "{}", lines[1]);
        assert!(lines[2].contains("offset=itr2"), "{}", lines[2]);
        assert!(seen.lock().unwrap()[0]
            .to_lowercase()
            .contains("authorization: bearer pattest"));
    }

    #[tokio::test]
    async fn airtable_stops_at_max_records() {
        let (url, seen) = serve(vec![
            page(&["recA", "recB"], Some("itr1")),
            page(&["recC", "recD"], Some("itr2")),
        ])
        .await;

        let funds = store_at(url, Some(3)).fetch_all().await.unwrap();
        let ids: Vec<_> = funds.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["recA", "recB", "recC"]);

        let lines = request_lines(&seen);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("maxRecords=3"), "{}", lines[0]);
    }

    #[tokio::test]
    async fn airtable_retries_transient_status() {
        let (url, seen) = serve(vec![
            (429, r#"{"errors": "RATE_LIMIT"}"#.to_string()),
            (503, String::new()),
            page(&["recA"], None),
        ])
        .await;

        let funds = store_at(url, None).fetch_all().await.unwrap();
        assert_eq!(funds.len(), 1);
        assert_eq!(request_lines(&seen).len(), 3);
    }

    #[tokio::test]
    async fn airtable_gives_up_after_retries() {
        let (url, _seen) = serve(vec![
            (500, String::new()),
            (500, String::new()),
            (500, String::new()),
        ])
        .await;

        let err = store_at(url, None).fetch_all().await.unwrap_err();
        assert!(matches!(err, PitchMatchError::FundStoreUnavailable { .. }));
        assert!(err.to_string().contains("3 attempts"), "{err}");
    }

    #[tokio::test]
    async fn airtable_client_error_is_unavailable() {
        let (url, seen) = serve(vec![(
            403,
            r#"{"error": {"type": "INVALID_PERMISSIONS"}}"#.to_string(),
        )])
        .await;

        let err = store_at(url, None).fetch_all().await.unwrap_err();
        assert!(matches!(err, PitchMatchError::FundStoreUnavailable { .. }));
        let msg = err.to_string();
        assert!(msg.contains("403") && msg.contains("INVALID_PERMISSIONS"), "{msg}");
        assert_eq!(request_lines(&seen).len(), 1);
    }

    // ── JSON file ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn json_file_store_reads_wrapped_and_bare() {
        let mut wrapped = tempfile::NamedTempFile::new().unwrap();
        write!(
            wrapped,
            r#"{{"records": [{{"id": "a", "fields": {{"sector": "FinTech"}}}}, {{"id": "b"}}]}}"#
        )
        .unwrap();
        let funds = JsonFileFundStore::new(wrapped.path()).fetch_all().await.unwrap();
        assert_eq!(funds.len(), 2);
        assert_eq!(funds[0].value(MatchField::Sector), Some("FinTech"));
        assert!(funds[1].values.is_empty());

        let mut bare = tempfile::NamedTempFile::new().unwrap();
        write!(bare, r#"[{{"id": "c", "fields": {{"lead": "Yes"}}}}]"#).unwrap();
        let funds = JsonFileFundStore::new(bare.path()).fetch_all().await.unwrap();
        assert_eq!(funds[0].id, "c");
        assert_eq!(funds[0].value(MatchField::Lead), Some("Yes"));
    }

    #[tokio::test]
    async fn missing_or_invalid_file_is_unavailable() {
        let err = JsonFileFundStore::new("/definitely/not/here.json")
            .fetch_all()
            .await
            .unwrap_err();
        assert!(matches!(err, PitchMatchError::FundStoreUnavailable { .. }));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        let err = JsonFileFundStore::new(bad.path()).fetch_all().await.unwrap_err();
        assert!(matches!(err, PitchMatchError::FundStoreUnavailable { .. }));
    }
}

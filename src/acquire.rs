use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::records::RawRecord;
use crate::settings::Settings;

const APIFY_BASE_URL: &str = "https://api.apify.com";
// Synchronous actor runs are capped at 300s server-side.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(330);

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("APIFY_TOKEN is not set (settings `apify_token` or environment)")]
    MissingToken,
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),
    #[error("actor run returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("actor run returned a non-array payload")]
    Payload,
}

/// Request options forwarded to the acquisition service for every term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionOptions {
    pub country_code: String,
    pub language_code: String,
    pub max_pages_per_query: u32,
    pub include_unfiltered_results: bool,
    pub mobile_results: bool,
    pub save_html: bool,
}

impl AcquisitionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        AcquisitionOptions {
            country_code: settings.country_code.clone(),
            language_code: settings.language_code.clone(),
            max_pages_per_query: settings.max_pages_per_query,
            include_unfiltered_results: settings.include_unfiltered_results,
            mobile_results: settings.mobile_results,
            save_html: settings.save_html,
        }
    }
}

/// Anything that turns a search term into raw result items.
pub trait SearchSource {
    fn run_query(
        &self,
        term: &str,
        options: &AcquisitionOptions,
    ) -> impl Future<Output = Result<Vec<Value>, AcquireError>> + Send;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActorInput<'a> {
    queries: &'a str,
    #[serde(flatten)]
    options: &'a AcquisitionOptions,
    save_html_to_key_value_store: bool,
}

/// Runs an Apify actor synchronously and returns its dataset items.
pub struct ApifySource {
    http: reqwest::Client,
    base_url: String,
    actor_id: String,
    token: String,
}

impl ApifySource {
    pub fn from_settings(settings: &Settings) -> Result<Self, AcquireError> {
        Self::new(&settings.actor_id, settings.apify_token())
    }

    pub fn new(actor_id: &str, token: Option<String>) -> Result<Self, AcquireError> {
        let token = token.ok_or(AcquireError::MissingToken)?;
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(ApifySource {
            http,
            base_url: APIFY_BASE_URL.to_string(),
            actor_id: actor_id.to_string(),
            token,
        })
    }

    fn endpoint(&self) -> String {
        // the API addresses `user/actor` as `user~actor`
        format!(
            "{}/v2/acts/{}/run-sync-get-dataset-items",
            self.base_url.trim_end_matches('/'),
            self.actor_id.replace('/', "~")
        )
    }
}

impl SearchSource for ApifySource {
    async fn run_query(
        &self,
        term: &str,
        options: &AcquisitionOptions,
    ) -> Result<Vec<Value>, AcquireError> {
        let input = ActorInput {
            queries: term,
            options,
            save_html_to_key_value_store: false,
        };
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.token)
            .json(&input)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AcquireError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        match response.json::<Value>().await? {
            Value::Array(items) => Ok(items),
            _ => Err(AcquireError::Payload),
        }
    }
}

pub struct FetchStats {
    pub terms: usize,
    pub ok: usize,
    pub errors: usize,
    pub items: usize,
    pub skipped_items: usize,
}

/// Acquire every term in order, tagging each item with its term.
///
/// A failing term is logged and counted; the remaining terms still run.
pub async fn fetch_terms<S: SearchSource>(
    source: &S,
    terms: &[String],
    options: &AcquisitionOptions,
    pause: Duration,
) -> anyhow::Result<(Vec<RawRecord>, FetchStats)> {
    let pb = ProgressBar::new(terms.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut records = Vec::new();
    let mut stats = FetchStats {
        terms: terms.len(),
        ok: 0,
        errors: 0,
        items: 0,
        skipped_items: 0,
    };

    for (i, term) in terms.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        pb.set_message(term.clone());

        match source.run_query(term, options).await {
            Ok(items) => {
                stats.ok += 1;
                let fetched_at = Some(Utc::now());
                let before = records.len();
                for item in items {
                    match RawRecord::from_item(term, item, fetched_at) {
                        Some(record) => records.push(record),
                        None => stats.skipped_items += 1,
                    }
                }
                let count = records.len() - before;
                stats.items += count;
                info!(term = %term, items = count, "acquired");
            }
            Err(e) => {
                stats.errors += 1;
                warn!(term = %term, error = %e, "acquisition failed");
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok((records, stats))
}

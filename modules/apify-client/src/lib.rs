pub mod error;
pub mod types;

use std::time::{Duration, Instant};

pub use error::{ApifyError, Result};
pub use types::{InstagramChildPost, InstagramPost, InstagramScraperInput, MediaKind, MediaRef, RunData};

use serde::de::DeserializeOwned;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for apify/instagram-post-scraper.
const INSTAGRAM_POST_SCRAPER: &str = "nH2AHrwxeTRJoN5hX";

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    max_wait: Duration,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
            max_wait: Duration::from_secs(600),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Upper bound on how long `wait_for_run` keeps long-polling.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }

    /// Start an Instagram profile scrape run. Returns immediately with run metadata.
    pub async fn start_instagram_scrape(&self, username: &str, limit: u32) -> Result<RunData> {
        let input = InstagramScraperInput {
            username: vec![username.to_string()],
            results_limit: limit,
            only_posts_newer_than: None,
        };

        let url = format!("{}/acts/{}/runs", self.base_url, INSTAGRAM_POST_SCRAPER);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&input)
            .send()
            .await?;

        let api_resp: ApiResponse<RunData> = Self::check(resp).await?.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes. Uses `waitForFinish=60` for efficient long-polling.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        let started = Instant::now();
        loop {
            if started.elapsed() > self.max_wait {
                return Err(ApifyError::Timeout {
                    run_id: run_id.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }

            let url = format!("{}/actor-runs/{}?waitForFinish=60", self.base_url, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let api_resp: ApiResponse<RunData> = Self::check(resp).await?.json().await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ApifyError::RunFailed(api_resp.data.status));
                }
                _ => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
            }
        }
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json&clean=true", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let text = Self::check(resp).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Scrape Instagram profile posts end-to-end: start run, poll, fetch results.
    pub async fn scrape_instagram_posts(
        &self,
        username: &str,
        limit: u32,
    ) -> Result<Vec<InstagramPost>> {
        tracing::info!(username, limit, "Starting Instagram profile scrape");

        let run = self.start_instagram_scrape(username, limit).await?;
        tracing::info!(run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let posts: Vec<InstagramPost> = self
            .get_dataset_items(&completed.default_dataset_id)
            .await?;
        tracing::info!(count = posts.len(), "Fetched Instagram posts");

        Ok(posts)
    }
}

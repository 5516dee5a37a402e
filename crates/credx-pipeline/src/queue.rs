//! HTTP client for the article work queue.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::PipelineError;

/// One queued scraping job.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleJob {
    pub id: String,
    pub url: String,
    /// Expected value of the page's `credx-verification` meta tag.
    pub verification_code: String,
    pub queued_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct AckResponse {
    message: String,
}

/// Client for the queue endpoints of the credx backend.
pub struct QueueClient {
    client: reqwest::Client,
    base_url: String,
}

impl QueueClient {
    /// `base_url` should be like `http://localhost:4000` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Pull pending jobs from the queue.
    ///
    /// If `since` is provided, only jobs queued after that timestamp are
    /// returned.
    pub async fn poll_jobs(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ArticleJob>, PipelineError> {
        let mut url = format!("{}/api/bloc/queue", self.base_url);
        if let Some(ts) = since {
            url.push_str(&format!("?since={}", ts.to_rfc3339()));
        }

        info!(url = %url, "polling article queue");
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let jobs: Vec<ArticleJob> = resp.json().await?;
        info!(count = jobs.len(), "pulled jobs");
        Ok(jobs)
    }

    /// Acknowledge a finished job so the queue drops it.
    pub async fn complete_job(&self, id: &str) -> Result<(), PipelineError> {
        let url = format!("{}/api/bloc/queue/{id}", self.base_url);

        let resp = self.client.delete(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let ack: AckResponse = resp.json().await?;
        info!(id, message = %ack.message, "job acknowledged");
        Ok(())
    }
}

//! Client for a Gemini-style `generateContent` endpoint, used to produce
//! the short teaser summary shown on article cards.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::PipelineError;

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

/// Client for the generative summarization endpoint.
pub struct SummaryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl SummaryClient {
    /// `base_url` should be like
    /// `https://generativelanguage.googleapis.com` (no trailing slash).
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Generate a short teaser summary for an article.
    pub async fn summarize(&self, article_text: &str) -> Result<String, PipelineError> {
        let prompt = format!(
            "Generate a very short blog post summary in 80 words or less from the below \
             context, make sure it is super interesting such that it compels the user to \
             click and read the full article. output should be in plain text only \
             Context: {article_text}"
        );
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        info!(model = %self.model, "requesting article summary");
        let resp = self.client.post(&url).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let result: GenerateResponse = resp.json().await?;
        let summary = result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(PipelineError::EmptySummary)?;

        info!(chars = summary.len(), "summary generated");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_json_parses() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "A gripping look at the story."}]}}
            ]
        }"#;
        let resp: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            resp.candidates[0].content.parts[0].text,
            "A gripping look at the story."
        );
    }

    #[test]
    fn empty_candidates_parse_to_empty_vec() {
        let resp: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.candidates.is_empty());
    }

    #[test]
    fn request_json_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "prompt".into(),
                }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "prompt");
    }

    #[tokio::test]
    async fn non_2xx_response_is_a_typed_server_error() {
        let addr =
            crate::testutil::one_shot_server("503 Service Unavailable", "model overloaded");

        let client = SummaryClient::new(format!("http://{addr}"), "key".into());
        match client.summarize("short article").await.unwrap_err() {
            PipelineError::Server { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "model overloaded");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn summary_client_trims_trailing_slash() {
        let client = SummaryClient::new(
            "https://generativelanguage.googleapis.com/".into(),
            "key".into(),
        );
        assert_eq!(client.base_url, "https://generativelanguage.googleapis.com");
        assert_eq!(client.model, DEFAULT_MODEL);
    }
}

use crate::ellipsis;
use crate::error::UpstreamError;
use crate::models::Emotion;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

// {"emotions": {...}, "polarity": {...}, "va": {"valence": 0.65, "arousal": 0.67}}
#[derive(Debug, Deserialize)]
struct EmotextResponse {
    va: Emotion,
}

/// Client for the emotion-analysis service: one text in, one [`Emotion`] out.
#[derive(Clone)]
pub struct EmotextClient {
    client: Client,
    endpoint: String,
}

impl EmotextClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Single attempt; nothing is retried or cached.
    pub async fn analyze(&self, text: &str) -> Result<Emotion, UpstreamError> {
        let short_text = ellipsis::centering(text, 11);

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(text.to_string())
            .send()
            .await
            .map_err(|e| {
                warn!(text = %short_text, error = %e, "emotext: request failed");
                UpstreamError::transport(&self.endpoint, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(text = %short_text, status = status.as_u16(), "emotext: unexpected status");
            return Err(UpstreamError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| UpstreamError::transport(&self.endpoint, e))?;

        let parsed: EmotextResponse = serde_json::from_str(&response_text).map_err(|e| {
            warn!(text = %short_text, error = %e, "emotext: malformed response");
            UpstreamError::decode(&self.endpoint, e)
        })?;

        debug!(text = %short_text, emotion = %parsed.va, "emotext: success");
        Ok(parsed.va)
    }
}

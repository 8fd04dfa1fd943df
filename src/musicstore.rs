use crate::error::UpstreamError;
use crate::models::{Emotion, Track};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct MurecomTracksResponse {
    #[serde(default)]
    tracks: Option<Vec<Track>>,
}

/// Client for the music store's recommendation endpoint.
#[derive(Clone)]
pub struct MusicstoreClient {
    client: Client,
    endpoint: String,
}

impl MusicstoreClient {
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

    /// Ranked tracks for `emotion`. An empty list is a valid answer here.
    pub async fn recommend(&self, emotion: Emotion) -> Result<Vec<Track>, UpstreamError> {
        // GET {endpoint}?Valence=0.5&Arousal=0.5
        let url = format!(
            "{}?Valence={}&Arousal={}",
            self.endpoint, emotion.valence, emotion.arousal
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(%emotion, error = %e, "murecom: request failed");
            UpstreamError::transport(&self.endpoint, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%emotion, status = status.as_u16(), "murecom: unexpected status");
            return Err(UpstreamError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| UpstreamError::transport(&self.endpoint, e))?;

        let parsed: MurecomTracksResponse = serde_json::from_str(&response_text).map_err(|e| {
            warn!(%emotion, error = %e, "murecom: malformed response");
            UpstreamError::decode(&self.endpoint, e)
        })?;

        let tracks = parsed.tracks.unwrap_or_default();
        info!(%emotion, tracks = tracks.len(), "murecom: success");

        Ok(tracks)
    }
}

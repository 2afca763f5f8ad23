//! Media-server REST client
//!
//! Talks to the backend that owns the media library: saved progress,
//! next-episode lookups, and the network info needed to build stream URLs.

use anyhow::Result;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{EpisodeRef, MediaType, ProgressRecord};

/// Media-server API error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Resource not found (404)")]
    NotFound,

    #[error("Server error: {0}")]
    ServerStatus(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// Media-server API client
#[derive(Debug, Clone)]
pub struct ServerClient {
    base_url: String,
    client: reqwest::Client,
}

impl ServerClient {
    /// Create a client against the given base URL (no trailing slash)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request and deserialize the JSON body
    async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T, ServerError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                serde_json::from_str(&body)
                    .map_err(|e| ServerError::InvalidResponse(format!("JSON parse error: {}", e)))
            }
            StatusCode::NOT_FOUND => Err(ServerError::NotFound),
            status => Err(ServerError::ServerStatus(status.as_u16())),
        }
    }

    /// Resolve the host/port the server is reachable on from this network
    pub async fn network_info(&self) -> Result<NetworkInfo, ServerError> {
        self.get("/api/network-info").await
    }

    /// Load saved progress for a media item. Returns None when the server has
    /// no record for it.
    pub async fn load_progress(
        &self,
        media_type: MediaType,
        media_id: &str,
    ) -> Result<Option<SavedProgress>, ServerError> {
        let endpoint = format!(
            "/api/progress?type={}&media_id={}",
            media_type.as_str(),
            urlencoding::encode(media_id)
        );
        match self.get::<SavedProgress>(&endpoint).await {
            Ok(progress) => Ok(Some(progress)),
            Err(ServerError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Save a progress record. The caller decides whether failures matter;
    /// playback never blocks on this.
    pub async fn save_progress(&self, record: &ProgressRecord) -> Result<(), ServerError> {
        let url = format!("{}/api/progress", self.base_url);
        let response = self.client.post(&url).json(record).send().await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(ServerError::NotFound),
            status => Err(ServerError::ServerStatus(status.as_u16())),
        }
    }

    /// Resolve the next item in the series this episode belongs to.
    /// Returns None at the end of the series (or for anything non-serial).
    pub async fn next_episode(&self, media_id: &str) -> Result<Option<EpisodeRef>, ServerError> {
        let endpoint = format!("/api/next-episode/{}", urlencoding::encode(media_id));
        let response: NextEpisodeResponse = self.get(&endpoint).await?;
        Ok(response.next_episode.map(|raw| raw.into_episode()))
    }
}

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

/// Host/port for building stream URLs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkInfo {
    pub network_ip: String,
    pub port: u16,
}

/// Saved position as the server reports it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SavedProgress {
    pub position: f64,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
struct NextEpisodeResponse {
    next_episode: Option<EpisodeRaw>,
}

#[derive(Debug, Deserialize)]
struct EpisodeRaw {
    id: serde_json::Value,
    season_number: u32,
    episode_number: u32,
    title: Option<String>,
}

impl EpisodeRaw {
    fn into_episode(self) -> EpisodeRef {
        // The server sends numeric ids for library items and string ids for
        // external ones; normalize both to a string key.
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        EpisodeRef {
            id,
            season_number: self.season_number,
            episode_number: self.episode_number,
            title: self.title.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_raw_string_id() {
        let raw = EpisodeRaw {
            id: serde_json::Value::String("e6".into()),
            season_number: 1,
            episode_number: 6,
            title: Some("Next".into()),
        };
        let ep = raw.into_episode();
        assert_eq!(ep.id, "e6");
        assert_eq!(ep.title, "Next");
    }

    #[test]
    fn test_episode_raw_numeric_id() {
        let raw = EpisodeRaw {
            id: serde_json::json!(42),
            season_number: 2,
            episode_number: 1,
            title: None,
        };
        let ep = raw.into_episode();
        assert_eq!(ep.id, "42");
        assert_eq!(ep.title, "");
    }

    #[test]
    fn test_next_episode_null_deserializes() {
        let response: NextEpisodeResponse =
            serde_json::from_str(r#"{"next_episode": null}"#).unwrap();
        assert!(response.next_episode.is_none());
    }

    // ---------------------------------------------------------------------
    // Endpoint contracts
    // ---------------------------------------------------------------------

    #[tokio::test]
    async fn test_network_info_contract() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/network-info")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"network_ip": "192.168.1.50", "port": 8000}"#)
            .create_async()
            .await;

        let client = ServerClient::new(server.url());
        let info = client.network_info().await.unwrap();
        assert_eq!(info.network_ip, "192.168.1.50");
        assert_eq!(info.port, 8000);
    }

    #[tokio::test]
    async fn test_load_progress_not_found_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/progress")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = ServerClient::new(server.url());
        let progress = client.load_progress(MediaType::Episode, "e5").await.unwrap();
        assert!(progress.is_none());
    }

    #[tokio::test]
    async fn test_load_progress_passes_type_and_id() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/progress")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("type".into(), "movie".into()),
                mockito::Matcher::UrlEncoded("media_id".into(), "movie-9".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"position": 55.0}"#)
            .create_async()
            .await;

        let client = ServerClient::new(server.url());
        let progress = client
            .load_progress(MediaType::Movie, "movie-9")
            .await
            .unwrap()
            .unwrap();
        // completed defaults to false when the server omits it
        assert!(!progress.completed);
        assert_eq!(progress.position, 55.0);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_next_episode_end_of_series() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/next-episode/e10")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"next_episode": null}"#)
            .create_async()
            .await;

        let client = ServerClient::new(server.url());
        assert!(client.next_episode("e10").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_taxonomy() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/network-info")
            .with_status(500)
            .create_async()
            .await;

        let client = ServerClient::new(server.url());
        let err = client.network_info().await.unwrap_err();
        assert!(matches!(err, ServerError::ServerStatus(500)));

        let unreachable = ServerClient::new("http://127.0.0.1:1");
        let err = unreachable.network_info().await.unwrap_err();
        assert!(matches!(err, ServerError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/network-info")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = ServerClient::new(server.url());
        let err = client.network_info().await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidResponse(_)));
    }
}

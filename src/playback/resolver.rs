//! Stream URL resolution
//!
//! A Chromecast fetches the stream itself, so the URL must use an address
//! reachable from the receiver's network, never localhost. The server's
//! network-info endpoint is the preferred source; local interface discovery
//! is the fallback when it is unreachable.

use crate::api::ServerClient;

/// Resolves LAN-reachable stream URLs for media ids
#[derive(Debug)]
pub struct StreamUrlResolver {
    client: ServerClient,
    fallback_port: u16,
    // (host, port) cached for the lifetime of one playback session
    endpoint: Option<(String, u16)>,
}

impl StreamUrlResolver {
    pub fn new(client: ServerClient, fallback_port: u16) -> Self {
        Self {
            client,
            fallback_port,
            endpoint: None,
        }
    }

    /// Build the stream URL for a media item
    pub async fn resolve(&mut self, media_id: &str) -> String {
        let (host, port) = self.endpoint().await;
        format!(
            "http://{}:{}/api/video-stream/{}",
            host,
            port,
            urlencoding::encode(media_id)
        )
    }

    async fn endpoint(&mut self) -> (String, u16) {
        if let Some(endpoint) = &self.endpoint {
            return endpoint.clone();
        }

        let endpoint = match self.client.network_info().await {
            Ok(info) => (info.network_ip, info.port),
            Err(e) => {
                tracing::warn!("network-info unavailable ({}), using local interface", e);
                let host = match local_ip_address::local_ip() {
                    Ok(ip) => ip.to_string(),
                    Err(e) => {
                        tracing::warn!("local interface discovery failed: {}", e);
                        "127.0.0.1".to_string()
                    }
                };
                (host, self.fallback_port)
            }
        };

        self.endpoint = Some(endpoint.clone());
        endpoint
    }
}

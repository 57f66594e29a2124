use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{LuminaError, Result};
use crate::types::{GeneratedImage, GenerationRequest, HealthStatus, DEFAULT_API_URL};

fn normalize(endpoint: &str) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Anything that can turn a [`GenerationRequest`] into an image.
///
/// [`LuminaClient`] is the HTTP implementation. The form controller is
/// generic over this trait so hosts and tests can substitute their own.
pub trait ImageGenerator: Send + Sync {
    /// Generate one image from `request` against the service at `api_url`.
    fn generate(
        &self,
        api_url: &str,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GeneratedImage>> + Send;

    /// Base URL a new form should start with.
    fn default_api_url(&self) -> &str {
        DEFAULT_API_URL
    }
}

/// Async client for a Lumina text-to-image service.
///
/// # Example
/// ```no_run
/// use lumina_client::{GenerationRequest, LuminaClient};
///
/// # async fn example() -> lumina_client::Result<()> {
/// let client = LuminaClient::new("http://localhost:8000");
/// let image = client.generate(&GenerationRequest::new("a red fox in snow")).await?;
/// image.save_to("fox.png").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LuminaClient {
    http: Client,
    endpoint: String,
    timeout: Option<Duration>,
}

impl LuminaClient {
    /// Create a new client pointing at the given service base URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(&endpoint.into()),
            timeout: None,
        }
    }

    /// Create a client from a [`ClientConfig`].
    pub fn from_config(config: &ClientConfig) -> Self {
        let client = Self::new(config.api_url.clone());
        match config.timeout {
            Some(timeout) => client.with_timeout(timeout),
            None => client,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Apply a per-request transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn apply_timeout(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    // ── Health ──────────────────────────────────────────────────────

    /// Query `GET /health` on the configured endpoint.
    pub async fn health(&self) -> Result<HealthStatus> {
        self.health_at(&self.endpoint).await
    }

    /// Query `GET /health` on an arbitrary base URL.
    pub async fn health_at(&self, api_url: &str) -> Result<HealthStatus> {
        let url = format!("{}/health", normalize(api_url));
        let resp = self
            .apply_timeout(self.http.get(&url))
            .send()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "cannot connect to Lumina health endpoint");
                LuminaError::Network(e)
            })?;

        if !resp.status().is_success() {
            return Err(LuminaError::Http {
                status: resp.status().as_u16(),
            });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            LuminaError::InvalidResponse(format!("Malformed health response: {}", e))
        })
    }

    // ── Generation ──────────────────────────────────────────────────

    /// Generate an image using the configured endpoint.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        self.generate_at(&self.endpoint, request).await
    }

    /// `POST {api_url}/generate` with `request` as the JSON body.
    ///
    /// Any 2xx response body is taken as the image. Other statuses map to
    /// [`LuminaError::Http`]; transport failures to [`LuminaError::Network`].
    pub async fn generate_at(
        &self,
        api_url: &str,
        request: &GenerationRequest,
    ) -> Result<GeneratedImage> {
        let url = format!("{}/generate", normalize(api_url));
        debug!(%url, seed = ?request.seed, "dispatching generation request");

        let resp = self
            .apply_timeout(self.http.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "generation request failed to complete");
                LuminaError::Network(e)
            })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "generation rejected by service");
            return Err(LuminaError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = resp.bytes().await.map_err(|e| {
            warn!(%url, error = %e, "failed to read image bytes");
            LuminaError::Network(e)
        })?;

        let image = GeneratedImage::new(bytes, content_type);
        debug!(id = image.id, len = image.len(), "received generated image");
        Ok(image)
    }
}

impl ImageGenerator for LuminaClient {
    fn generate(
        &self,
        api_url: &str,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GeneratedImage>> + Send {
        self.generate_at(api_url, request)
    }

    fn default_api_url(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize("http://localhost:8000/"), "http://localhost:8000");
        assert_eq!(normalize("http://localhost:8000"), "http://localhost:8000");
        assert_eq!(normalize("http://host:8000///"), "http://host:8000");
    }

    #[test]
    fn test_client_builder() {
        let client = LuminaClient::new("http://127.0.0.1:8000/")
            .with_timeout(Duration::from_secs(30));
        assert_eq!(client.endpoint(), "http://127.0.0.1:8000");
        assert_eq!(client.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig::default();
        let client = LuminaClient::from_config(&config);
        assert_eq!(client.endpoint(), DEFAULT_API_URL);
        assert!(client.timeout.is_none());

        let config = ClientConfig::builder()
            .with_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(
            LuminaClient::from_config(&config).timeout,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_default_api_url_is_endpoint() {
        let client = LuminaClient::new("http://localhost:8000/");
        assert_eq!(ImageGenerator::default_api_url(&client), "http://localhost:8000");
    }
}

use std::time::Duration;

use crate::types::{DEFAULT_API_URL, DOWNLOAD_FILENAME};

/// Configuration for the client and the form it backs.
///
/// Use [`ClientConfig::builder()`] for ergonomic construction, or
/// [`ClientConfig::default()`] for the production endpoint with no timeout.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL the form starts with. Requests go to `{api_url}/generate`.
    pub api_url: String,

    /// Transport-level request timeout. `None` leaves it to the network stack.
    pub timeout: Option<Duration>,

    /// File name suggested by the download action.
    pub download_filename: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: None,
            download_filename: DOWNLOAD_FILENAME.to_string(),
        }
    }
}

impl ClientConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the initial API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set a transport timeout applied to every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the file name offered when saving a result.
    pub fn with_download_filename(mut self, name: impl Into<String>) -> Self {
        self.config.download_filename = name.into();
        self
    }

    /// Build the final [`ClientConfig`].
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "https://lumina-backend-cwms2mqttq-el.a.run.app");
        assert_eq!(config.timeout, None);
        assert_eq!(config.download_filename, "lumina-generated-image.png");
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .with_api_url("http://localhost:8000")
            .with_timeout(Duration::from_secs(600))
            .with_download_filename("out.png")
            .build();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.download_filename, "out.png");
    }
}

// HTTP relay for stream downloads
//
// Media hosts often refuse direct requests; a relay prefix (for example
// "https://relay.example/?url=") gets the target URL appended percent-encoded.
// Without a prefix the stream is fetched directly.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::NetworkSettings;
use crate::pipeline::traits::Relay;
use crate::pipeline::PreviewError;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

pub struct HttpRelay {
    client: reqwest::Client,
    prefix: Option<String>,
}

impl HttpRelay {
    pub fn new(settings: &NetworkSettings) -> Result<Self, PreviewError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.fetch_timeout_secs))
            .user_agent(USER_AGENT);

        if let Some(proxy_url) = settings.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                PreviewError::Config(format!("Invalid proxy URL {}: {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        } else {
            // Only the configured proxy applies, never one from the environment
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| PreviewError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let prefix = settings
            .relay_url
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(Self { client, prefix })
    }

    /// URL actually requested for `url`
    pub fn relay_target(&self, url: &str) -> String {
        match &self.prefix {
            Some(prefix) => {
                let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
                format!("{}{}", prefix, encoded)
            }
            None => url.to_string(),
        }
    }
}

#[async_trait]
impl Relay for HttpRelay {
    fn name(&self) -> &'static str {
        if self.prefix.is_some() {
            "http-relay"
        } else {
            "direct"
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PreviewError> {
        let target = self.relay_target(url);
        tracing::debug!("[Relay] GET {}", target);

        let response = self.client.get(&target).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PreviewError::Fetch(format!(
                "relay responded with status {}",
                status.as_u16()
            )));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

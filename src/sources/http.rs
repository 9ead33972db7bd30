use async_trait::async_trait;
use crate::dsl::ExtensionData;
use crate::sources::ExtensionSource;
use anyhow::{Result, Context as AnyhowContext};
use reqwest::Client;

/// Fetches `GET <base_url>/<name>.json`.
#[derive(Debug, Clone)]
pub struct HttpExtensionSource {
    client: Client,
    base_url: String,
}

impl HttpExtensionSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}.json", self.base_url, name)
    }
}

#[async_trait]
impl ExtensionSource for HttpExtensionSource {
    async fn fetch(&self, name: &str) -> Result<ExtensionData> {
        let url = self.url_for(name);
        let response = self.client.get(&url).send().await
            .with_context(|| format!("Request failed: {}", url))?
            .error_for_status()
            .with_context(|| format!("Bad status from {}", url))?;

        let data = response.json::<ExtensionData>().await
            .with_context(|| format!("Invalid extension payload from {}", url))?;
        Ok(data)
    }
}

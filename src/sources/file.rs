use async_trait::async_trait;
use crate::dsl::ExtensionData;
use crate::sources::ExtensionSource;
use anyhow::{Result, Context as AnyhowContext, anyhow, bail};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Reads `<root>/<name>.yaml`, `.yml` or `.json`. Names may contain `/`.
#[derive(Debug, Clone)]
pub struct DirectoryExtensionSource {
    root: PathBuf,
}

impl DirectoryExtensionSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn candidates(&self, name: &str) -> Result<Vec<PathBuf>> {
        let relative = Path::new(name);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("Invalid extension name: {}", name);
        }
        Ok(["yaml", "yml", "json"]
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")))
            .collect())
    }
}

#[async_trait]
impl ExtensionSource for DirectoryExtensionSource {
    async fn fetch(&self, name: &str) -> Result<ExtensionData> {
        for path in self.candidates(name)? {
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }
            debug!(path = %path.display(), "Reading extension");
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read extension file {}", path.display()))?;

            let data: ExtensionData = if path.extension().and_then(|e| e.to_str()) == Some("json") {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse JSON extension {}", path.display()))?
            } else {
                serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse YAML extension {}", path.display()))?
            };
            return Ok(data);
        }
        Err(anyhow!("Extension not found under {}: {}", self.root.display(), name))
    }
}

use async_trait::async_trait;
use crate::dsl::ExtensionData;
use crate::sources::ExtensionSource;
use anyhow::{Result, anyhow};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-process source. Counts fetches so callers can observe caching.
#[derive(Debug, Default)]
pub struct MemoryExtensionSource {
    extensions: DashMap<String, ExtensionData>,
    fetches: AtomicUsize,
}

impl MemoryExtensionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, data: ExtensionData) -> Self {
        self.insert(name, data);
        self
    }

    pub fn insert(&self, name: &str, data: ExtensionData) {
        self.extensions.insert(name.to_string(), data);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtensionSource for MemoryExtensionSource {
    async fn fetch(&self, name: &str) -> Result<ExtensionData> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.extensions
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow!("Extension not found: {}", name))
    }
}

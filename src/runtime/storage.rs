use crate::dsl::{ExtensionData, ExtensionTable};
use dashmap::DashMap;
use std::sync::Arc;

/// Fetched extensions keyed by name, shared by every pass of one session.
///
/// Entries are immutable once stored; a second `put` for the same name simply
/// replaces the first.
#[derive(Debug, Default)]
pub struct ExtensionCache {
    entries: DashMap<String, Arc<ExtensionData>>,
}

impl ExtensionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ExtensionData>> {
        self.entries.get(name).map(|entry| entry.value().clone())
    }

    pub fn put(&self, name: &str, data: ExtensionData) -> Arc<ExtensionData> {
        let data = Arc::new(data);
        self.entries.insert(name.to_string(), data.clone());
        data
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Drops one entry so the next pass fetches it again.
    pub fn invalidate(&self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the cached entries among `names`.
    pub fn table_for(&self, names: &[String]) -> ExtensionTable {
        let mut table = ExtensionTable::new();
        for name in names {
            if let Some(data) = self.get(name) {
                table.insert(name.clone(), data);
            }
        }
        table
    }
}

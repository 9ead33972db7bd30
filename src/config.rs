use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Maximum number of distinct terminal outputs returned for one composition.
pub const DEFAULT_TERMINAL_OUTPUT_CAP: usize = 50;

/// Consecutive duplicate combinations tolerated before terminal aggregation gives up.
pub const DEFAULT_TERMINAL_DUPLICATE_LIMIT: usize = 10_000;

pub const DEFAULT_SAMPLE_SIZE: u64 = 8;

/// Session-level knobs. Every field has a default so a partial YAML file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComposerConfig {
    pub terminal_output_cap: usize,
    pub terminal_duplicate_limit: usize,
    /// Shared bucket size. 0 disables bucketing.
    pub ext_bucket_max: u64,
    /// Per-wildcard bucket sizes, taking precedence over `ext_bucket_max`.
    pub wildcard_bucket_max: HashMap<String, u64>,
    pub sample_size: u64,
    pub extension_dir: Option<PathBuf>,
    pub extension_url: Option<String>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            terminal_output_cap: DEFAULT_TERMINAL_OUTPUT_CAP,
            terminal_duplicate_limit: DEFAULT_TERMINAL_DUPLICATE_LIMIT,
            ext_bucket_max: 0,
            wildcard_bucket_max: HashMap::new(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            extension_dir: None,
            extension_url: None,
        }
    }
}

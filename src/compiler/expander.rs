use crate::compiler::codec;
use crate::config::{DEFAULT_TERMINAL_DUPLICATE_LIMIT, DEFAULT_TERMINAL_OUTPUT_CAP};
use crate::dsl::{leaf_paths, BlockNode, BlockPath};
use crate::runtime::resolver::TreeResolution;
use crate::runtime::text;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// One leaf-per-root combination, joined into final text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalOutput {
    pub label: String,
    pub text: String,
}

/// 将多个独立根节点的叶子做笛卡尔积，展开成最终输出
pub struct Expander {
    cap: usize,
    duplicate_limit: usize,
}

impl Expander {
    pub fn new() -> Self {
        Self {
            cap: DEFAULT_TERMINAL_OUTPUT_CAP,
            duplicate_limit: DEFAULT_TERMINAL_DUPLICATE_LIMIT,
        }
    }

    pub fn with_limits(cap: usize, duplicate_limit: usize) -> Self {
        Self {
            cap,
            duplicate_limit,
        }
    }

    /// Root-major, leaf-minor order. First label wins when texts collide.
    ///
    /// Leaves of one root that render the same text are collapsed to the
    /// first of them before the product is taken; a later twin can only
    /// repeat a combination already produced. The scan stops at the cap, at
    /// the end of the product, or after `duplicate_limit` candidates in a row
    /// that produced nothing new.
    pub fn expand(&self, roots: &[BlockNode], resolved: &TreeResolution) -> Vec<TerminalOutput> {
        let paths = leaf_paths(roots);
        let leaves: Vec<Vec<(&BlockPath, &str)>> = paths
            .iter()
            .map(|root_leaves| distinct_leaves(root_leaves, resolved))
            .collect();
        if leaves.is_empty() || self.cap == 0 {
            return Vec::new();
        }

        // Each root contributes one wheel; root 0 is the most significant.
        let sizes: Vec<u64> = leaves.iter().map(|l| l.len() as u64).collect();
        let combinations = codec::checked_product(&sizes).unwrap_or(u64::MAX);

        let mut outputs = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut duplicate_run = 0usize;

        for combination in 0..combinations {
            let picks = codec::decode(combination, &sizes);

            let mut candidate = String::new();
            let mut labels = Vec::with_capacity(picks.len());
            for (root_leaves, &pick) in leaves.iter().zip(&picks) {
                let (path, leaf_text) = root_leaves[pick as usize];
                candidate = text::join(&candidate, leaf_text);
                labels.push(path.to_string());
            }

            if !seen.insert(candidate.clone()) {
                duplicate_run += 1;
                if duplicate_run >= self.duplicate_limit {
                    warn!(
                        examined = combination + 1,
                        combinations,
                        produced = outputs.len(),
                        "Terminal expansion stopped after a run of duplicate outputs"
                    );
                    break;
                }
                continue;
            }

            duplicate_run = 0;
            outputs.push(TerminalOutput {
                label: labels.join(" + "),
                text: candidate,
            });
            if outputs.len() >= self.cap {
                break;
            }
        }

        outputs
    }
}

fn distinct_leaves<'a>(root_leaves: &'a [BlockPath], resolved: &'a TreeResolution) -> Vec<(&'a BlockPath, &'a str)> {
    let mut seen = HashSet::new();
    root_leaves
        .iter()
        .map(|path| (path, resolved.accumulated(path).unwrap_or("")))
        .filter(|(_, leaf_text)| seen.insert(*leaf_text))
        .collect()
}

impl Default for Expander {
    fn default() -> Self {
        Self::new()
    }
}

pub fn compute_terminal_outputs(roots: &[BlockNode], resolved: &TreeResolution) -> Vec<TerminalOutput> {
    Expander::new().expand(roots, resolved)
}

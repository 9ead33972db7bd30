pub mod builder;

use crate::error::CompositionError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Scope key that applies an override to every block.
pub const GLOBAL_SCOPE: &str = "*";

/// 原始 DSL 定义的 Prompt 文档
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub wildcards: WildcardTable,
    #[serde(default)]
    pub blocks: Vec<BlockNode>,
    #[serde(default)]
    pub overrides: Overrides,
}

/// 节点类型：字面文本，或者引用外部扩展文本
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Content {
        text: String,
    },
    ExtensionRef {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_per_bucket: Option<u64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockNode {
    #[serde(flatten)]
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<BlockNode>,
}

impl BlockNode {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Content { text: text.into() },
            after: Vec::new(),
        }
    }

    pub fn extension(name: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::ExtensionRef {
                name: name.into(),
                max_per_bucket: None,
            },
            after: Vec::new(),
        }
    }

    pub fn with_after(mut self, children: Vec<BlockNode>) -> Self {
        self.after = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.after.is_empty()
    }
}

/// Pre-order walk over every node, root by root, in document order.
pub fn walk<'a>(roots: &'a [BlockNode], mut visit: impl FnMut(&BlockPath, &'a BlockNode)) {
    fn go<'a>(
        nodes: &'a [BlockNode],
        prefix: &mut Vec<usize>,
        visit: &mut dyn FnMut(&BlockPath, &'a BlockNode),
    ) {
        for (i, node) in nodes.iter().enumerate() {
            prefix.push(i);
            visit(&BlockPath(prefix.clone()), node);
            go(&node.after, prefix, visit);
            prefix.pop();
        }
    }
    go(roots, &mut Vec::new(), &mut visit);
}

/// Distinct extension names referenced anywhere in the tree, first reference first.
pub fn referenced_extensions(roots: &[BlockNode]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    walk(roots, |_, node| {
        if let BlockKind::ExtensionRef { name, .. } = &node.kind {
            if !names.iter().any(|n| n == name) {
                names.push(name.clone());
            }
        }
    });
    names
}

/// First `max_per_bucket` declared on an extension reference, in document order.
pub fn declared_bucket_max(roots: &[BlockNode]) -> Option<u64> {
    let mut found = None;
    walk(roots, |_, node| {
        if found.is_none() {
            if let BlockKind::ExtensionRef {
                max_per_bucket: Some(max),
                ..
            } = &node.kind
            {
                found = Some(*max);
            }
        }
    });
    found
}

/// Leaf paths of every root, one list per root.
pub fn leaf_paths(roots: &[BlockNode]) -> Vec<Vec<BlockPath>> {
    let mut per_root: Vec<Vec<BlockPath>> = vec![Vec::new(); roots.len()];
    walk(roots, |path, node| {
        if node.is_leaf() {
            per_root[path.root()].push(path.clone());
        }
    });
    per_root
}

/// Dotted position of a node, e.g. `0.1.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BlockPath(pub Vec<usize>);

impl BlockPath {
    pub fn root(&self) -> usize {
        self.0.first().copied().unwrap_or(0)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for BlockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl FromStr for BlockPath {
    type Err = CompositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Only canonical indices, so parsing and display agree
        let canonical = |part: &str| {
            !part.is_empty()
                && part.bytes().all(|b| b.is_ascii_digit())
                && (part == "0" || !part.starts_with('0'))
        };
        if !s.split('.').all(canonical) {
            return Err(CompositionError::InvalidPath(s.to_string()));
        }
        s.split('.')
            .map(|part| part.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map(BlockPath)
            .map_err(|_| CompositionError::InvalidPath(s.to_string()))
    }
}

impl From<BlockPath> for String {
    fn from(path: BlockPath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for BlockPath {
    type Error = CompositionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Wildcard name -> ordered values. Value order defines index 0..n-1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WildcardTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl WildcardTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.entries.insert(name.into(), values);
    }

    /// Inserts only when `name` is not defined yet. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, name: &str, values: &[String]) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), values.to_vec());
        true
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(|v| v.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn index_of(&self, name: &str, value: &str) -> Option<usize> {
        self.get(name)?.iter().position(|v| v == value)
    }

    /// Names in ascending lexicographic order.
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.entries
            .iter()
            .map(|(name, values)| (name.clone(), values.len() as u64))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, Vec<V>)> for WildcardTable {
    fn from_iter<T: IntoIterator<Item = (N, Vec<V>)>>(iter: T) -> Self {
        let mut table = WildcardTable::new();
        for (name, values) in iter {
            table.insert(name, values.into_iter().map(Into::into).collect());
        }
        table
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WildcardDef {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Payload of one extension, as delivered by an [`crate::sources::ExtensionSource`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtensionData {
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub wildcards: Vec<WildcardDef>,
}

impl ExtensionData {
    pub fn with_values<V: Into<String>>(values: Vec<V>) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            wildcards: Vec::new(),
        }
    }

    pub fn wildcard(mut self, name: &str, values: &[&str]) -> Self {
        self.wildcards.push(WildcardDef {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }
}

/// Extension snapshot used by one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct ExtensionTable {
    entries: HashMap<String, Arc<ExtensionData>>,
}

impl ExtensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Arc<ExtensionData>>) {
        self.entries.insert(name.into(), data.into());
    }

    pub fn get(&self, name: &str) -> Option<&ExtensionData> {
        self.entries.get(name).map(|d| d.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

type RawOverrides = BTreeMap<String, BTreeMap<String, String>>;

/// User-pinned wildcard values, scoped to a block path or to every block (`*`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawOverrides", into = "RawOverrides")]
pub struct Overrides {
    global: BTreeMap<String, String>,
    blocks: BTreeMap<BlockPath, BTreeMap<String, String>>,
    // Keys that are neither `*` nor a valid path. Kept so they round-trip.
    malformed: RawOverrides,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `name` to `value` under `scope` (`*` or a dotted path).
    pub fn pin(&mut self, scope: &str, name: impl Into<String>, value: impl Into<String>) {
        if scope == GLOBAL_SCOPE {
            self.global.insert(name.into(), value.into());
            return;
        }
        match scope.parse::<BlockPath>() {
            Ok(path) => {
                self.blocks
                    .entry(path)
                    .or_default()
                    .insert(name.into(), value.into());
            }
            Err(_) => {
                self.malformed
                    .entry(scope.to_string())
                    .or_default()
                    .insert(name.into(), value.into());
            }
        }
    }

    pub fn pin_global(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.global.insert(name.into(), value.into());
    }

    /// Block-specific pin first, then the global one.
    pub fn lookup(&self, path: &BlockPath, name: &str) -> Option<&str> {
        self.blocks
            .get(path)
            .and_then(|pins| pins.get(name))
            .or_else(|| self.global.get(name))
            .map(|v| v.as_str())
    }

    pub fn block_paths(&self) -> impl Iterator<Item = &BlockPath> {
        self.blocks.keys()
    }

    pub fn malformed_scopes(&self) -> impl Iterator<Item = &str> {
        self.malformed.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.blocks.is_empty() && self.malformed.is_empty()
    }

    /// Layers `other` on top of `self`; `other` wins on conflicts.
    pub fn merged_with(&self, other: &Overrides) -> Overrides {
        let mut merged = self.clone();
        for (name, value) in &other.global {
            merged.global.insert(name.clone(), value.clone());
        }
        for (path, pins) in &other.blocks {
            let entry = merged.blocks.entry(path.clone()).or_default();
            for (name, value) in pins {
                entry.insert(name.clone(), value.clone());
            }
        }
        for (scope, pins) in &other.malformed {
            merged
                .malformed
                .entry(scope.clone())
                .or_default()
                .extend(pins.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }
}

impl From<RawOverrides> for Overrides {
    fn from(raw: RawOverrides) -> Self {
        let mut overrides = Overrides::new();
        for (scope, pins) in raw {
            for (name, value) in pins {
                overrides.pin(&scope, name, value);
            }
        }
        overrides
    }
}

impl From<Overrides> for RawOverrides {
    fn from(overrides: Overrides) -> Self {
        let mut raw = overrides.malformed;
        if !overrides.global.is_empty() {
            raw.insert(GLOBAL_SCOPE.to_string(), overrides.global);
        }
        for (path, pins) in overrides.blocks {
            raw.insert(path.to_string(), pins);
        }
        raw
    }
}

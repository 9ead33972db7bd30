use crate::compiler::codec::DecodedIndices;
use crate::dsl::{BlockKind, BlockNode, BlockPath, ExtensionTable, Overrides, WildcardTable};
use crate::runtime::context::ResolutionContext;
use crate::runtime::text;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Recoverable conditions found during a pass. Resolution always continues.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Referenced extension has no values; its blocks render a placeholder.
    EmptyExtension { name: String },
    /// Referenced extension is absent from the table (not fetched).
    MissingExtension { name: String },
    /// Token names a wildcard that is not in the table; left verbatim.
    UnknownWildcard { path: BlockPath, name: String },
    /// Wildcard exists but has no values; token left verbatim.
    EmptyWildcard { path: BlockPath, name: String },
    /// Override scoped to a path that is not in the tree.
    UnmatchedOverride { scope: String },
    /// Override scope is neither `*` nor a dotted path.
    MalformedOverridePath { scope: String },
}

impl Diagnostic {
    /// Key used to report each condition only once per session.
    pub fn subject(&self) -> String {
        match self {
            Diagnostic::EmptyExtension { name } | Diagnostic::MissingExtension { name } => {
                format!("ext:{name}")
            }
            Diagnostic::UnknownWildcard { name, .. } | Diagnostic::EmptyWildcard { name, .. } => {
                format!("wc:{name}")
            }
            Diagnostic::UnmatchedOverride { scope } | Diagnostic::MalformedOverridePath { scope } => {
                format!("scope:{scope}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WildcardChoice {
    pub name: String,
    pub value: String,
    pub index: usize,
    pub is_override: bool,
}

/// Every value of one wildcard, overrides notwithstanding, plus the chosen one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dropdown {
    pub name: String,
    pub available_values: Vec<String>,
    pub chosen_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Resolution {
    /// Resolved text with `«name=value»` markers.
    pub marked_text: String,
    pub plain_text: String,
    /// Own text joined after every ancestor's text, back to the root.
    pub accumulated_text: String,
    pub parent_accumulated_text: String,
    pub choices: Vec<WildcardChoice>,
    pub dropdowns: Vec<Dropdown>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TreeResolution {
    pub composition_id: u64,
    pub ext_index: u64,
    pub resolutions: BTreeMap<BlockPath, Resolution>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TreeResolution {
    pub fn get(&self, path: &BlockPath) -> Option<&Resolution> {
        self.resolutions.get(path)
    }

    pub fn accumulated(&self, path: &BlockPath) -> Option<&str> {
        self.get(path).map(|r| r.accumulated_text.as_str())
    }
}

/// Resolves every node of `roots` under `composition_id`.
pub fn resolve_tree(
    roots: &[BlockNode],
    wildcards: &WildcardTable,
    extensions: &ExtensionTable,
    composition_id: u64,
    overrides: &Overrides,
) -> TreeResolution {
    let ctx = ResolutionContext::prepare(roots, wildcards, extensions);
    TreeResolver::new(&ctx, overrides, composition_id).run(roots)
}

pub struct TreeResolver<'c, 'a> {
    ctx: &'c ResolutionContext<'a>,
    overrides: &'c Overrides,
    composition_id: u64,
    decoded: DecodedIndices,
    resolutions: BTreeMap<BlockPath, Resolution>,
    diagnostics: Vec<Diagnostic>,
}

impl<'c, 'a> TreeResolver<'c, 'a> {
    pub fn new(ctx: &'c ResolutionContext<'a>, overrides: &'c Overrides, composition_id: u64) -> Self {
        Self {
            ctx,
            overrides,
            composition_id,
            decoded: ctx.dimensions.decode(composition_id),
            resolutions: BTreeMap::new(),
            diagnostics: ctx.diagnostics.clone(),
        }
    }

    pub fn run(mut self, roots: &[BlockNode]) -> TreeResolution {
        debug!(
            composition_id = self.composition_id,
            ext_index = self.decoded.ext_index,
            ext_count = self.ctx.ext_count,
            wildcards = self.ctx.wildcards.len(),
            "Resolving block tree"
        );

        let mut prefix = Vec::new();
        self.resolve_nodes(roots, &mut prefix, "");
        self.check_overrides();

        TreeResolution {
            composition_id: self.composition_id,
            ext_index: self.decoded.ext_index,
            resolutions: self.resolutions,
            diagnostics: self.diagnostics,
        }
    }

    fn resolve_nodes(&mut self, nodes: &[BlockNode], prefix: &mut Vec<usize>, parent_acc: &str) {
        for (i, node) in nodes.iter().enumerate() {
            prefix.push(i);
            let path = BlockPath(prefix.clone());
            let resolution = self.resolve_node(&path, node, parent_acc);
            let accumulated = resolution.accumulated_text.clone();
            self.resolutions.insert(path, resolution);
            self.resolve_nodes(&node.after, prefix, &accumulated);
            prefix.pop();
        }
    }

    fn raw_text(&self, node: &BlockNode) -> String {
        match &node.kind {
            BlockKind::Content { text } => text.clone(),
            BlockKind::ExtensionRef { name, .. } => match self.ctx.extensions.get(name) {
                Some(data) if !data.values.is_empty() => {
                    // One ext_text index shared by every extension block of the pass.
                    let len = data.values.len() as u64;
                    data.values[(self.decoded.ext_index % len) as usize].clone()
                }
                Some(_) => format!("[empty extension: {name}]"),
                None => format!("[missing extension: {name}]"),
            },
        }
    }

    fn resolve_node(&mut self, path: &BlockPath, node: &BlockNode, parent_acc: &str) -> Resolution {
        let raw = self.raw_text(node);

        let mut choices: Vec<WildcardChoice> = Vec::new();
        for name in text::token_names(&raw) {
            if let Some(choice) = self.choose(path, name) {
                choices.push(choice);
            }
        }

        let find = |name: &str| choices.iter().find(|c| c.name == name);
        let marked_text = text::substitute(&raw, |name| find(name).map(|c| text::marker(name, &c.value)));
        let plain_text = text::substitute(&raw, |name| find(name).map(|c| c.value.clone()));
        let accumulated_text = text::join(parent_acc, &plain_text);

        let mut dropdowns: Vec<Dropdown> = choices
            .iter()
            .filter_map(|choice| {
                let values = self.ctx.wildcards.get(&choice.name)?;
                Some(Dropdown {
                    name: choice.name.clone(),
                    available_values: values.to_vec(),
                    chosen_index: choice.index,
                })
            })
            .collect();
        dropdowns.sort_by(|a, b| a.name.cmp(&b.name));

        Resolution {
            marked_text,
            plain_text,
            accumulated_text,
            parent_accumulated_text: parent_acc.to_string(),
            choices,
            dropdowns,
        }
    }

    /// Block override, then global override, then the composition index.
    fn choose(&mut self, path: &BlockPath, name: &str) -> Option<WildcardChoice> {
        if let Some(value) = self.overrides.lookup(path, name) {
            return Some(WildcardChoice {
                name: name.to_string(),
                value: value.to_string(),
                index: self.ctx.wildcards.index_of(name, value).unwrap_or(0),
                is_override: true,
            });
        }

        let Some(values) = self.ctx.wildcards.get(name) else {
            self.diagnostics.push(Diagnostic::UnknownWildcard {
                path: path.clone(),
                name: name.to_string(),
            });
            return None;
        };
        if values.is_empty() {
            self.diagnostics.push(Diagnostic::EmptyWildcard {
                path: path.clone(),
                name: name.to_string(),
            });
            return None;
        }

        let raw_index = self.decoded.wildcard_indices.get(name).copied().unwrap_or(0);
        let index = (raw_index % values.len() as u64) as usize;
        Some(WildcardChoice {
            name: name.to_string(),
            value: values[index].clone(),
            index,
            is_override: false,
        })
    }

    fn check_overrides(&mut self) {
        let overrides = self.overrides;
        let unmatched: Vec<String> = overrides
            .block_paths()
            .filter(|path| !self.resolutions.contains_key(*path))
            .map(|path| path.to_string())
            .collect();
        for scope in unmatched {
            self.diagnostics.push(Diagnostic::UnmatchedOverride { scope });
        }
        for scope in overrides.malformed_scopes() {
            self.diagnostics.push(Diagnostic::MalformedOverridePath {
                scope: scope.to_string(),
            });
        }
    }
}

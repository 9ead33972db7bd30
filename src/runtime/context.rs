use crate::compiler::codec::Dimensions;
use crate::dsl::{referenced_extensions, BlockNode, ExtensionTable, WildcardTable};
use crate::runtime::resolver::Diagnostic;

/// 解析上下文 (Resolution Context)
/// 每次解析都重新构建：引用到的扩展、合并后的 wildcard 表、维度列表
#[derive(Debug, Clone)]
pub struct ResolutionContext<'a> {
    pub extensions: &'a ExtensionTable,
    pub wildcards: WildcardTable,
    /// Distinct extension names in first-reference order.
    pub referenced: Vec<String>,
    /// Sum of value counts of the referenced extensions (0 when none).
    pub ext_count: u64,
    pub dimensions: Dimensions,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> ResolutionContext<'a> {
    pub fn prepare(
        roots: &[BlockNode],
        explicit: &WildcardTable,
        extensions: &'a ExtensionTable,
    ) -> Self {
        let referenced = referenced_extensions(roots);
        let mut diagnostics = Vec::new();

        // 1. ext_text dimension size
        let mut ext_count = 0u64;
        for name in &referenced {
            match extensions.get(name) {
                Some(data) if data.values.is_empty() => {
                    diagnostics.push(Diagnostic::EmptyExtension { name: name.clone() });
                }
                Some(data) => ext_count += data.values.len() as u64,
                None => diagnostics.push(Diagnostic::MissingExtension { name: name.clone() }),
            }
        }

        // 2. Merge wildcards: explicit first, extensions only fill gaps
        let wildcards = merge_wildcards(explicit, &referenced, extensions);

        let dimensions = Dimensions::new(ext_count, wildcards.counts());

        Self {
            extensions,
            wildcards,
            referenced,
            ext_count,
            dimensions,
            diagnostics,
        }
    }
}

/// Explicit wildcards win; each referenced extension then contributes the
/// names not defined yet, first definition wins.
pub fn merge_wildcards(
    explicit: &WildcardTable,
    referenced: &[String],
    extensions: &ExtensionTable,
) -> WildcardTable {
    let mut merged = explicit.clone();
    for name in referenced {
        if let Some(data) = extensions.get(name) {
            for def in &data.wildcards {
                merged.insert_if_absent(&def.name, &def.values);
            }
        }
    }
    merged
}

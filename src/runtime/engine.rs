use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use dashmap::DashMap;
use anyhow::{Result, Context as AnyhowContext};
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::compiler::bucket::{self, BucketLayout};
use crate::compiler::codec::Dimensions;
use crate::compiler::expander::{Expander, TerminalOutput};
use crate::config::ComposerConfig;
use crate::dsl::{declared_bucket_max, referenced_extensions, ExtensionData, ExtensionTable, Overrides, PromptDocument};
use crate::runtime::context::ResolutionContext;
use crate::runtime::resolver::{Diagnostic, TreeResolution, TreeResolver};
use crate::runtime::sampler::{self, ValueSelection};
use crate::runtime::storage::ExtensionCache;
use crate::sources::ExtensionSource;

/// Result of one resolution pass.
///
/// `sequence` grows with every pass started on the engine. Callers that fire
/// overlapping passes keep the result with the highest sequence.
/// `total_compositions` is `None` when the space does not fit in a `u64`.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionPass {
    pub sequence: u64,
    pub composition_id: u64,
    pub total_compositions: Option<u64>,
    pub dimensions: Dimensions,
    pub tree: TreeResolution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exploration {
    pub composition_id: u64,
    pub outputs: Vec<TerminalOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositionTotals {
    pub total: u64,
    pub effective_total: u64,
    pub bucketed: bool,
}

/// 编辑会话：持有扩展缓存与来源，按需解析
pub struct Engine {
    source: Arc<dyn ExtensionSource>,
    cache: Arc<ExtensionCache>,
    config: ComposerConfig,
    // Subjects already reported, so each diagnostic is logged once per session.
    warned: DashMap<String, ()>,
    passes: AtomicU64,
}

impl Engine {
    pub fn new(source: Arc<dyn ExtensionSource>) -> Self {
        Self::with_config(source, ComposerConfig::default())
    }

    pub fn with_config(source: Arc<dyn ExtensionSource>, config: ComposerConfig) -> Self {
        Self::with_cache(source, Arc::new(ExtensionCache::new()), config)
    }

    pub fn with_cache(
        source: Arc<dyn ExtensionSource>,
        cache: Arc<ExtensionCache>,
        config: ComposerConfig,
    ) -> Self {
        Self {
            source,
            cache,
            config,
            warned: DashMap::new(),
            passes: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn cache(&self) -> &ExtensionCache {
        &self.cache
    }

    /// Forgets one extension (its data changed upstream).
    pub fn invalidate(&self, name: &str) {
        if self.cache.invalidate(name) {
            self.warned.remove(&format!("ext:{name}"));
        }
    }

    pub fn clear(&self) {
        self.cache.clear();
        self.warned.clear();
    }

    /// Ensures every extension referenced by `doc` is available, fetching the
    /// missing ones one at a time.
    ///
    /// A failed fetch yields an empty extension for this pass only; it is not
    /// cached, so the next pass retries.
    pub async fn prepare(&self, doc: &PromptDocument) -> ExtensionTable {
        let names = referenced_extensions(&doc.blocks);
        let mut table = ExtensionTable::new();

        for name in names {
            if let Some(data) = self.cache.get(&name) {
                table.insert(name, data);
                continue;
            }
            debug!(extension = %name, "Fetching extension");
            match self.source.fetch(&name).await {
                Ok(data) => {
                    let data = self.cache.put(&name, data);
                    table.insert(name, data);
                }
                Err(e) => {
                    warn!(extension = %name, error = ?e, "Extension fetch failed, using empty placeholder");
                    table.insert(name, ExtensionData::default());
                }
            }
        }
        table
    }

    /// Resolves `doc` under `composition_id`. `overrides` are layered on top
    /// of the document's own overrides.
    pub async fn resolve(
        &self,
        doc: &PromptDocument,
        composition_id: u64,
        overrides: &Overrides,
    ) -> Result<ResolutionPass> {
        let sequence = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        let extensions = self.prepare(doc).await;
        let ctx = ResolutionContext::prepare(&doc.blocks, &doc.wildcards, &extensions);
        let total_compositions = ctx.dimensions.total().ok();
        if total_compositions.is_none() {
            debug!(document = %doc.id, "Composition space exceeds u64, resolving without a total");
        }

        let merged = doc.overrides.merged_with(overrides);
        let tree = TreeResolver::new(&ctx, &merged, composition_id).run(&doc.blocks);
        self.report(&tree.diagnostics);

        debug!(sequence, composition_id, ?total_compositions, "Resolution pass complete");
        Ok(ResolutionPass {
            sequence,
            composition_id,
            total_compositions,
            dimensions: ctx.dimensions.clone(),
            tree,
        })
    }

    pub async fn terminal_outputs(
        &self,
        doc: &PromptDocument,
        composition_id: u64,
        overrides: &Overrides,
    ) -> Result<Vec<TerminalOutput>> {
        let pass = self.resolve(doc, composition_id, overrides).await?;
        Ok(self.expander().expand(&doc.blocks, &pass.tree))
    }

    /// Samples up to `n` composition ids (always including `current_id`) and
    /// renders each into terminal outputs.
    ///
    /// A space too large for `u64` is sampled over the whole `u64` range;
    /// decoding never wraps there.
    pub async fn explore(&self, doc: &PromptDocument, n: u64, current_id: u64) -> Result<Vec<Exploration>> {
        let extensions = self.prepare(doc).await;
        let ctx = ResolutionContext::prepare(&doc.blocks, &doc.wildcards, &extensions);
        let total = ctx.dimensions.total().unwrap_or(u64::MAX);
        let ids = sampler::sample_composition_ids(total, n, current_id);
        info!(total, sampled = ids.len(), "Exploring composition space");

        let expander = self.expander();
        let mut explorations = Vec::with_capacity(ids.len());
        for composition_id in ids {
            let tree = TreeResolver::new(&ctx, &doc.overrides, composition_id).run(&doc.blocks);
            self.report(&tree.diagnostics);
            explorations.push(Exploration {
                composition_id,
                outputs: expander.expand(&doc.blocks, &tree),
            });
        }
        Ok(explorations)
    }

    pub async fn totals(&self, doc: &PromptDocument) -> Result<CompositionTotals> {
        let extensions = self.prepare(doc).await;
        let ctx = ResolutionContext::prepare(&doc.blocks, &doc.wildcards, &extensions);
        let ext_bucket_max = self.ext_bucket_max(doc);
        let total = ctx
            .dimensions
            .total()
            .with_context(|| format!("Cannot size composition space of '{}'", doc.id))?;
        let effective_total = bucket::compute_effective_total(
            ctx.ext_count,
            ext_bucket_max,
            ctx.wildcards.counts(),
            &self.config.wildcard_bucket_max,
        )?;
        Ok(CompositionTotals {
            total,
            effective_total,
            bucketed: self.bucketing_enabled(doc),
        })
    }

    /// Compositions of `doc` whose wildcard values all fall in `selected`.
    pub async fn count_filtered(&self, doc: &PromptDocument, selected: &ValueSelection) -> Result<u64> {
        let extensions = self.prepare(doc).await;
        let ctx = ResolutionContext::prepare(&doc.blocks, &doc.wildcards, &extensions);
        let count = sampler::count_filtered_compositions(
            &ctx.wildcards,
            selected,
            ctx.ext_count,
            self.ext_bucket_max(doc),
            &self.config.wildcard_bucket_max,
        )?;
        Ok(count)
    }

    /// Maps a bucket composition id to the raw id of its bucket starts.
    pub async fn bucket_composition(&self, doc: &PromptDocument, bucket_id: u64) -> Result<u64> {
        let extensions = self.prepare(doc).await;
        let ctx = ResolutionContext::prepare(&doc.blocks, &doc.wildcards, &extensions);
        let layout = BucketLayout::new(
            ctx.ext_count,
            self.ext_bucket_max(doc),
            ctx.wildcards.counts(),
            &self.config.wildcard_bucket_max,
        );
        Ok(layout.start_composition(bucket_id)?)
    }

    fn ext_bucket_max(&self, doc: &PromptDocument) -> u64 {
        declared_bucket_max(&doc.blocks).unwrap_or(self.config.ext_bucket_max)
    }

    fn bucketing_enabled(&self, doc: &PromptDocument) -> bool {
        self.ext_bucket_max(doc) > 1 || !self.config.wildcard_bucket_max.is_empty()
    }

    fn expander(&self) -> Expander {
        Expander::with_limits(self.config.terminal_output_cap, self.config.terminal_duplicate_limit)
    }

    fn report(&self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            if self.warned.insert(diagnostic.subject(), ()).is_none() {
                warn!(?diagnostic, "Resolution diagnostic");
            }
        }
    }
}

//! Deterministic sampling and allow-list filtering over the composition space.

use crate::compiler::bucket::BucketLayout;
use crate::compiler::codec::Dimensions;
use crate::dsl::WildcardTable;
use crate::error::CompositionError;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Per-wildcard allow-list. A missing key allows every value.
pub type ValueSelection = HashMap<String, HashSet<String>>;

/// Evenly spread ids over `[0, total)`, always including `current_id mod total`.
///
/// Offsets `floor(i × total / n)` that collide collapse, so the set can hold
/// fewer than `n` ids. No randomness: equal arguments give equal sets.
pub fn sample_composition_ids(total: u64, n: u64, current_id: u64) -> BTreeSet<u64> {
    if total <= n {
        return (0..total).collect();
    }
    let mut ids = BTreeSet::new();
    ids.insert(current_id % total);
    for i in 0..n {
        if ids.len() as u64 >= n {
            break;
        }
        let offset = (i as u128 * total as u128 / n as u128) as u64;
        ids.insert(offset % total);
    }
    ids
}

/// Whether the raw composition picks an allowed value for every constrained
/// wildcard. Wildcards absent from the table (or empty) pass vacuously.
pub fn composition_passes_filter(
    composition_id: u64,
    ext_count: u64,
    wildcards: &WildcardTable,
    selected: &ValueSelection,
) -> bool {
    let decoded = Dimensions::new(ext_count, wildcards.counts()).decode(composition_id);
    selected.iter().all(|(name, allowed)| {
        let Some(values) = wildcards.get(name) else {
            return true;
        };
        if values.is_empty() {
            return true;
        }
        let index = decoded.wildcard_indices.get(name).copied().unwrap_or(0);
        allowed.contains(&values[(index % values.len() as u64) as usize])
    })
}

/// Number of compositions passing `selected`.
///
/// Without bucketing the count is analytic. With bucketing every bucket
/// composition is enumerated and its starting raw composition is tested.
pub fn count_filtered_compositions(
    wildcards: &WildcardTable,
    selected: &ValueSelection,
    ext_count: u64,
    ext_bucket_max: u64,
    wildcard_bucket_max: &HashMap<String, u64>,
) -> Result<u64, CompositionError> {
    if ext_bucket_max <= 1 && wildcard_bucket_max.is_empty() {
        return analytic_count(wildcards, selected, ext_count);
    }

    let layout = BucketLayout::new(ext_count, ext_bucket_max, wildcards.counts(), wildcard_bucket_max);
    let total = layout.total()?;
    debug!(total, "Enumerating bucketed compositions for filter count");

    let mut matches = 0u64;
    for bucket_id in 0..total {
        let raw_id = layout.start_composition(bucket_id)?;
        if composition_passes_filter(raw_id, ext_count, wildcards, selected) {
            matches += 1;
        }
    }
    Ok(matches)
}

fn analytic_count(
    wildcards: &WildcardTable,
    selected: &ValueSelection,
    ext_count: u64,
) -> Result<u64, CompositionError> {
    let mut total = ext_count.max(1);
    for name in wildcards.sorted_names() {
        let values = wildcards.get(name).unwrap_or_default();
        let factor = match selected.get(name) {
            _ if values.is_empty() => 1,
            Some(allowed) => values.iter().filter(|v| allowed.contains(*v)).count() as u64,
            None => values.len() as u64,
        };
        total = total
            .checked_mul(factor)
            .ok_or(CompositionError::SpaceTooLarge)?;
    }
    Ok(total)
}

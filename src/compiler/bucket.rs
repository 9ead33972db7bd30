//! Coarse navigation: the same odometer as [`crate::compiler::codec`], but
//! each wheel position is a bucket of up to `max` consecutive values.

use crate::compiler::codec::{self, DecodedIndices, Dimensions};
use crate::error::CompositionError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// `ceil(raw_size / max)`, or a single bucket when `max` is 0.
pub fn bucket_count(raw_size: u64, max: u64) -> u64 {
    if max == 0 {
        return 1;
    }
    raw_size.div_ceil(max).max(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketDim {
    pub raw_size: u64,
    pub max: u64,
    pub buckets: u64,
}

impl BucketDim {
    fn new(raw_size: u64, max: u64) -> Self {
        Self {
            raw_size,
            max,
            buckets: bucket_count(raw_size, max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BucketedIndices {
    pub ext_bucket_index: u64,
    pub ext_value_offset: u64,
    pub wc_bucket_index: BTreeMap<String, u64>,
    pub wc_value_offset: BTreeMap<String, u64>,
    pub total_buckets: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketLayout {
    pub ext: BucketDim,
    pub wildcards: Vec<(String, BucketDim)>,
}

impl BucketLayout {
    /// A wildcard uses its own entry in `wildcard_bucket_max`, falling back to
    /// `ext_bucket_max` as the shared default.
    pub fn new(
        ext_count: u64,
        ext_bucket_max: u64,
        wildcard_counts: impl IntoIterator<Item = (String, u64)>,
        wildcard_bucket_max: &HashMap<String, u64>,
    ) -> Self {
        let dims = Dimensions::new(ext_count, wildcard_counts);
        let wildcards = dims
            .wildcards
            .into_iter()
            .map(|(name, raw)| {
                let max = wildcard_bucket_max
                    .get(&name)
                    .copied()
                    .unwrap_or(ext_bucket_max);
                (name, BucketDim::new(raw, max))
            })
            .collect();
        Self {
            ext: BucketDim::new(ext_count, ext_bucket_max),
            wildcards,
        }
    }

    pub fn sizes(&self) -> Vec<u64> {
        std::iter::once(self.ext.buckets)
            .chain(self.wildcards.iter().map(|(_, dim)| dim.buckets))
            .collect()
    }

    pub fn total(&self) -> Result<u64, CompositionError> {
        codec::total_compositions(&self.sizes())
    }

    /// Offsets are `bucket_index × max` and are NOT wrapped to the value list;
    /// see [`BucketLayout::start_indices`] for the wrapped form.
    pub fn decode(&self, bucket_id: u64) -> Result<BucketedIndices, CompositionError> {
        let total_buckets = self.total()?;
        let indices = codec::decode(bucket_id, &self.sizes());

        let mut decoded = BucketedIndices {
            ext_bucket_index: indices[0],
            ext_value_offset: indices[0] * self.ext.max,
            total_buckets,
            ..Default::default()
        };
        for ((name, dim), &bucket) in self.wildcards.iter().zip(indices.iter().skip(1)) {
            decoded.wc_bucket_index.insert(name.clone(), bucket);
            decoded.wc_value_offset.insert(name.clone(), bucket * dim.max);
        }
        Ok(decoded)
    }

    /// Raw value indices at the start of each chosen bucket, wrapped modulo
    /// each dimension's real length.
    pub fn start_indices(&self, bucket_id: u64) -> Result<DecodedIndices, CompositionError> {
        let decoded = self.decode(bucket_id)?;
        let wildcard_indices = self
            .wildcards
            .iter()
            .map(|(name, dim)| {
                let offset = decoded.wc_value_offset.get(name).copied().unwrap_or(0);
                (name.clone(), offset % dim.raw_size.max(1))
            })
            .collect();
        Ok(DecodedIndices {
            ext_index: decoded.ext_value_offset % self.ext.raw_size.max(1),
            wildcard_indices,
        })
    }

    /// Raw composition id addressed by the start of bucket composition `bucket_id`.
    pub fn start_composition(&self, bucket_id: u64) -> Result<u64, CompositionError> {
        let raw = Dimensions::new(
            self.ext.raw_size,
            self.wildcards
                .iter()
                .map(|(name, dim)| (name.clone(), dim.raw_size)),
        );
        raw.encode(&self.start_indices(bucket_id)?)
    }
}

pub fn decode_bucketed(
    composition_id: u64,
    ext_count: u64,
    ext_bucket_max: u64,
    wildcard_counts: impl IntoIterator<Item = (String, u64)>,
    wildcard_bucket_max: &HashMap<String, u64>,
) -> Result<BucketedIndices, CompositionError> {
    BucketLayout::new(ext_count, ext_bucket_max, wildcard_counts, wildcard_bucket_max)
        .decode(composition_id)
}

pub fn bucket_start_composition(
    bucket_id: u64,
    ext_count: u64,
    ext_bucket_max: u64,
    wildcard_counts: impl IntoIterator<Item = (String, u64)>,
    wildcard_bucket_max: &HashMap<String, u64>,
) -> Result<u64, CompositionError> {
    BucketLayout::new(ext_count, ext_bucket_max, wildcard_counts, wildcard_bucket_max)
        .start_composition(bucket_id)
}

/// Size of the navigable space: bucket compositions when bucketing is in
/// effect, raw compositions otherwise.
pub fn compute_effective_total(
    ext_count: u64,
    ext_bucket_max: u64,
    wildcard_counts: impl IntoIterator<Item = (String, u64)>,
    wildcard_bucket_max: &HashMap<String, u64>,
) -> Result<u64, CompositionError> {
    if ext_bucket_max <= 1 && wildcard_bucket_max.is_empty() {
        return codec::compute_total_compositions(ext_count, wildcard_counts);
    }
    BucketLayout::new(ext_count, ext_bucket_max, wildcard_counts, wildcard_bucket_max).total()
}

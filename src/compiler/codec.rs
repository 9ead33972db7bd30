//! Mixed-radix (odometer) decoding of composition ids.
//!
//! The first dimension is the most significant wheel and the last one turns
//! fastest. Sizes are clamped to at least 1, so an empty dimension still
//! contributes a single (index 0) position.

use crate::error::CompositionError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Product of the clamped sizes, or `None` on `u64` overflow.
pub fn checked_product(sizes: &[u64]) -> Option<u64> {
    sizes
        .iter()
        .try_fold(1u64, |acc, &size| acc.checked_mul(size.max(1)))
}

pub fn total_compositions(sizes: &[u64]) -> Result<u64, CompositionError> {
    checked_product(sizes).ok_or(CompositionError::SpaceTooLarge)
}

/// Splits `composition_id` into one index per dimension, each in `[0, size)`.
///
/// Ids wrap modulo the total. When the total exceeds `u64` every id is already
/// below it, so no wrapping is needed and decoding still succeeds.
pub fn decode(composition_id: u64, sizes: &[u64]) -> Vec<u64> {
    let mut idx = match checked_product(sizes) {
        Some(total) => composition_id % total,
        None => composition_id,
    };
    let mut indices = vec![0u64; sizes.len()];
    for (slot, &size) in indices.iter_mut().zip(sizes).rev() {
        let size = size.max(1);
        *slot = idx % size;
        idx /= size;
    }
    indices
}

/// Inverse of [`decode`]: `Σ index_i × Π_{j>i} size_j`.
pub fn encode(indices: &[u64], sizes: &[u64]) -> Result<u64, CompositionError> {
    if indices.len() != sizes.len() {
        return Err(CompositionError::DimensionMismatch {
            expected: sizes.len(),
            actual: indices.len(),
        });
    }
    let mut id = 0u64;
    for (dimension, (&index, &size)) in indices.iter().zip(sizes).enumerate() {
        let size = size.max(1);
        if index >= size {
            return Err(CompositionError::IndexOutOfRange {
                dimension,
                index,
                size,
            });
        }
        id = id
            .checked_mul(size)
            .and_then(|v| v.checked_add(index))
            .ok_or(CompositionError::SpaceTooLarge)?;
    }
    Ok(id)
}

/// The ordered dimension list of one composition space: ext_text first, then
/// wildcards by ascending name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub ext_count: u64,
    pub wildcards: Vec<(String, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DecodedIndices {
    pub ext_index: u64,
    pub wildcard_indices: BTreeMap<String, u64>,
}

impl Dimensions {
    pub fn new(ext_count: u64, wildcard_counts: impl IntoIterator<Item = (String, u64)>) -> Self {
        let mut wildcards: Vec<(String, u64)> = wildcard_counts.into_iter().collect();
        // Order must not depend on the caller's collection.
        wildcards.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            ext_count,
            wildcards,
        }
    }

    pub fn sizes(&self) -> Vec<u64> {
        std::iter::once(self.ext_count)
            .chain(self.wildcards.iter().map(|(_, count)| *count))
            .map(|size| size.max(1))
            .collect()
    }

    pub fn total(&self) -> Result<u64, CompositionError> {
        total_compositions(&self.sizes())
    }

    pub fn decode(&self, composition_id: u64) -> DecodedIndices {
        let indices = decode(composition_id, &self.sizes());
        let wildcard_indices = self
            .wildcards
            .iter()
            .zip(indices.iter().skip(1))
            .map(|((name, _), &index)| (name.clone(), index))
            .collect();
        DecodedIndices {
            ext_index: indices[0],
            wildcard_indices,
        }
    }

    /// Names missing from `decoded` encode as index 0.
    pub fn encode(&self, decoded: &DecodedIndices) -> Result<u64, CompositionError> {
        let mut indices = Vec::with_capacity(self.wildcards.len() + 1);
        indices.push(decoded.ext_index);
        for (name, _) in &self.wildcards {
            indices.push(decoded.wildcard_indices.get(name).copied().unwrap_or(0));
        }
        encode(&indices, &self.sizes())
    }
}

/// Decodes against `[ext_count, counts of wildcards sorted by name...]`.
pub fn decode_dimensions(
    composition_id: u64,
    ext_count: u64,
    wildcard_counts: impl IntoIterator<Item = (String, u64)>,
) -> DecodedIndices {
    Dimensions::new(ext_count, wildcard_counts).decode(composition_id)
}

/// "N of M compositions" denominator.
pub fn compute_total_compositions(
    ext_count: u64,
    wildcard_counts: impl IntoIterator<Item = (String, u64)>,
) -> Result<u64, CompositionError> {
    Dimensions::new(ext_count, wildcard_counts).total()
}

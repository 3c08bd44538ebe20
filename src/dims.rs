use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::reference::ReferenceStore;

/// Dimensions and variables of one logical dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetShape {
    /// Dimension name to extent.
    pub dims: IndexMap<String, u64>,
    pub variables: IndexMap<String, VariableShape>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableShape {
    pub dims: Vec<String>,
    pub shape: Vec<u64>,
    /// Chunk shape; empty if unknown.
    #[serde(default)]
    pub chunks: Vec<u64>,
}

impl VariableShape {
    /// Number of chunks along each dimension, if the chunk shape is known.
    pub fn grid_shape(&self) -> Option<Vec<u64>> {
        if self.chunks.len() != self.shape.len() || self.chunks.contains(&0) {
            return None;
        }
        Some(
            self.shape
                .iter()
                .zip(&self.chunks)
                .map(|(&n, &c)| n.div_ceil(c))
                .collect(),
        )
    }
}

/// The result of aligning several sources into one dataset.
///
/// Produced outside this crate, e.g. by opening every source with xarray.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    /// Shape of the combined dataset.
    pub merged: DatasetShape,
    /// Shape of a single, representative source.
    pub representative: DatasetShape,
    /// Number of sources combined.
    pub sources: usize,
    /// Metadata documents and derived coordinate values of the combined dataset.
    pub metadata: ReferenceStore,
}

/// How each dimension of a combined dataset relates to its sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionPartition {
    /// Dimensions which only exist in the combined dataset.
    pub extra: BTreeSet<String>,
    /// Dimensions along which sources are stacked.
    pub concatenated: BTreeSet<String>,
    /// Dimensions duplicated identically in every source.
    pub shared: BTreeSet<String>,
}

impl DimensionPartition {
    pub fn classify(
        merged: &DatasetShape,
        representative: &DatasetShape,
        sources: usize,
    ) -> crate::Result<Self> {
        if sources == 0 {
            return Err(crate::Error::NoSources);
        }
        let mut out = Self::default();
        for (name, &extent) in &merged.dims {
            match representative.dims.get(name) {
                None => out.extra.insert(name.clone()),
                Some(&single) if single.checked_mul(sources as u64) == Some(extent) => {
                    out.concatenated.insert(name.clone())
                }
                Some(_) => out.shared.insert(name.clone()),
            };
        }
        log::debug!(
            "dimensions: extra {:?}, concatenated {:?}, shared {:?}",
            out.extra,
            out.concatenated,
            out.shared
        );
        Ok(out)
    }
}

impl Alignment {
    pub fn partition(&self) -> crate::Result<DimensionPartition> {
        DimensionPartition::classify(&self.merged, &self.representative, self.sources)
    }
}

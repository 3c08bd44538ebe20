use serde_json::Value;

use crate::{
    attributes::{ARRAY_DIMENSIONS_ATTR, transfer_attributes},
    chunk::chunk_locations,
    metadata::{Compressor, ZarrArrayMetadata, ZarrGroupMetadata},
    reference::{Reference, ReferenceStore, ZARRAY, ZATTRS, ZGROUP, chunk_name, node_key},
    source::{ArrayNode, ChunkIndexProvider, Filter, GroupNode, Layout, Node, Source},
};

#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// Record dimension scales as `_ARRAY_DIMENSIONS`, as xarray expects.
    pub dimension_aware: bool,
}

/// Builds a [ReferenceStore] for a single source.
///
/// Groups become Zarr groups and datasets become Zarr arrays whose chunks
/// remain in the source.
pub struct SingleSourceTranslator<'a, S> {
    source: &'a S,
    options: TranslateOptions,
}

impl<'a, S: Source + ChunkIndexProvider> SingleSourceTranslator<'a, S> {
    pub fn new(source: &'a S, options: TranslateOptions) -> Self {
        Self { source, options }
    }

    /// Walk the whole hierarchy.
    ///
    /// Either the full store is returned, or the first fatal error.
    pub fn translate(&self) -> crate::Result<ReferenceStore> {
        log::debug!(
            "translating {} (dimension aware: {})",
            self.source.url(),
            self.options.dimension_aware
        );
        let mut store = ReferenceStore::new();
        self.translate_group(&mut store, &self.source.root()?)?;
        self.source.visit(&mut |node| match node {
            Node::Group(g) => self.translate_group(&mut store, &g),
            Node::Array(a) => self.translate_array(&mut store, &a),
        })?;
        log::info!(
            "translated {} into {} references",
            self.source.url(),
            store.len()
        );
        Ok(store)
    }

    fn translate_group(&self, store: &mut ReferenceStore, group: &GroupNode) -> crate::Result<()> {
        log::debug!("group: {}", group.path);
        let path = zarr_path(&group.path);
        store.insert_json(node_key(path, ZGROUP), &ZarrGroupMetadata::default())?;
        let attrs = transfer_attributes(path, &group.attributes, self.options.dimension_aware);
        if !attrs.is_empty() {
            store.insert_json(node_key(path, ZATTRS), &attrs)?;
        }
        Ok(())
    }

    fn translate_array(&self, store: &mut ReferenceStore, array: &ArrayNode) -> crate::Result<()> {
        log::debug!("dataset: {}", array.path);
        if array.layout == Layout::Compact {
            return Err(crate::Error::CompactLayout(format!(
                "<{} {:?} {}>",
                array.path,
                array.shape,
                array.data_type.to_dtype_string()
            )));
        }
        let compressor = compressor(array)?;
        array.data_type.validate()?;

        let info = self.source.storage_info(array)?;
        let chunks = chunk_locations(array, &info)?;
        if self.options.dimension_aware && array.is_dimension_scale && chunks.is_empty() {
            log::debug!("skipping empty dimension scale {}", array.path);
            return Ok(());
        }

        let path = zarr_path(&array.path);
        let chunk_shape = match array.layout {
            Layout::Chunked => array.chunks.clone(),
            _ => None,
        };
        let meta = ZarrArrayMetadata::new(
            array.shape.clone().unwrap_or_default(),
            chunk_shape,
            &array.data_type,
            array.fill_value.as_ref(),
            compressor,
        )?;
        store.insert_json(node_key(path, ZARRAY), &meta)?;

        let mut attrs = transfer_attributes(path, &array.attributes, self.options.dimension_aware);
        if self.options.dimension_aware {
            let dims = array_dimensions(array)?;
            log::debug!("{ARRAY_DIMENSIONS_ATTR} = {dims:?}");
            attrs.insert(
                ARRAY_DIMENSIONS_ATTR.into(),
                Value::Array(dims.into_iter().map(Value::String).collect()),
            );
        }
        if !attrs.is_empty() {
            store.insert_json(node_key(path, ZATTRS), &attrs)?;
        }

        for loc in chunks {
            store.insert_new(
                node_key(path, &chunk_name(&loc.coords)),
                Reference::remote(self.source.url(), loc.offset, loc.length),
            )?;
        }
        Ok(())
    }
}

/// Map an HDF5 path to a Zarr node path (no leading or trailing separator).
fn zarr_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Check the filter pipeline, returning the equivalent Zarr compressor.
fn compressor(array: &ArrayNode) -> crate::Result<Option<Compressor>> {
    let mut compressor = None;
    let mut unsupported = Vec::new();
    for f in &array.filters {
        match f {
            Filter::Deflate { level } if compressor.is_none() => {
                compressor = Some(Compressor::Zlib { level: *level });
            }
            other => unsupported.push(format!("{other:?}")),
        }
    }
    if unsupported.is_empty() {
        Ok(compressor)
    } else {
        Err(crate::Error::UnsupportedFilter {
            path: array.path.clone(),
            filters: unsupported.join(", "),
        })
    }
}

/// Names of the dimension scales attached to each axis.
///
/// A dimension scale is its own dimension. More than one scale on an axis is
/// an error.
fn array_dimensions(array: &ArrayNode) -> crate::Result<Vec<String>> {
    let rank = array.shape.as_ref().map_or(0, Vec::len);
    let mut dims = Vec::with_capacity(rank);
    for axis in 0..rank {
        let scales = array
            .dimension_scales
            .get(axis)
            .map_or(&[][..], Vec::as_slice);
        match scales {
            [one] => dims.push(zarr_path(one).to_string()),
            _ if array.is_dimension_scale => dims.push(zarr_path(&array.path).to_string()),
            [] => {}
            many => {
                return Err(crate::Error::AmbiguousDimensions {
                    path: array.path.clone(),
                    axis,
                    count: many.len(),
                });
            }
        }
    }
    Ok(dims)
}

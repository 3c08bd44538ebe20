use zarrs::storage::ReadableStorageTraits;

use crate::{
    dims::{Alignment, DimensionPartition, VariableShape},
    reference::{
        Reference, ReferenceFile, ReferenceStore, RemoteReference, chunk_name, node_key,
        parse_chunk_name,
    },
    storage::{protocol, read_remote},
    template::Templates,
};

/// Options for consolidation.
#[derive(Debug, Clone)]
pub struct ConsolidateOptions {
    /// Source identifiers used more than this many times become templates.
    pub template_count: usize,
    /// References shorter than this many bytes are inlined; zero disables.
    pub inline_threshold: u64,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            template_count: 5,
            inline_threshold: 100,
        }
    }
}

/// Statistics from consolidation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsolidateStats {
    pub sources: usize,
    /// Chunk references copied from shared coordinates.
    pub shared_chunks: usize,
    /// Chunk references copied or rewritten from variables.
    pub variable_chunks: usize,
    pub templates: usize,
    pub inlined: usize,
}

pub struct Consolidator {
    options: ConsolidateOptions,
}

impl Consolidator {
    pub fn new(options: ConsolidateOptions) -> Self {
        Self { options }
    }

    /// Merge `stores`, one per source in alignment order.
    ///
    /// `reader` serves byte ranges for inlining and must be able to read
    /// every source; all sources must share the first source's protocol.
    pub fn consolidate<R: ReadableStorageTraits + ?Sized>(
        &self,
        alignment: &Alignment,
        stores: &[ReferenceStore],
        partition: &DimensionPartition,
        reader: &R,
    ) -> crate::Result<(ReferenceFile, ConsolidateStats)> {
        let first = stores.first().ok_or(crate::Error::NoSources)?;
        if stores.len() != alignment.sources {
            return Err(crate::Error::general(format!(
                "alignment covers {} sources, got {} reference stores",
                alignment.sources,
                stores.len()
            )));
        }
        check_protocols(stores)?;
        let mut stats = ConsolidateStats {
            sources: stores.len(),
            ..Default::default()
        };

        let mut out = alignment.metadata.clone();

        for dim in &partition.shared {
            for (name, r) in first.chunks_of(dim) {
                out.insert_new(node_key(dim, name), r.clone())?;
                stats.shared_chunks += 1;
            }
        }

        for (name, var) in &alignment.merged.variables {
            if alignment.merged.dims.contains_key(name) {
                continue;
            }
            let var0 = alignment.representative.variables.get(name).ok_or_else(|| {
                crate::Error::ShapeMismatch {
                    variable: name.clone(),
                    reason: "missing from the representative source".into(),
                }
            })?;
            if !var.dims.ends_with(&var0.dims) {
                return Err(crate::Error::ShapeMismatch {
                    variable: name.clone(),
                    reason: format!(
                        "dimensions {:?} do not end with {:?}",
                        var.dims, var0.dims
                    ),
                });
            }
            let stacked = var.shape != var0.shape;
            for (i, store) in stores.iter().enumerate() {
                if !stacked && i > 0 {
                    break;
                }
                for (part, r) in store.chunks_of(name) {
                    let coords = chunk_coords(name, part, var0)?;
                    let key = if stacked {
                        node_key(name, &format!("{i}.{}", chunk_name(&coords)))
                    } else {
                        node_key(name, part)
                    };
                    out.insert_new(key, r.clone())?;
                    stats.variable_chunks += 1;
                }
            }
        }

        let (refs, templates, inlined) = self.finish(out, reader)?;
        let templates = templates.into_table();
        stats.templates = templates.len();
        stats.inlined = inlined;
        log::info!(
            "consolidated {} sources: {} shared and {} variable chunks, {} templates, {} inlined",
            stats.sources,
            stats.shared_chunks,
            stats.variable_chunks,
            stats.templates,
            stats.inlined
        );
        Ok((
            ReferenceFile {
                templates,
                ..ReferenceFile::new(refs)
            },
            stats,
        ))
    }

    /// Template frequent source identifiers and inline small references.
    fn finish<R: ReadableStorageTraits + ?Sized>(
        &self,
        mut refs: ReferenceStore,
        reader: &R,
    ) -> crate::Result<(ReferenceStore, Templates, usize)> {
        let templates = Templates::assign(&refs, self.options.template_count)?;
        let mut inlined = 0;
        for (_, value) in refs.iter_mut() {
            let Reference::Remote(remote) = value else {
                continue;
            };
            if remote.length < self.options.inline_threshold {
                let data = read_remote(reader, remote)?;
                *value = Reference::inline_bytes(&data);
                inlined += 1;
            } else if let Some(p) = templates.substitute(&remote.url) {
                *value = Reference::Remote(RemoteReference {
                    url: p,
                    ..remote.clone()
                });
            }
        }
        Ok((refs, templates, inlined))
    }
}

/// Parse and bounds-check the chunk part of a key against one source's grid.
fn chunk_coords(variable: &str, part: &str, var0: &VariableShape) -> crate::Result<Vec<u64>> {
    let key = || node_key(variable, part);
    let coords = parse_chunk_name(part).ok_or_else(|| crate::Error::ChunkOutOfRange {
        key: key(),
        reason: "not a chunk key".into(),
    })?;
    let Some(grid) = var0.grid_shape() else {
        return Ok(coords);
    };
    // rank 0 arrays have the single chunk `0`
    let in_range = if grid.is_empty() {
        coords == [0]
    } else {
        coords.len() == grid.len() && coords.iter().zip(&grid).all(|(c, n)| c < n)
    };
    if in_range {
        Ok(coords)
    } else {
        Err(crate::Error::ChunkOutOfRange {
            key: key(),
            reason: format!("chunk grid is {grid:?}"),
        })
    }
}

/// Every source identifier must use the protocol of the first source.
fn check_protocols(stores: &[ReferenceStore]) -> crate::Result<()> {
    let mut urls = stores.iter().flat_map(|s| s.remotes().map(|(_, r)| &r.url));
    let Some(first) = urls.next() else {
        return Ok(());
    };
    let expected = protocol(first);
    for url in urls {
        let found = protocol(url);
        if found != expected {
            return Err(crate::Error::IncompatibleSources {
                expected: expected.into(),
                found: found.into(),
                url: url.clone(),
            });
        }
    }
    Ok(())
}

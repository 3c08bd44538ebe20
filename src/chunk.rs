use std::collections::HashSet;

use crate::source::{ArrayNode, StorageInfo};

/// Byte range of one chunk, keyed by chunk grid coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLocation {
    pub coords: Vec<u64>,
    pub offset: u64,
    pub length: u64,
}

/// Convert raw storage information into chunk grid locations.
///
/// Contiguous arrays become a single chunk at the origin. Arrays that were
/// never written yield no chunks.
pub(crate) fn chunk_locations(
    array: &ArrayNode,
    info: &StorageInfo,
) -> crate::Result<Vec<ChunkLocation>> {
    let Some(shape) = &array.shape else {
        return Ok(Vec::new());
    };
    match info {
        StorageInfo::Null | StorageInfo::Contiguous { offset: None, .. } => Ok(Vec::new()),
        StorageInfo::Contiguous {
            offset: Some(offset),
            size,
        } => Ok(vec![ChunkLocation {
            coords: vec![0; shape.len().max(1)],
            offset: *offset,
            length: *size,
        }]),
        StorageInfo::Chunked(chunks) => {
            let chunk_shape = array
                .chunks
                .as_deref()
                .ok_or_else(|| invalid(array, "chunk index for an unchunked array"))?;
            if chunk_shape.len() != shape.len() || chunk_shape.contains(&0) {
                return Err(invalid(
                    array,
                    format!("chunk shape {chunk_shape:?} for array shape {shape:?}"),
                ));
            }
            let mut seen = HashSet::with_capacity(chunks.len());
            let mut out = Vec::with_capacity(chunks.len());
            for c in chunks {
                if c.chunk_offset.len() != chunk_shape.len() {
                    return Err(invalid(
                        array,
                        format!("chunk offset {:?} has wrong rank", c.chunk_offset),
                    ));
                }
                let coords = c
                    .chunk_offset
                    .iter()
                    .zip(chunk_shape)
                    .zip(shape)
                    .map(|((&off, &size), &extent)| {
                        if off % size != 0 || (off >= extent && extent > 0) {
                            None
                        } else {
                            Some(off / size)
                        }
                    })
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        invalid(
                            array,
                            format!("chunk offset {:?} is not on the chunk grid", c.chunk_offset),
                        )
                    })?;
                if !seen.insert(coords.clone()) {
                    return Err(invalid(array, format!("chunk {coords:?} reported twice")));
                }
                out.push(ChunkLocation {
                    coords,
                    offset: c.byte_offset,
                    length: c.size,
                });
            }
            Ok(out)
        }
    }
}

fn invalid(array: &ArrayNode, reason: impl Into<String>) -> crate::Error {
    crate::Error::InvalidChunkIndex {
        path: array.path.clone(),
        reason: reason.into(),
    }
}

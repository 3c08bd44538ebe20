//! Byte-range reference indexes for chunked HDF5 data, readable as Zarr.

pub mod attributes;
pub mod chunk;
pub mod consolidate;
pub mod dims;
mod error;
pub mod inline;
pub mod metadata;
pub mod output;
pub mod reference;
pub mod source;
pub mod storage;
pub mod template;
pub mod translate;

pub use zarrs;

pub use consolidate::{ConsolidateOptions, ConsolidateStats, Consolidator};
pub use dims::{Alignment, DimensionPartition};
pub use error::{Error, Result};
pub use inline::inline_references;
pub use output::{OutputFormat, write_references};
pub use reference::{Reference, ReferenceFile, ReferenceStore};
pub use storage::ReferenceStorage;
pub use translate::{SingleSourceTranslator, TranslateOptions};

use zarrs::storage::StorageError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    General(String),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),

    #[error("{path} uses unsupported HDF5 filters: {filters}")]
    UnsupportedFilter { path: String, filters: String },
    #[error("compact HDF5 datasets are not supported: {0}")]
    CompactLayout(String),
    #[error("{path}: {count} dimension scales attached to dimension #{axis}")]
    AmbiguousDimensions {
        path: String,
        axis: usize,
        count: usize,
    },
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),
    #[error("invalid chunk index for {path}: {reason}")]
    InvalidChunkIndex { path: String, reason: String },
    #[error("attribute {name} cannot be represented as JSON: {reason}")]
    AttributeCoercion { name: String, reason: String },

    #[error("source {0} could not be read")]
    MissingSource(String),
    #[error("short read from {url}: expected {expected} bytes at offset {offset}, got {actual}")]
    ShortRead {
        url: String,
        offset: u64,
        expected: u64,
        actual: u64,
    },
    #[error("invalid source identifier: {0}")]
    InvalidSource(String),

    #[error("unknown output format: {0}")]
    UnknownFormat(String),

    #[error("no sources to consolidate")]
    NoSources,
    #[error("shape mismatch for variable {variable}: {reason}")]
    ShapeMismatch { variable: String, reason: String },
    #[error("chunk key {key} is out of range: {reason}")]
    ChunkOutOfRange { key: String, reason: String },
    #[error("duplicate reference key {0}")]
    DuplicateKey(String),
    #[error("sources do not share a protocol: expected {expected}, found {found} ({url})")]
    IncompatibleSources {
        expected: String,
        found: String,
        url: String,
    },
    #[error("ran out of template symbols: {needed} source identifiers need one, {available} available")]
    TemplateSymbolsExhausted { needed: usize, available: usize },
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }
}

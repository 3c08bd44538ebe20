use crate::{
    attributes::AttributeValue,
    metadata::{DataType, Scalar},
};

/// Anything a source can hand to the translator.
#[derive(Debug, Clone)]
pub enum Node {
    Group(GroupNode),
    Array(ArrayNode),
}

impl Node {
    pub fn path(&self) -> &str {
        match self {
            Node::Group(g) => &g.path,
            Node::Array(a) => &a.path,
        }
    }
}

impl From<GroupNode> for Node {
    fn from(value: GroupNode) -> Self {
        Self::Group(value)
    }
}

impl From<ArrayNode> for Node {
    fn from(value: ArrayNode) -> Self {
        Self::Array(value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupNode {
    /// Absolute hierarchy path, e.g. `/forecast`. The root is `/`.
    pub path: String,
    pub attributes: Vec<(String, AttributeValue)>,
}

/// Physical storage layout of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Contiguous,
    Chunked,
    /// Data embedded in the object header.
    Compact,
}

/// A filter in a dataset's filter pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Deflate { level: u32 },
    Shuffle,
    Fletcher32,
    ScaleOffset,
    Szip,
    Lzf,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct ArrayNode {
    /// Absolute hierarchy path, e.g. `/forecast/temperature`.
    pub path: String,
    /// `None` for a null dataspace.
    pub shape: Option<Vec<u64>>,
    pub data_type: DataType,
    /// `None` for unchunked storage.
    pub chunks: Option<Vec<u64>>,
    pub fill_value: Option<Scalar>,
    pub layout: Layout,
    pub filters: Vec<Filter>,
    pub attributes: Vec<(String, AttributeValue)>,
    /// Whether this dataset is itself a dimension scale.
    pub is_dimension_scale: bool,
    /// Paths of the dimension scales attached to each axis.
    pub dimension_scales: Vec<Vec<String>>,
}

impl ArrayNode {
    pub fn new(path: impl Into<String>, shape: Vec<u64>, data_type: DataType) -> Self {
        Self {
            path: path.into(),
            shape: Some(shape),
            data_type,
            chunks: None,
            fill_value: None,
            layout: Layout::Contiguous,
            filters: Vec::new(),
            attributes: Vec::new(),
            is_dimension_scale: false,
            dimension_scales: Vec::new(),
        }
    }

    pub fn with_chunks(mut self, chunks: Vec<u64>) -> Self {
        self.chunks = Some(chunks);
        self.layout = Layout::Chunked;
        self
    }

    pub fn with_fill_value(mut self, fill_value: Scalar) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_attributes(mut self, attributes: Vec<(String, AttributeValue)>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn as_dimension_scale(mut self) -> Self {
        self.is_dimension_scale = true;
        self
    }

    pub fn with_dimension_scales(mut self, scales: Vec<Vec<String>>) -> Self {
        self.dimension_scales = scales;
        self
    }
}

/// Location of one written chunk, as recorded by the HDF5 chunk index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Offset of the chunk's first element, in elements per dimension.
    pub chunk_offset: Vec<u64>,
    pub byte_offset: u64,
    pub size: u64,
}

/// Storage information for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageInfo {
    /// Null dataspace: nothing to reference.
    Null,
    /// A single extent; `offset` is `None` if no data was ever written.
    Contiguous { offset: Option<u64>, size: u64 },
    Chunked(Vec<ChunkInfo>),
}

/// An opened source whose hierarchy can be walked.
pub trait Source {
    /// Identifier written into every remote reference.
    fn url(&self) -> &str;

    /// The root group.
    fn root(&self) -> crate::Result<GroupNode>;

    /// Visit every node below the root, depth first in hierarchy order.
    fn visit(&self, visitor: &mut dyn FnMut(Node) -> crate::Result<()>) -> crate::Result<()>;
}

/// Lookup of where an array's bytes live.
pub trait ChunkIndexProvider {
    fn storage_info(&self, array: &ArrayNode) -> crate::Result<StorageInfo>;
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use h5refs::Result;
use h5refs::metadata::{DataType, Endian};
use h5refs::source::{
    ArrayNode, ChunkIndexProvider, ChunkInfo, GroupNode, Node, Source, StorageInfo,
};

pub fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

pub fn f4() -> DataType {
    DataType::Float {
        size: 4,
        endian: Endian::Little,
    }
}

pub fn f4_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// A source hierarchy held in memory, standing in for an opened HDF5 file.
pub struct MemorySource {
    url: String,
    root: GroupNode,
    nodes: Vec<Node>,
    storage: HashMap<String, StorageInfo>,
}

impl MemorySource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            root: GroupNode {
                path: "/".into(),
                attributes: Vec::new(),
            },
            nodes: Vec::new(),
            storage: HashMap::new(),
        }
    }

    pub fn with_root(mut self, root: GroupNode) -> Self {
        self.root = root;
        self
    }

    pub fn group(mut self, group: GroupNode) -> Self {
        self.nodes.push(group.into());
        self
    }

    pub fn array(mut self, array: ArrayNode, info: StorageInfo) -> Self {
        self.storage.insert(array.path.clone(), info);
        self.nodes.push(array.into());
        self
    }
}

impl Source for MemorySource {
    fn url(&self) -> &str {
        &self.url
    }

    fn root(&self) -> Result<GroupNode> {
        Ok(self.root.clone())
    }

    fn visit(&self, visitor: &mut dyn FnMut(Node) -> Result<()>) -> Result<()> {
        for node in &self.nodes {
            visitor(node.clone())?;
        }
        Ok(())
    }
}

impl ChunkIndexProvider for MemorySource {
    fn storage_info(&self, array: &ArrayNode) -> Result<StorageInfo> {
        Ok(self
            .storage
            .get(&array.path)
            .cloned()
            .unwrap_or(StorageInfo::Contiguous {
                offset: None,
                size: 0,
            }))
    }
}

/// A file on disk that chunk bytes are appended to.
pub struct SourceFile {
    _dir: tempfile::TempDir,
    path: PathBuf,
    content: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(name);
        // a fake superblock, so no chunk starts at offset 0
        let content = b"\x89HDF\r\n\x1a\n".to_vec();
        Self {
            _dir: dir,
            path,
            content,
        }
    }

    pub fn url(&self) -> String {
        self.path.to_str().expect("utf-8 temp path").to_string()
    }

    /// Append a chunk starting at element offset `chunk_offset`.
    pub fn chunk(&mut self, chunk_offset: Vec<u64>, bytes: &[u8]) -> ChunkInfo {
        let byte_offset = self.content.len() as u64;
        self.content.extend_from_slice(bytes);
        ChunkInfo {
            chunk_offset,
            byte_offset,
            size: bytes.len() as u64,
        }
    }

    pub fn flush(&self) {
        let mut f = std::fs::File::create(&self.path).expect("create source file");
        f.write_all(&self.content).expect("write source file");
    }
}

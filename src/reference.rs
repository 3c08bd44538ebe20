use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Tag prepended to base64-encoded binary inline values.
pub const BASE64_PREFIX: &str = "base64:";

/// Metadata document names used by Zarr V2 nodes.
pub const ZGROUP: &str = ".zgroup";
pub const ZARRAY: &str = ".zarray";
pub const ZATTRS: &str = ".zattrs";

/// Version of the serialized reference document.
pub const REFERENCE_VERSION: u32 = 1;

/// A byte range within a named source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, u64, u64)", into = "(String, u64, u64)")]
pub struct RemoteReference {
    pub url: String,
    pub offset: u64,
    pub length: u64,
}

impl From<(String, u64, u64)> for RemoteReference {
    fn from((url, offset, length): (String, u64, u64)) -> Self {
        Self {
            url,
            offset,
            length,
        }
    }
}

impl From<RemoteReference> for (String, u64, u64) {
    fn from(value: RemoteReference) -> Self {
        (value.url, value.offset, value.length)
    }
}

/// One entry of a [ReferenceStore].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    /// Literal text, or [BASE64_PREFIX]-tagged binary.
    Inline(String),
    Remote(RemoteReference),
}

impl Reference {
    pub fn remote(url: impl Into<String>, offset: u64, length: u64) -> Self {
        Self::Remote(RemoteReference {
            url: url.into(),
            offset,
            length,
        })
    }

    /// Encode raw bytes as an inline value.
    ///
    /// ASCII data is kept as text; anything else is base64 encoded behind
    /// [BASE64_PREFIX].
    pub fn inline_bytes(data: &[u8]) -> Self {
        if data.is_ascii() {
            // all bytes < 0x80, so this is valid UTF-8
            Self::Inline(data.iter().map(|&b| b as char).collect())
        } else {
            Self::Inline(format!("{BASE64_PREFIX}{}", STANDARD.encode(data)))
        }
    }

    pub fn as_remote(&self) -> Option<&RemoteReference> {
        match self {
            Reference::Remote(r) => Some(r),
            Reference::Inline(_) => None,
        }
    }
}

/// Decode an inline value back into the bytes it represents.
pub fn decode_inline(value: &str) -> crate::Result<Vec<u8>> {
    match value.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => STANDARD.decode(encoded).map_err(crate::Error::wrap),
        None => Ok(value.as_bytes().to_vec()),
    }
}

/// Insertion-ordered mapping from key to [Reference].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceStore {
    refs: IndexMap<String, Reference>,
}

impl ReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Reference> {
        self.refs.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.refs.contains_key(key)
    }

    /// Insert or replace an entry, keeping the position of a replaced key.
    pub fn insert(&mut self, key: impl Into<String>, reference: Reference) -> Option<Reference> {
        self.refs.insert(key.into(), reference)
    }

    /// Insert an entry, failing if the key is already present.
    pub fn insert_new(&mut self, key: impl Into<String>, reference: Reference) -> crate::Result<()> {
        match self.refs.entry(key.into()) {
            indexmap::map::Entry::Occupied(e) => Err(crate::Error::DuplicateKey(e.key().clone())),
            indexmap::map::Entry::Vacant(e) => {
                e.insert(reference);
                Ok(())
            }
        }
    }

    /// Store a JSON document inline.
    pub fn insert_json(
        &mut self,
        key: impl Into<String>,
        value: &impl Serialize,
    ) -> crate::Result<()> {
        let text = serde_json::to_string(value)?;
        self.insert(key, Reference::Inline(text));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Reference)> {
        self.refs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Reference)> {
        self.refs.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.refs.keys()
    }

    /// Iterate over remote references only.
    pub fn remotes(&self) -> impl Iterator<Item = (&String, &RemoteReference)> {
        self.refs
            .iter()
            .filter_map(|(k, v)| v.as_remote().map(|r| (k, r)))
    }

    /// Iterate over the chunk entries of the node at `path`,
    /// yielding the chunk part of the key (e.g. `0.1`) and the reference.
    pub fn chunks_of<'a>(
        &'a self,
        path: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Reference)> + 'a {
        self.refs.iter().filter_map(move |(k, v)| {
            let (parent, name) = split_key(k);
            (parent == path && !is_metadata_key(name)).then_some((name, v))
        })
    }
}

impl FromIterator<(String, Reference)> for ReferenceStore {
    fn from_iter<T: IntoIterator<Item = (String, Reference)>>(iter: T) -> Self {
        Self {
            refs: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ReferenceStore {
    type Item = (String, Reference);
    type IntoIter = indexmap::map::IntoIter<String, Reference>;

    fn into_iter(self) -> Self::IntoIter {
        self.refs.into_iter()
    }
}

/// Serialized reference document.
///
/// Remote references may use `{{symbol}}` in place of their source
/// identifier, where `symbol` is a key of `templates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFile {
    pub version: u32,
    #[serde(default)]
    pub templates: IndexMap<String, String>,
    pub refs: ReferenceStore,
}

impl ReferenceFile {
    /// Wrap a store without any templating.
    pub fn new(refs: ReferenceStore) -> Self {
        Self {
            version: REFERENCE_VERSION,
            templates: IndexMap::new(),
            refs,
        }
    }

    /// Wrap the store of a single source, templating its identifier as `u`.
    ///
    /// Remote references to other identifiers are kept as they are.
    pub fn from_single(refs: ReferenceStore, url: &str) -> Self {
        const SYMBOL: &str = "u";
        let refs = refs
            .into_iter()
            .map(|(k, v)| match v {
                Reference::Remote(r) if r.url == url => (
                    k,
                    Reference::Remote(RemoteReference {
                        url: placeholder(SYMBOL),
                        ..r
                    }),
                ),
                other => (k, other),
            })
            .collect();
        Self {
            templates: IndexMap::from([(SYMBOL.to_string(), url.to_string())]),
            ..Self::new(refs)
        }
    }

    pub fn from_json(text: &str) -> crate::Result<Self> {
        let out: Self = serde_json::from_str(text)?;
        if out.version != REFERENCE_VERSION {
            return Err(crate::Error::general(format!(
                "unsupported reference version {}",
                out.version
            )));
        }
        Ok(out)
    }

    /// Substitute templates back into every remote reference.
    pub fn resolve(&self) -> ReferenceStore {
        self.refs
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Reference::Remote(r) => Reference::Remote(RemoteReference {
                        url: render_template(&r.url, &self.templates),
                        ..r.clone()
                    }),
                    inline => inline.clone(),
                };
                (k.clone(), v)
            })
            .collect()
    }
}

/// Replace every `{{symbol}}` occurrence with its template value.
fn render_template(url: &str, templates: &IndexMap<String, String>) -> String {
    if !url.contains("{{") {
        return url.to_string();
    }
    let mut out = url.to_string();
    for (symbol, value) in templates {
        out = out.replace(&placeholder(symbol), value);
    }
    out
}

pub(crate) fn placeholder(symbol: &str) -> String {
    format!("{{{{{symbol}}}}}")
}

/// Whether a key component names a metadata document.
pub fn is_metadata_key(name: &str) -> bool {
    matches!(name, ZGROUP | ZARRAY | ZATTRS)
}

/// Split a key into node path and final component.
pub fn split_key(key: &str) -> (&str, &str) {
    match key.rsplit_once('/') {
        Some(tup) => tup,
        None => ("", key),
    }
}

/// Join a node path and a document or chunk name.
pub fn node_key(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}/{name}")
    }
}

/// Format chunk coordinates as `c0.c1...cN`.
pub fn chunk_name(coords: &[u64]) -> String {
    if coords.is_empty() {
        return "0".to_string();
    }
    coords
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Parse the chunk part of a key back into coordinates.
pub fn parse_chunk_name(name: &str) -> Option<Vec<u64>> {
    name.split('.').map(|c| c.parse().ok()).collect()
}

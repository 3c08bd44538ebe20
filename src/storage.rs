use bytes::Bytes;
use zarrs::storage::{
    MaybeBytes, MaybeBytesIterator, ReadableStorageTraits, StorageError, StoreKey,
    byte_range::{ByteRange, ByteRangeIterator},
};

use crate::reference::{Reference, ReferenceFile, ReferenceStore, RemoteReference, decode_inline};

#[cfg(feature = "async")]
mod asynch;

/// Map a source identifier to a key in the store used to read it.
///
/// The `scheme://` prefix and any leading `/` are removed, so a filesystem
/// store rooted at `/` serves absolute local paths and `file://` URLs, and an
/// object store serves `bucket/path` keys.
pub fn source_key(url: &str) -> crate::Result<StoreKey> {
    let path = url.split_once("://").map_or(url, |(_, rest)| rest);
    StoreKey::new(path.trim_start_matches('/'))
        .map_err(|e| crate::Error::InvalidSource(format!("{url}: {e}")))
}

/// Protocol of a source identifier; plain paths are `file`.
pub fn protocol(url: &str) -> &str {
    url.split_once("://").map_or("file", |(scheme, _)| scheme)
}

/// Read the byte range a remote reference points to.
pub fn read_remote<R: ReadableStorageTraits + ?Sized>(
    reader: &R,
    remote: &RemoteReference,
) -> crate::Result<Bytes> {
    let key = source_key(&remote.url)?;
    let bytes = reader
        .get_partial(&key, ByteRange::FromStart(remote.offset, Some(remote.length)))?
        .ok_or_else(|| crate::Error::MissingSource(remote.url.clone()))?;
    if bytes.len() as u64 != remote.length {
        return Err(crate::Error::ShortRead {
            url: remote.url.clone(),
            offset: remote.offset,
            expected: remote.length,
            actual: bytes.len() as u64,
        });
    }
    Ok(bytes)
}

/// A read-only Zarr store backed by references.
///
/// Inline values are served directly; remote references are read as byte
/// ranges from the inner store.
pub struct ReferenceStorage<R> {
    refs: ReferenceStore,
    inner: R,
}

impl<R> ReferenceStorage<R> {
    /// `refs` must have templates resolved, see [ReferenceFile::resolve].
    pub fn new(refs: ReferenceStore, inner: R) -> Self {
        Self { refs, inner }
    }

    pub fn from_file(file: &ReferenceFile, inner: R) -> Self {
        Self::new(file.resolve(), inner)
    }

    fn lookup(&self, key: &StoreKey) -> Option<&Reference> {
        self.refs.get(key.as_str())
    }
}

fn decode(key: &StoreKey, value: &str) -> Result<Bytes, StorageError> {
    decode_inline(value).map(Bytes::from).map_err(|e| {
        StorageError::Other(format!(
            "could not decode inline value of {}: {e}",
            key.as_str()
        ))
    })
}

fn remote_key(key: &StoreKey, remote: &RemoteReference) -> Result<StoreKey, StorageError> {
    source_key(&remote.url).map_err(|e| StorageError::Other(format!("{}: {e}", key.as_str())))
}

impl<R: ReadableStorageTraits> ReadableStorageTraits for ReferenceStorage<R> {
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        match self.lookup(key) {
            None => Ok(None),
            Some(Reference::Remote(r)) => Ok(Some(r.length)),
            Some(Reference::Inline(v)) => decode(key, v).map(|b| Some(b.len() as u64)),
        }
    }

    fn supports_get_partial(&self) -> bool {
        false
    }

    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        match self.lookup(key) {
            None => Ok(None),
            Some(Reference::Inline(v)) => decode(key, v).map(Some),
            Some(Reference::Remote(r)) => self.inner.get_partial(
                &remote_key(key, r)?,
                ByteRange::FromStart(r.offset, Some(r.length)),
            ),
        }
    }

    fn get_partial_many<'a>(
        &'a self,
        _key: &StoreKey,
        _byte_ranges: ByteRangeIterator<'a>,
    ) -> Result<MaybeBytesIterator<'a>, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial_many not supported".into(),
        ))
    }

    fn get_partial(
        &self,
        _key: &StoreKey,
        _byte_range: ByteRange,
    ) -> Result<MaybeBytes, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial not supported".into(),
        ))
    }
}

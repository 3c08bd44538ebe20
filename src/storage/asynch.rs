use zarrs::storage::{
    AsyncMaybeBytesIterator, AsyncReadableStorageTraits, MaybeBytes, StorageError, StoreKey,
    byte_range::{ByteRange, ByteRangeIterator},
};

use super::{ReferenceStorage, decode, remote_key};
use crate::reference::Reference;

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl<R: AsyncReadableStorageTraits> AsyncReadableStorageTraits for ReferenceStorage<R> {
    async fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        match self.lookup(key) {
            None => Ok(None),
            Some(Reference::Inline(v)) => decode(key, v).map(Some),
            Some(Reference::Remote(r)) => {
                self.inner
                    .get_partial(
                        &remote_key(key, r)?,
                        ByteRange::FromStart(r.offset, Some(r.length)),
                    )
                    .await
            }
        }
    }

    async fn get_partial(
        &self,
        _key: &StoreKey,
        _byte_range: ByteRange,
    ) -> Result<MaybeBytes, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial not supported".into(),
        ))
    }

    async fn get_partial_many<'a>(
        &'a self,
        _key: &StoreKey,
        _byte_ranges: ByteRangeIterator<'a>,
    ) -> Result<AsyncMaybeBytesIterator<'a>, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial_many not supported".into(),
        ))
    }

    async fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        match self.lookup(key) {
            None => Ok(None),
            Some(Reference::Remote(r)) => Ok(Some(r.length)),
            Some(Reference::Inline(v)) => decode(key, v).map(|b| Some(b.len() as u64)),
        }
    }

    fn supports_get_partial(&self) -> bool {
        false
    }
}

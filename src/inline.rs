use zarrs::storage::ReadableStorageTraits;

use crate::{
    reference::{Reference, ReferenceStore},
    storage::read_remote,
};

/// Replace remote references shorter than `threshold` bytes with their content.
///
/// Non-ASCII chunks are base64 encoded, so the inlined value may be longer
/// than the threshold. A threshold of zero disables inlining.
/// Returns the number of references inlined.
pub fn inline_references<R: ReadableStorageTraits + ?Sized>(
    store: &mut ReferenceStore,
    threshold: u64,
    reader: &R,
) -> crate::Result<usize> {
    if threshold == 0 {
        return Ok(0);
    }
    let mut reads = Vec::new();
    for (key, value) in store.iter() {
        let Reference::Remote(remote) = value else {
            continue;
        };
        if remote.length >= threshold {
            continue;
        }
        let data = read_remote(reader, remote)?;
        log::debug!("inlining {key} ({} bytes)", data.len());
        reads.push((key.clone(), Reference::inline_bytes(&data)));
    }
    // every read succeeded, so the store is only touched now
    let count = reads.len();
    for (key, value) in reads {
        store.insert(key, value);
    }
    log::info!("inlined {count} references below {threshold} bytes");
    Ok(count)
}

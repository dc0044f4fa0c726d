use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::error::{DbError, DbResult};

/// Flat path to bytes store that travels alongside a [`Database`] in
/// sandbox deployments.
///
/// [`Database`]: super::Database
#[derive(Clone, Default)]
pub struct BlobStore {
    inner: Arc<RwLock<BlobState>>,
}

#[derive(Default)]
struct BlobState {
    blobs: BTreeMap<String, Vec<u8>>,
    snapshots: HashMap<String, BTreeMap<String, Vec<u8>>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: &str, data: Vec<u8>, cancel: &CancellationToken) -> DbResult<()> {
        cancel.check()?;
        debug!(path = %path, size = data.len(), "blob put");
        self.inner.write().blobs.insert(path.to_string(), data);
        Ok(())
    }

    pub fn get(&self, path: &str, cancel: &CancellationToken) -> DbResult<Vec<u8>> {
        cancel.check()?;
        self.inner
            .read()
            .blobs
            .get(path)
            .cloned()
            .ok_or_else(|| DbError::BlobNotFound(path.to_string()))
    }

    pub fn delete(&self, path: &str, cancel: &CancellationToken) -> DbResult<()> {
        cancel.check()?;
        self.inner
            .write()
            .blobs
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| DbError::BlobNotFound(path.to_string()))
    }

    /// Paths starting with `prefix`, in sorted order.
    pub fn list(&self, prefix: &str) -> Vec<String> {
        self.inner
            .read()
            .blobs
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all blobs and snapshots.
    pub fn clear(&self, cancel: &CancellationToken) -> DbResult<()> {
        cancel.check()?;
        let mut state = self.inner.write();
        state.blobs.clear();
        state.snapshots.clear();
        info!("blob store cleared");
        Ok(())
    }

    pub fn create_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        cancel.check()?;
        let mut state = self.inner.write();
        let copy = state.blobs.clone();
        state.snapshots.insert(name.to_string(), copy);
        info!(snapshot = %name, "blob snapshot created");
        Ok(())
    }

    pub fn reset_to_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        cancel.check()?;
        let mut state = self.inner.write();
        let copy = state
            .snapshots
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::SnapshotNotFound(name.to_string()))?;
        state.blobs = copy;
        info!(snapshot = %name, "blob store reset to snapshot");
        Ok(())
    }

    /// Removes snapshot `name`. Unknown names are ignored.
    pub fn delete_snapshot(&self, name: &str, cancel: &CancellationToken) -> DbResult<()> {
        cancel.check()?;
        if self.inner.write().snapshots.remove(name).is_some() {
            info!(snapshot = %name, "blob snapshot deleted");
        }
        Ok(())
    }
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore").field("count", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = BlobStore::new();
        let cancel = CancellationToken::new();
        store.put("logos/a.png", vec![1, 2, 3], &cancel).unwrap();
        assert_eq!(store.get("logos/a.png", &cancel).unwrap(), vec![1, 2, 3]);

        store.delete("logos/a.png", &cancel).unwrap();
        assert!(matches!(
            store.get("logos/a.png", &cancel),
            Err(DbError::BlobNotFound(_))
        ));
        assert!(matches!(
            store.delete("logos/a.png", &cancel),
            Err(DbError::BlobNotFound(_))
        ));
    }

    #[test]
    fn test_list_prefix() {
        let store = BlobStore::new();
        let cancel = CancellationToken::new();
        for path in ["logos/b.png", "logos/a.png", "docs/readme.txt"] {
            store.put(path, Vec::new(), &cancel).unwrap();
        }
        assert_eq!(store.list("logos/"), vec!["logos/a.png", "logos/b.png"]);
        assert_eq!(store.list("").len(), 3);
        assert!(store.list("zzz").is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let store = BlobStore::new();
        let cancel = CancellationToken::new();
        store.put("a", b"one".to_vec(), &cancel).unwrap();
        store.create_snapshot("s", &cancel).unwrap();

        store.put("a", b"two".to_vec(), &cancel).unwrap();
        store.put("b", b"new".to_vec(), &cancel).unwrap();
        store.reset_to_snapshot("s", &cancel).unwrap();

        assert_eq!(store.get("a", &cancel).unwrap(), b"one".to_vec());
        assert_eq!(store.len(), 1);

        // The snapshot survives a restore.
        store.put("a", b"three".to_vec(), &cancel).unwrap();
        store.reset_to_snapshot("s", &cancel).unwrap();
        assert_eq!(store.get("a", &cancel).unwrap(), b"one".to_vec());

        store.delete_snapshot("s", &cancel).unwrap();
        store.delete_snapshot("s", &cancel).unwrap();
        assert!(matches!(
            store.reset_to_snapshot("s", &cancel),
            Err(DbError::SnapshotNotFound(_))
        ));
    }

    #[test]
    fn test_cancelled_put_leaves_store_unchanged() {
        let store = BlobStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            store.put("a", vec![1], &cancel),
            Err(DbError::Cancelled)
        ));
        assert!(store.is_empty());
    }
}
